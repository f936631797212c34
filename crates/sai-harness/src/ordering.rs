//! Resolution-order independence.
//!
//! A configuration is described as named [`Step`]s, each building one
//! object from the handles of the steps it depends on. [`permute_and_run`]
//! creates the steps in every given ordering and checks that the forwarding
//! result of a probe is the same each time.

use crate::error::HarnessResult;
use crate::oracle::Expectation;
use crate::session::{Probe, Session};
use itertools::Itertools;
use sai_api::{Kind, ObjectId, ObjectSpec, Oid};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, Error)]
pub enum OrderingError {
    #[error("ordering {ordering}: step '{step}' runs before its dependency '{dependency}'")]
    DependencyViolation {
        ordering: usize,
        step: String,
        dependency: String,
    },

    #[error("unknown step '{0}'")]
    UnknownStep(String),

    #[error("ordering has {got} entries for {expected} steps")]
    LengthMismatch { expected: usize, got: usize },

    #[error("step '{step}' cannot be built: {message}")]
    Build { step: String, message: String },

    #[error("ordering [{}] gives {got}, first ordering gave {first}", .ordering.join(", "))]
    Diverged {
        ordering: Vec<String>,
        first: Box<Expectation>,
        got: Box<Expectation>,
    },
}

/// Handles created so far in one ordering, by step name.
#[derive(Debug, Clone, Default)]
pub struct Handles(HashMap<String, ObjectId>);

impl Handles {
    pub fn get(&self, step: &str) -> Result<ObjectId, OrderingError> {
        self.0
            .get(step)
            .copied()
            .ok_or_else(|| OrderingError::UnknownStep(step.to_string()))
    }

    /// Typed handle of `step`.
    pub fn oid<K: Kind>(&self, step: &str) -> Result<Oid<K>, OrderingError> {
        let id = self.get(step)?;
        Oid::try_from(id).map_err(|e| OrderingError::Build {
            step: step.to_string(),
            message: e.to_string(),
        })
    }
}

type BuildFn = dyn Fn(&Handles) -> Result<ObjectSpec, OrderingError> + Send + Sync;

/// One named creation.
#[derive(Clone)]
pub struct Step {
    pub name: String,
    /// Steps whose handles `build` needs.
    pub deps: Vec<String>,
    build: Arc<BuildFn>,
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("deps", &self.deps)
            .finish()
    }
}

impl Step {
    pub fn new<F>(name: &str, deps: &[&str], build: F) -> Self
    where
        F: Fn(&Handles) -> Result<ObjectSpec, OrderingError> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            deps: deps.iter().map(|d| d.to_string()).collect(),
            build: Arc::new(build),
        }
    }

    /// A step that references nothing created by other steps.
    pub fn fixed(name: &str, spec: impl Into<ObjectSpec>) -> Self {
        let spec = spec.into();
        Self::new(name, &[], move |_| Ok(spec.clone()))
    }

    pub fn build(&self, handles: &Handles) -> Result<ObjectSpec, OrderingError> {
        (self.build)(handles)
    }
}

/// Candidate orderings, each a permutation of step indexes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Orderings(Vec<Vec<usize>>);

impl Orderings {
    /// Every permutation of `n` steps.
    pub fn all(n: usize) -> Self {
        Orderings((0..n).permutations(n).collect())
    }

    /// Every permutation that creates each step after its dependencies.
    pub fn topological(steps: &[Step]) -> Result<Self, OrderingError> {
        let deps = dependency_indexes(steps)?;
        Ok(Orderings(
            (0..steps.len())
                .permutations(steps.len())
                .filter(|order| respects(order, &deps).is_none())
                .collect(),
        ))
    }

    /// Orderings given by step names.
    pub fn named(steps: &[Step], orderings: &[&[&str]]) -> Result<Self, OrderingError> {
        let index: HashMap<&str, usize> = steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.as_str(), i))
            .collect();
        orderings
            .iter()
            .map(|names| {
                names
                    .iter()
                    .map(|n| {
                        index
                            .get(n)
                            .copied()
                            .ok_or_else(|| OrderingError::UnknownStep(n.to_string()))
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Orderings)
    }

    /// Keeps at most `max` orderings, spread evenly over the full set.
    pub fn sample(self, max: usize) -> Self {
        if max == 0 || self.0.len() <= max {
            return self;
        }
        let stride = self.0.len().div_ceil(max);
        Orderings(self.0.into_iter().step_by(stride).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[usize]> {
        self.0.iter().map(Vec::as_slice)
    }

    /// Checks every ordering against `steps`.
    pub fn validate(&self, steps: &[Step]) -> Result<(), OrderingError> {
        let deps = dependency_indexes(steps)?;
        for (i, order) in self.0.iter().enumerate() {
            if order.len() != steps.len() || !order.iter().all_unique() {
                return Err(OrderingError::LengthMismatch {
                    expected: steps.len(),
                    got: order.iter().unique().count(),
                });
            }
            if let Some((step, dep)) = respects(order, &deps) {
                return Err(OrderingError::DependencyViolation {
                    ordering: i,
                    step: steps[step].name.clone(),
                    dependency: steps[dep].name.clone(),
                });
            }
        }
        Ok(())
    }
}

fn dependency_indexes(steps: &[Step]) -> Result<Vec<Vec<usize>>, OrderingError> {
    let index: HashMap<&str, usize> = steps
        .iter()
        .enumerate()
        .map(|(i, s)| (s.name.as_str(), i))
        .collect();
    steps
        .iter()
        .map(|s| {
            s.deps
                .iter()
                .map(|d| {
                    index
                        .get(d.as_str())
                        .copied()
                        .ok_or_else(|| OrderingError::UnknownStep(d.clone()))
                })
                .collect()
        })
        .collect()
}

/// First `(step, dependency)` pair created out of order.
fn respects(order: &[usize], deps: &[Vec<usize>]) -> Option<(usize, usize)> {
    let mut position = vec![usize::MAX; deps.len()];
    for (pos, &step) in order.iter().enumerate() {
        position[step] = pos;
    }
    order.iter().find_map(|&step| {
        deps[step]
            .iter()
            .find(|&&dep| position[dep] > position[step])
            .map(|&dep| (step, dep))
    })
}

/// Creates `steps` in each ordering, verifies `probe` on the device after
/// each, and rolls the ordering back before the next one.
///
/// Returns the expectation shared by all orderings.
pub async fn permute_and_run(
    session: &mut Session,
    steps: &[Step],
    orderings: &Orderings,
    probe: &Probe,
) -> HarnessResult<Expectation> {
    orderings.validate(steps)?;
    let mut first: Option<Expectation> = None;

    for (i, order) in orderings.iter().enumerate() {
        let names: Vec<String> = order.iter().map(|&s| steps[s].name.clone()).collect();
        debug!("permute_and_run: ordering {} [{}]", i, names.join(", "));

        let mark = session.undo_log().len();
        let outcome = run_ordering(session, steps, order, probe).await;
        let pending = session.undo_log().len().saturating_sub(mark);
        session.rollback(pending).await?;
        let got = outcome?.normalized();

        match &first {
            None => first = Some(got),
            Some(expected) if *expected != got => {
                return Err(OrderingError::Diverged {
                    ordering: names,
                    first: Box::new(expected.clone()),
                    got: Box::new(got),
                }
                .into());
            }
            Some(_) => {}
        }
    }

    info!("permute_and_run: {} orderings agree", orderings.len());
    Ok(first.unwrap_or_else(|| Expectation::drop(crate::oracle::DropCause::NoEgress)))
}

async fn run_ordering(
    session: &mut Session,
    steps: &[Step],
    order: &[usize],
    probe: &Probe,
) -> HarnessResult<Expectation> {
    let mut handles = Handles::default();
    for &s in order {
        let step = &steps[s];
        let spec = step.build(&handles)?;
        let id = session.create(spec).await?;
        handles.0.insert(step.name.clone(), id);
    }
    let expected = session.expect(probe)?;
    session.check_eventually(probe, &expected).await?;
    Ok(expected)
}
