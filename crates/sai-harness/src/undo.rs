//! LIFO record of configuration changes and their rollback.

use crate::client::MirroredClient;
use sai_api::{AttrUpdate, ConfigClient, ObjectId, ObjectKind, SaiError};
use thiserror::Error;
use tracing::{debug, warn};

/// One change that rollback must reverse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoRecord {
    Created { kind: ObjectKind, id: ObjectId },
    /// Restored by setting `previous` back.
    AttrChanged { id: ObjectId, previous: AttrUpdate },
}

impl UndoRecord {
    pub fn id(&self) -> ObjectId {
        match self {
            UndoRecord::Created { id, .. } | UndoRecord::AttrChanged { id, .. } => *id,
        }
    }
}

/// Fatal rollback problems. The offending record stays on the log.
#[derive(Debug, Clone, Error)]
pub enum RollbackError {
    /// The object still has dependents the log does not account for.
    #[error("{id:?} is not a leaf: {} dependent(s) remain", .dependents.len())]
    NotALeaf {
        id: ObjectId,
        dependents: Vec<ObjectId>,
    },

    /// The device refused removal because the object is still referenced.
    #[error("device reports {id:?} still in use")]
    InUse { id: ObjectId },

    #[error("device failed to roll back {id:?}: {error}")]
    Device { id: ObjectId, error: SaiError },
}

#[derive(Debug, Clone, Default)]
pub struct UndoLog {
    records: Vec<UndoRecord>,
}

impl UndoLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: UndoRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Oldest first.
    pub fn records(&self) -> &[UndoRecord] {
        &self.records
    }

    /// Drops every record for `id`, after the object was removed outside
    /// the log. Returns how many records were dropped.
    pub fn remove_record(&mut self, id: ObjectId) -> usize {
        let before = self.records.len();
        self.records.retain(|r| r.id() != id);
        before - self.records.len()
    }

    /// Reverses the newest `n` records, newest first.
    ///
    /// A record whose object is already gone is skipped with a warning.
    /// Anything else that fails stops the rollback and is never retried.
    pub async fn pop_last(
        &mut self,
        client: &MirroredClient,
        n: usize,
    ) -> Result<usize, RollbackError> {
        let mut undone = 0;
        while undone < n {
            let Some(record) = self.records.pop() else {
                break;
            };
            if let Err(e) = Self::undo(client, &record).await {
                self.records.push(record);
                return Err(e);
            }
            undone += 1;
        }
        Ok(undone)
    }

    pub async fn pop_all(&mut self, client: &MirroredClient) -> Result<usize, RollbackError> {
        self.pop_last(client, self.records.len()).await
    }

    async fn undo(client: &MirroredClient, record: &UndoRecord) -> Result<(), RollbackError> {
        match record {
            UndoRecord::Created { kind, id } => {
                let dependents = client.store().read().dependents(*id);
                if !dependents.is_empty() {
                    return Err(RollbackError::NotALeaf {
                        id: *id,
                        dependents,
                    });
                }
                debug!("UndoLog: removing {} {:?}", kind, id);
                match client.remove(*id).await {
                    Ok(()) => Ok(()),
                    Err(SaiError::NotFound { .. }) => {
                        warn!("UndoLog: {} {:?} already gone", kind, id);
                        // keep the mirror in line with the device
                        let _ = client.store().write().remove(*id);
                        Ok(())
                    }
                    Err(SaiError::ObjectInUse { .. }) => Err(RollbackError::InUse { id: *id }),
                    Err(error) => Err(RollbackError::Device { id: *id, error }),
                }
            }
            UndoRecord::AttrChanged { id, previous } => {
                debug!("UndoLog: restoring {} on {:?}", previous.name(), id);
                match client.set_attribute(*id, previous.clone()).await {
                    Ok(()) => Ok(()),
                    Err(SaiError::NotFound { .. }) => {
                        warn!("UndoLog: {:?} gone before {} was restored", id, previous.name());
                        Ok(())
                    }
                    Err(error) => Err(RollbackError::Device { id: *id, error }),
                }
            }
        }
    }
}
