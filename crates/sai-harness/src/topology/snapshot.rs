//! Point-in-time dump of the topology, attached to failure reports.

use sai_api::{ObjectId, ObjectKind, ObjectSpec};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub spec: ObjectSpec,
}

/// Every configured object in creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    entries: Vec<SnapshotEntry>,
}

impl TopologySnapshot {
    pub fn new(entries: Vec<SnapshotEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[SnapshotEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, kind: ObjectKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for TopologySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "topology ({} objects):", self.entries.len())?;
        for e in &self.entries {
            writeln!(f, "  {:<40} {:<20} {:?}", e.kind, e.id, e.spec)?;
        }
        Ok(())
    }
}
