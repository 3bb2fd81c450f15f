//! The persisted shape of a cockpit and the best-effort persistence handle.

use crate::events::DomainEvent;
use crate::events::store::SnapshotStore;
use crate::incidents::Incident;
use crate::workflow::Proposal;
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

pub const STATE_NAMESPACE: &str = "opscockpit/state";
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub schema_version: u32,
    pub current_store: String,
    pub events: Vec<DomainEvent>,
    #[serde(default)]
    pub proposals: Vec<Proposal>,
    #[serde(default)]
    pub incidents: Vec<Incident>,
}

impl Snapshot {
    pub fn check_version(&self) -> Result<()> {
        if self.schema_version > SCHEMA_VERSION {
            bail!(
                "snapshot schema_version {} is newer than supported version {}",
                self.schema_version,
                SCHEMA_VERSION
            );
        }
        Ok(())
    }
}

/// Optional snapshot store. Any failure is logged and switches the handle
/// into in-memory mode for the rest of the session, so a store that could
/// not be read is never overwritten.
pub struct Persistence {
    store: Option<SnapshotStore>,
    degraded: bool,
}

impl Persistence {
    pub fn in_memory() -> Self {
        Self {
            store: None,
            degraded: false,
        }
    }

    pub fn with_store(store: SnapshotStore) -> Self {
        Self {
            store: Some(store),
            degraded: false,
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.store.is_some() && !self.degraded
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn load(&mut self) -> Option<Snapshot> {
        let store = self.store.as_ref()?;
        let loaded = store
            .load::<Snapshot>(STATE_NAMESPACE)
            .and_then(|snapshot| {
                if let Some(s) = &snapshot {
                    s.check_version()?;
                }
                Ok(snapshot)
            });
        match loaded {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.degrade("load", &format!("{err:#}"));
                None
            }
        }
    }

    pub fn save(&mut self, snapshot: &Snapshot) {
        if self.degraded {
            return;
        }
        let Some(store) = self.store.as_ref() else {
            return;
        };
        if let Err(err) = store.save(STATE_NAMESPACE, snapshot, snapshot.events.len()) {
            self.degrade("save", &format!("{err:#}"));
        }
    }

    pub fn clear(&mut self) {
        if self.degraded {
            return;
        }
        let Some(store) = self.store.as_ref() else {
            return;
        };
        if let Err(err) = store.delete(STATE_NAMESPACE) {
            self.degrade("clear", &format!("{err:#}"));
        }
    }

    /// Stop touching the store for the rest of the session.
    pub fn degrade(&mut self, op: &str, error: &str) {
        tracing::warn!(
            operation = op,
            error,
            "snapshot persistence failed; continuing in memory"
        );
        self.degraded = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn snapshot(version: u32) -> Snapshot {
        Snapshot {
            schema_version: version,
            current_store: "store-1".to_string(),
            events: vec![],
            proposals: vec![],
            incidents: vec![],
        }
    }

    #[test]
    fn saves_and_loads_through_store() {
        let tmp = tempdir().unwrap();
        let store = SnapshotStore::open(&tmp.path().join("state.db")).unwrap();
        let mut persistence = Persistence::with_store(store);
        assert!(persistence.load().is_none());
        persistence.save(&snapshot(SCHEMA_VERSION));
        assert_eq!(persistence.load(), Some(snapshot(SCHEMA_VERSION)));
        assert!(persistence.is_persistent());
    }

    #[test]
    fn newer_schema_degrades_to_memory() {
        let store = SnapshotStore::in_memory().unwrap();
        store.save(STATE_NAMESPACE, &snapshot(SCHEMA_VERSION + 1), 0).unwrap();
        let mut persistence = Persistence::with_store(store);
        assert!(persistence.load().is_none());
        assert!(persistence.is_degraded());
        persistence.save(&snapshot(SCHEMA_VERSION));
        assert!(!persistence.is_persistent());
    }
}
