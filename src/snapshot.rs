//! Catalog Snapshots
//!
//! Readers take an `Arc` to one immutable generation and keep it for the
//! whole resolution call. A refresh builds a new snapshot and swaps the
//! active reference; existing snapshots are never mutated.

use crate::linking::value_index::EntityValueIndex;
use crate::semantic::catalog::SemanticCatalog;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::info;

/// One immutable generation of catalog state
#[derive(Debug)]
pub struct SemanticSnapshot {
    pub generation: u64,
    pub catalog: SemanticCatalog,
    pub values: EntityValueIndex,
}

/// Holder of the active snapshot
#[derive(Debug)]
pub struct SnapshotStore {
    current: RwLock<Arc<SemanticSnapshot>>,
    /// Last generation handed out (increments on every publish)
    generation: AtomicU64,
}

impl SnapshotStore {
    pub fn new(catalog: SemanticCatalog, values: EntityValueIndex) -> Self {
        Self {
            current: RwLock::new(Arc::new(SemanticSnapshot {
                generation: 0,
                catalog,
                values,
            })),
            generation: AtomicU64::new(0),
        }
    }

    /// The active snapshot; stays valid after later publishes
    pub fn load(&self) -> Arc<SemanticSnapshot> {
        let guard = self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Swap in a new catalog generation and return its number
    pub fn publish(&self, catalog: SemanticCatalog, values: EntityValueIndex) -> u64 {
        let mut guard = self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *guard = Arc::new(SemanticSnapshot {
            generation,
            catalog,
            values,
        });
        info!(
            generation,
            clusters = guard.catalog.clusters().count(),
            "published new catalog snapshot"
        );
        generation
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::cluster::ModelCluster;

    fn catalog(name: &str) -> SemanticCatalog {
        SemanticCatalog::new(vec![ModelCluster::new(name, "t")]).unwrap()
    }

    #[test]
    fn test_reader_keeps_its_generation() {
        let store = SnapshotStore::new(catalog("v1"), EntityValueIndex::default());
        let before = store.load();

        let generation = store.publish(catalog("v2"), EntityValueIndex::default());
        assert_eq!(generation, 1);
        assert_eq!(store.generation(), 1);

        // The old reader still sees only v1
        assert_eq!(before.generation, 0);
        assert!(before.catalog.cluster("v1").is_some());
        assert!(before.catalog.cluster("v2").is_none());

        let after = store.load();
        assert_eq!(after.generation, 1);
        assert!(after.catalog.cluster("v2").is_some());
    }

    #[test]
    fn test_concurrent_readers() {
        let store = Arc::new(SnapshotStore::new(catalog("v0"), EntityValueIndex::default()));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let snapshot = store.load();
                        let expected = format!("v{}", snapshot.generation);
                        assert!(snapshot.catalog.cluster(&expected).is_some());
                    }
                })
            })
            .collect();

        for i in 1..=10 {
            store.publish(catalog(&format!("v{}", i)), EntityValueIndex::default());
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.load().generation, 10);
    }
}
