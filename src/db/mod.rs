//! Database layer: storage traits and their backends.

pub mod firestore;
pub mod memory;
pub mod store;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;
pub use store::{ExecutionStore, PositionStore, TourStore};

use std::sync::Arc;

/// Collection names as constants.
pub mod collections {
    pub const POSITIONS: &str = "positions";
    pub const TOURS: &str = "tours";
    pub const TOUR_EXECUTIONS: &str = "tour_executions";
    /// One slot per user_id pointing at that user's active execution
    pub const ACTIVE_EXECUTIONS: &str = "active_executions";
}

/// Store handles, constructed once at startup and injected into services.
#[derive(Clone)]
pub struct Storage {
    pub positions: Arc<dyn PositionStore>,
    pub tours: Arc<dyn TourStore>,
    pub executions: Arc<dyn ExecutionStore>,
}

impl Storage {
    /// All three stores backed by one process-local `MemoryDb`.
    pub fn in_memory() -> Self {
        Self::from_backend(MemoryDb::new())
    }

    /// All three stores backed by Firestore.
    pub fn firestore(db: FirestoreDb) -> Self {
        Self::from_backend(db)
    }

    fn from_backend<B>(backend: B) -> Self
    where
        B: PositionStore + TourStore + ExecutionStore + Clone + 'static,
    {
        Self {
            positions: Arc::new(backend.clone()),
            tours: Arc::new(backend.clone()),
            executions: Arc::new(backend),
        }
    }
}
