//! Storage boundary for the catalog, restock events and watches.
//!
//! The traits make no storage assumptions; `InMemoryStore` backs tests and
//! local runs, `PostgresStore` backs deployments.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use r#trait::{
    CatalogStore, RestockEventStore, SaveOutcome, StoreError, UpsertKind, WatchStore,
};
