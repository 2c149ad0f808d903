//! `cellarwatch-core`: catalog and restock domain types.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod catalog;
pub mod error;
pub mod id;
pub mod product;
pub mod restock;
pub mod watch;

pub use catalog::{PageRequest, ProductFilter, ProductPage, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, MAX_SEARCH_LENGTH};
pub use error::{DomainError, DomainResult};
pub use id::{RestockEventId, Sku, WatchId, WatcherId, MAX_SKU_LENGTH, MAX_WATCHER_ID_LENGTH};
pub use product::{is_restock, Product, ProductRecord};
pub use restock::{AckRequest, PendingNotification, RestockEvent};
pub use watch::{Watch, WatchWithProduct};
