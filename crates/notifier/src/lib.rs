//! Restock delivery: drains pending notifications from the API and forwards
//! them to chat recipients.

pub mod config;
pub mod drainer;
pub mod gateway;
pub mod render;
pub mod sender;

pub use drainer::{DrainStats, Drainer};
