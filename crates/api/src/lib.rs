//! HTTP API: notification gateway and watch management.

pub mod app;
pub mod config;
