//! Infrastructure layer: Postgres pool, migrations and store adapters.

pub mod db;
pub mod store;
