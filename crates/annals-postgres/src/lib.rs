//! Annals Postgres: a durable `StorageAdapter` backed by `PostgreSQL`.

pub mod config;
pub mod pg_storage_adapter;
pub mod schema;

pub use config::PgConfig;
pub use pg_storage_adapter::PgStorageAdapter;
