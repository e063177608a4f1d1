// Infrastructure layer - SQLite implementation of the domain contracts

pub mod blocking;
pub mod config;
pub mod logging;
pub mod persistence;

pub use config::StoreConfig;
pub use persistence::{Database, SqliteQuery, SqliteRepository, SqliteUnitOfWork, StorageContext};
