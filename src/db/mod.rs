//! Database layer
//!
//! SQLite is the default single-file deployment; MySQL is available for
//! larger installs. The driver is chosen by `database.driver` in config.
//!
//! ```ignore
//! use tripdesk::config::DatabaseConfig;
//! use tripdesk::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, Backend, DatabasePool, DynDatabasePool, MysqlDatabase,
    SqliteDatabase,
};
