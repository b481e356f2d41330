//! Connection helpers for the mail service's stores.
//!
//! # Features
//!
//! - `postgres` (default): SeaORM connection pool and migration runner
//! - `redis` (default): `ConnectionManager` used by the credential cache
//! - `config`: `core_config::FromEnv` for the connection configs
//!
//! ```ignore
//! let db = database::postgres::connect_with_retry(PostgresConfig::new(db_url), None).await?;
//! database::postgres::run_migrations::<migration::Migrator>(&db, "mailer_api").await?;
//! let cache = database::redis::connect_with_retry(&RedisConfig::new(redis_url), None).await?;
//! ```

pub mod common;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "redis")]
pub mod redis;

pub use common::{DatabaseError, DatabaseResult};
