//! Shared application state.

/// Connections and configuration shared by the routers and the shutdown hook.
///
/// Cloning only bumps reference counts.
#[derive(Clone)]
pub struct AppState {
    pub config: crate::config::Config,
    /// PostgreSQL pool backing every repository
    pub db: database::postgres::DatabaseConnection,
    /// Credential cache
    pub redis: database::redis::ConnectionManager,
}
