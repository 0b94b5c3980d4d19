// Error handling framework

use thiserror::Error;

use crate::credential::SESSION_FIELD;

/// Errors raised while talking to the remote check-in service.
///
/// These never cross the client boundary as errors: `ProtocolClient` catches
/// every variant and folds it into a `{success, message}` outcome.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid Cookie: {SESSION_FIELD} not found")]
    CredentialMissing,

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Server returned error: {payload}")]
    Remote { code: String, payload: String },

    #[error("unparseable response (HTTP {status}): {body}")]
    UnparseableResponse { status: u16, body: String },

    #[error("encrypting server time failed: {0}")]
    Crypto(String),
}

/// Account-config storage errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Store health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Account config not found: {0}")]
    NotFound(String),
}

/// Scheduler-facing errors
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// The one error surfaced directly to a manual caller: the account has no
    /// usable config, so there is no job body to run.
    #[error("account {0} is not configured")]
    NotConfigured(i64),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db_err) => StoreError::QueryFailed(db_err.message().to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::ConnectionFailed(err.to_string())
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::MigrationFailed(err.to_string())
    }
}
