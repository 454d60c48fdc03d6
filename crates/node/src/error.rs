//! Node error types.

use thiserror::Error;

/// Errors that stop a node.
#[derive(Debug, Error)]
pub enum NodeError {
    /// An environment variable holds an unusable value.
    #[error("Invalid value for {key}: {value}")]
    InvalidConfig { key: &'static str, value: String },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Broker connection error.
    #[error("Channel error: {0}")]
    Channel(#[from] channel::ChannelError),

    /// The metrics exporter could not be installed.
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// A background loop panicked.
    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Convenience type alias for node results.
pub type Result<T> = std::result::Result<T, NodeError>;
