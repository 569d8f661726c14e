//! Error types for Autotask.

use uuid::Uuid;

use crate::scheduler::task::TaskStatus;

/// Top-level error type for the server.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Scheduler-related errors, surfaced to the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Task {id} not found")]
    TaskNotFound { id: Uuid },

    #[error("Task {id} is already terminal ({status}), cannot cancel")]
    NotCancellable { id: Uuid, status: TaskStatus },

    #[error("An equivalent task {id} is already in progress ({status})")]
    AlreadyInProgress { id: Uuid, status: TaskStatus },
}

/// Action registry errors.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Action {id} not found")]
    ActionNotFound { id: String },

    #[error("Action {id} is not applicable to the given context")]
    NotApplicable { id: String },
}

/// Result type alias for the server.
pub type Result<T> = std::result::Result<T, Error>;
