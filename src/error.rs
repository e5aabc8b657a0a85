//! Error taxonomy for the engine.
//!
//! Configuration and DSL misuse surface as [`Error::Invalid`] or
//! [`Error::Config`] with messages that enumerate the available
//! alternatives. Missing rows and unique violations get their own variants
//! so callers can match on them; everything the driver reports is wrapped
//! in [`Error::Database`] with the original cause attached.

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors surfaced at the API boundary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Schema, path, or DSL misuse. Raised at compile time, before any
    /// statement is issued.
    #[error("{0}")]
    Invalid(String),

    /// Engine misconfiguration: unsupported dialect, missing default
    /// database, misuse of a server-only operation.
    #[error("{0}")]
    Config(String),

    /// `select_one` or `Database::get` came up empty.
    #[error("{0}")]
    DoesNotExist(String),

    /// A unique constraint rejected an insert.
    #[error("{0}")]
    AlreadyExists(String),

    /// Driver or transport failure.
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl Error {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Error::Invalid(message.into())
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    pub(crate) fn does_not_exist(message: impl Into<String>) -> Self {
        Error::DoesNotExist(message.into())
    }

    pub(crate) fn already_exists(message: impl Into<String>) -> Self {
        Error::AlreadyExists(message.into())
    }
}
