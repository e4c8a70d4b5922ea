//! Error handling types shared by every layer of the daemon.

use thiserror::Error;

/// Result type alias for operations that can fail with [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the oak-ci daemon (spec.md §7).
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration failed to load or failed validation. Fatal at startup.
    #[error("config error: {message}")]
    ConfigError {
        /// Human-readable description of what was wrong.
        message: String,
    },

    /// The on-disk schema version is newer than this binary understands, or
    /// a forward migration failed. Fatal: the daemon refuses to start.
    #[error("schema migration error: {message}")]
    SchemaMigrationError {
        /// Description of the migration failure.
        message: String,
    },

    /// An embedding/summarization provider could not be reached.
    #[error("provider '{provider}' unreachable: {message}")]
    ProviderUnreachable {
        /// Name of the provider (e.g. "ollama").
        provider: String,
        /// Underlying failure description.
        message: String,
    },

    /// A provider call exceeded its per-call deadline.
    #[error("provider '{provider}' timed out after {elapsed_ms}ms")]
    ProviderTimeout {
        /// Name of the provider.
        provider: String,
        /// How long the call ran before being cancelled.
        elapsed_ms: u64,
    },

    /// A provider returned an embedding whose dimension doesn't match a
    /// collection's fixed dimension.
    #[error("dimension mismatch: collection expects {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the collection was created with.
        expected: usize,
        /// Dimension actually produced.
        actual: usize,
    },

    /// A batch of texts exceeded the provider's batch size limit.
    #[error("batch too large: {count} items exceeds provider limit of {limit}")]
    BatchTooLarge {
        /// Number of items submitted.
        count: usize,
        /// Provider's maximum batch size.
        limit: usize,
    },

    /// The single writer was busy; caller should retry with backoff.
    #[error("store busy, retry")]
    Busy,

    /// The requested entity does not exist.
    #[error("not found: {resource}")]
    NotFound {
        /// Description of the missing resource.
        resource: String,
    },

    /// A data invariant was violated (e.g. a foreign key pointing nowhere).
    #[error("integrity violation: {message}")]
    IntegrityViolation {
        /// Description of the violated invariant.
        message: String,
    },

    /// A hook endpoint failed internally. Always caught at the HTTP
    /// boundary and converted to an empty `{}` response.
    #[error("hook ingestion error: {message}")]
    HookIngestionError {
        /// Description of the failure.
        message: String,
    },

    /// Invalid argument supplied to a domain operation.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    /// Underlying I/O failure.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// JSON (de)serialization failure.
    #[error("JSON error: {source}")]
    Json {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// Relational store failure that doesn't map to a more specific variant.
    #[error("store error: {message}")]
    Store {
        /// Description of the store failure.
        message: String,
    },

    /// Vector store failure that doesn't map to a more specific variant.
    #[error("vector store error: {message}")]
    VectorStore {
        /// Description of the vector store failure.
        message: String,
    },
}

impl Error {
    /// Build a [`Error::NotFound`] for the given resource description.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Build a [`Error::InvalidArgument`].
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Whether the caller should retry this operation with backoff.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Busy | Self::ProviderUnreachable { .. } | Self::ProviderTimeout { .. }
        )
    }
}
