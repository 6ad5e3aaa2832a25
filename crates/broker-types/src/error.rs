use thiserror;

/// The outcome type returned by every [`crate::contract::BrokerAdapter`] operation.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Tagged outcome for a failed adapter operation.
///
/// Each variant is one of the error kinds a consumer (HTTP/SSE layer) must
/// branch on; none of them carry an ambient "catch everything" fallback
/// except [`AdapterError::Internal`], which still records its cause.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// Bad endpoint string, unknown job status, or limit/offset out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation invoked before `Connect` or after `Disconnect`.
    #[error("adapter is not connected")]
    NotConnected,

    /// `FetchJob` could not locate the job, or the record vanished after a
    /// positive index probe (race with broker pruning).
    #[error("job not found: queue={queue} id={id}")]
    NotFound { queue: String, id: String },

    /// A structural field of a job record failed to parse.
    #[error("failed to decode job record field {field}: {reason}")]
    Decode { field: String, reason: String },

    /// `Subscribe` was called while a single-subscriber model already has an
    /// active subscription.
    #[error("a subscriber is already registered")]
    AlreadySubscribed,

    /// The caller's cancellation signal fired before the operation completed.
    #[error("operation cancelled")]
    Cancelled,

    /// Underlying broker I/O error (connection, auth, protocol).
    #[error("broker transport error: {0}")]
    Transport(String),

    /// Unexpected failure; the cause is always attached.
    #[error("internal error: {message}")]
    Internal {
        message: String,
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl AdapterError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            cause: None,
        }
    }

    pub fn internal_with_cause(
        message: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }
}
