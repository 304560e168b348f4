//! Error types raised while synthesizing permissions and reconciling subscriptions.

use crate::transport::{Operation, Service};

/// A topic reference or identifier that cannot be turned into a topic ARN.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// A `Ref` to something other than the supported pseudo parameters.
    #[error(
        "Unsupported reference `{0}` in externalSNS topic; only AWS::AccountId, AWS::Region and AWS::Partition can be resolved"
    )]
    UnsupportedReference(String),
    /// A join segment that is neither a string nor a `Ref`.
    #[error("Unsupported segment {0} in externalSNS topic")]
    UnsupportedSegment(String),
    /// An identifier normalized to nothing.
    #[error("Cannot derive a resource name from an empty {0}")]
    EmptyIdentifier(&'static str),
}

/// A failure reported by the platform transport.
///
/// `code` carries the platform error code when one is available, e.g.
/// `ResourceNotFoundException`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{service}.{operation} failed: {message}")]
pub struct RemoteError {
    /// The service that was called
    pub service: Service,
    /// The operation that was called
    pub operation: Operation,
    /// The platform error code, if any
    pub code: Option<String>,
    /// Human readable failure description
    pub message: String,
}

impl RemoteError {
    /// Creates a new `RemoteError` without an error code.
    pub fn new(service: Service, operation: Operation, message: impl Into<String>) -> Self {
        Self {
            service,
            operation,
            code: None,
            message: message.into(),
        }
    }

    /// Sets the platform error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Whether the platform reported the addressed resource as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.code.as_deref(),
            Some("ResourceNotFoundException") | Some("NotFound")
        )
    }
}

/// Errors that abort the reconciliation of a single binding.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// The declared topic could not be interpreted
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// The declared function does not exist on the platform
    #[error("Function {0} was not found")]
    FunctionNotFound(String),
    /// The platform call failed
    #[error(transparent)]
    Remote(#[from] RemoteError),
    /// The platform returned an ARN that cannot be split into its components
    #[error("Malformed ARN `{0}`")]
    MalformedArn(String),
    /// A request or response could not be (de)serialized
    #[error("Could not encode or decode {what}: {source}")]
    Codec {
        /// What was being encoded or decoded
        what: String,
        /// The underlying serde error
        #[source]
        source: serde_json::Error,
    },
    /// The host invoked a hook this plugin does not register
    #[error("Unknown lifecycle hook `{0}`")]
    UnknownHook(String),
}
