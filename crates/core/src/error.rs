//! Error types for registry construction, argument coercion and dispatch.

use crate::declaration::OperationKind;
use crate::protocol::JsonRpcError;
use crate::schema::SemanticType;

/// Mistakes in a service definition, reported while the registry is built.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    /// A tool or prompt declared with an empty name.
    #[error("{kind} declaration is missing a name")]
    MissingName { kind: OperationKind },

    /// A resource declared with an empty uri.
    #[error("resource declaration '{name}' is missing a uri")]
    MissingUri { name: String },

    /// Two declarations of the same kind share a key.
    #[error("duplicate {kind} '{key}'")]
    Duplicate { kind: OperationKind, key: String },

    /// The explicit parameter map could not be read.
    #[error("{kind} '{operation}' has a malformed parameter '{parameter}': {reason}")]
    MalformedParameter {
        kind: OperationKind,
        operation: String,
        parameter: String,
        reason: String,
    },
}

/// Raw call arguments that do not fit an operation's parameter list.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoercionError {
    #[error("missing required parameter '{parameter}'")]
    MissingRequired { parameter: String },

    #[error("parameter '{parameter}' must be {expected}, got {found}")]
    TypeMismatch {
        parameter: String,
        expected: SemanticType,
        found: String,
    },

    #[error("argument keys must be strings, found positional key {key}")]
    NonStringKey { key: String },

    #[error("arguments must be an object, got {found}")]
    NotAMapping { found: String },
}

impl CoercionError {
    /// Name of the parameter the failure is about, when there is one.
    pub fn parameter(&self) -> Option<&str> {
        match self {
            Self::MissingRequired { parameter } | Self::TypeMismatch { parameter, .. } => {
                Some(parameter)
            }
            Self::NonStringKey { .. } | Self::NotAMapping { .. } => None,
        }
    }
}

/// Classification of a dispatch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnknownTool,
    UnknownPrompt,
    UnknownResource,
    InvalidArguments,
    InvalidParams,
    Handler,
}

/// Failure of a single dispatch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("unknown prompt: {0}")]
    UnknownPrompt(String),

    #[error("unknown resource: {0}")]
    UnknownResource(String),

    #[error("invalid arguments for {kind} '{operation}': {source}")]
    InvalidArguments {
        kind: OperationKind,
        operation: String,
        #[source]
        source: CoercionError,
    },

    /// Request params that do not decode into the expected shape.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// The business method itself failed.
    #[error("error processing {kind} '{operation}': {message}")]
    Handler {
        kind: OperationKind,
        operation: String,
        message: String,
    },
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownTool(_) => ErrorKind::UnknownTool,
            Self::UnknownPrompt(_) => ErrorKind::UnknownPrompt,
            Self::UnknownResource(_) => ErrorKind::UnknownResource,
            Self::InvalidArguments { .. } => ErrorKind::InvalidArguments,
            Self::InvalidParams(_) => ErrorKind::InvalidParams,
            Self::Handler { .. } => ErrorKind::Handler,
        }
    }
}

impl From<DispatchError> for JsonRpcError {
    fn from(err: DispatchError) -> Self {
        match err.kind() {
            ErrorKind::Handler => JsonRpcError::internal_error(err.to_string()),
            ErrorKind::UnknownTool
            | ErrorKind::UnknownPrompt
            | ErrorKind::UnknownResource
            | ErrorKind::InvalidArguments
            | ErrorKind::InvalidParams => JsonRpcError::invalid_params(err.to_string()),
        }
    }
}
