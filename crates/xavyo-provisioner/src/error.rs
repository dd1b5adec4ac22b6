//! Resource-level error types.
//!
//! Every failure the provisioner surfaces upward is one of these variants,
//! whatever the connector underneath reported.

use thiserror::Error;

/// Standardized outcome of a failed resource request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    /// The object already exists.
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// The supplied version does not match the stored one.
    #[error("Precondition failed: {message}")]
    PreconditionFailed { message: String },

    /// A version precondition is required but was not supplied.
    #[error("Precondition required: {message}")]
    PreconditionRequired { message: String },

    /// The target system is temporarily unreachable.
    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    /// Unexpected failure inside the provisioner or connector.
    #[error("Internal error: {message}")]
    Internal { message: String },

    /// The caller is not allowed to perform the operation.
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    /// The supplied credentials were rejected.
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// The system, object class, object or attribute does not exist.
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// The request itself is malformed.
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    /// The request would violate a schema policy such as a required attribute.
    #[error("Policy violation: {message}")]
    PolicyViolation { message: String },

    /// A value does not fit the declared attribute type or multiplicity.
    #[error("Type mismatch for attribute '{attribute}': {message}")]
    TypeMismatch { attribute: String, message: String },
}

/// Result type for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;

impl ResourceError {
    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create a service-unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a bad-request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Create a policy-violation error.
    pub fn policy_violation(message: impl Into<String>) -> Self {
        Self::PolicyViolation {
            message: message.into(),
        }
    }

    /// Create a type-mismatch error.
    pub fn type_mismatch(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TypeMismatch {
            attribute: attribute.into(),
            message: message.into(),
        }
    }

    /// HTTP-style status code of this outcome.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Conflict { .. } => 409,
            Self::PreconditionFailed { .. } => 412,
            Self::PreconditionRequired { .. } => 428,
            Self::ServiceUnavailable { .. } => 503,
            Self::Internal { .. } => 500,
            Self::Forbidden { .. } | Self::PolicyViolation { .. } => 403,
            Self::Unauthorized { .. } => 401,
            Self::NotFound { .. } => 404,
            Self::BadRequest { .. } | Self::TypeMismatch { .. } => 400,
        }
    }

    /// Get an error code for classification.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Conflict { .. } => "CONFLICT",
            Self::PreconditionFailed { .. } => "PRECONDITION_FAILED",
            Self::PreconditionRequired { .. } => "PRECONDITION_REQUIRED",
            Self::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE",
            Self::Internal { .. } => "INTERNAL_ERROR",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::BadRequest { .. } => "BAD_REQUEST",
            Self::PolicyViolation { .. } => "POLICY_VIOLATION",
            Self::TypeMismatch { .. } => "TYPE_MISMATCH",
        }
    }

    /// Whether repeating the same request later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable { .. })
    }
}

/// Errors found while loading or validating provisioner configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The configuration document could not be parsed.
    #[error("Invalid configuration document: {message}")]
    Parse { message: String },

    /// A property declares a native type the provisioner cannot handle.
    #[error("Attribute type '{native_type}' is not supported.")]
    UnsupportedType { native_type: String },

    /// A name appears twice where names must be unique.
    #[error("Duplicate {kind} '{name}'")]
    Duplicate { kind: &'static str, name: String },

    /// A field is empty or otherwise unusable.
    #[error("Invalid {field}: {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    /// Create an invalid-field error.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse {
            message: err.to_string(),
        }
    }
}

impl From<ConfigError> for ResourceError {
    fn from(err: ConfigError) -> Self {
        ResourceError::internal(err.to_string())
    }
}
