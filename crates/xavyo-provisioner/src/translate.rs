//! Connector failure translation.
//!
//! Maps the native failure categories a connector reports onto the small
//! resource-level taxonomy. The mapping is total: unrecognized categories
//! become [`ResourceError::Internal`].

use xavyo_connector::error::ConnectorError;

use crate::error::ResourceError;

/// Translate a native connector failure into a resource outcome.
#[must_use]
pub fn translate(err: ConnectorError) -> ResourceError {
    let message = err.to_string();
    match err {
        ConnectorError::AlreadyExists { .. } => ResourceError::Conflict { message },
        ConnectorError::PreconditionFailed { .. } => ResourceError::PreconditionFailed { message },
        ConnectorError::PreconditionRequired { .. } => {
            ResourceError::PreconditionRequired { message }
        }
        ConnectorError::ConnectionFailed { .. }
        | ConnectorError::ConnectionBroken { .. }
        | ConnectorError::ConnectorIo { .. }
        | ConnectorError::OperationTimeout { .. }
        | ConnectorError::Retryable { .. } => ResourceError::ServiceUnavailable { message },
        ConnectorError::Configuration { .. }
        | ConnectorError::InvalidArgument { .. }
        | ConnectorError::NullValue { .. }
        | ConnectorError::ConnectorSecurity { .. }
        | ConnectorError::ScriptFailed { .. }
        | ConnectorError::Generic { .. }
        | ConnectorError::Unrecognized { .. } => ResourceError::Internal { message },
        ConnectorError::PermissionDenied { .. } | ConnectorError::PasswordExpired { .. } => {
            ResourceError::Forbidden { message }
        }
        ConnectorError::InvalidCredential { .. } | ConnectorError::InvalidPassword { .. } => {
            ResourceError::Unauthorized { message }
        }
        ConnectorError::UnknownUid { .. }
        | ConnectorError::UnsupportedOperation { .. }
        | ConnectorError::ObjectClassNotSupported { .. } => ResourceError::NotFound { message },
        ConnectorError::InvalidAttributeValue { .. } => ResourceError::BadRequest { message },
    }
}

impl From<ConnectorError> for ResourceError {
    fn from(err: ConnectorError) -> Self {
        translate(err)
    }
}
