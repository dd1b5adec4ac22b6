//! Native failures a connector reports.
//!
//! One variant per failure category a target system can raise. Callers never
//! see these directly: the provisioner maps each category onto a resource
//! outcome. Only connectivity categories are transient.

use thiserror::Error;

type Cause = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("object already exists: {identifier}")]
    AlreadyExists { identifier: String },

    #[error("unknown uid: {identifier}")]
    UnknownUid { identifier: String },

    /// Stale revision supplied by the caller.
    #[error("precondition failed: {message}")]
    PreconditionFailed { message: String },

    /// The target only accepts versioned writes.
    #[error("precondition required: {message}")]
    PreconditionRequired { message: String },

    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<Cause>,
    },

    /// Connection dropped after it was established.
    #[error("connection broken: {message}")]
    ConnectionBroken { message: String },

    #[error("connector i/o error: {message}")]
    ConnectorIo {
        message: String,
        #[source]
        source: Option<Cause>,
    },

    #[error("operation timed out: {message}")]
    OperationTimeout { message: String },

    #[error("retryable failure: {message}")]
    Retryable { message: String },

    #[error("invalid configuration: {message}")]
    Configuration { message: String },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("unexpected null value: {message}")]
    NullValue { message: String },

    #[error("connector security failure: {message}")]
    ConnectorSecurity { message: String },

    #[error("invalid credential: {message}")]
    InvalidCredential { message: String },

    #[error("invalid password: {message}")]
    InvalidPassword { message: String },

    #[error("password expired: {message}")]
    PasswordExpired { message: String },

    #[error("permission denied for {operation}")]
    PermissionDenied { operation: String },

    #[error("operation '{operation}' not supported for object class '{object_class}'")]
    UnsupportedOperation {
        operation: String,
        object_class: String,
    },

    #[error("object class '{object_class}' not supported")]
    ObjectClassNotSupported { object_class: String },

    #[error("invalid value for attribute '{attribute}': {message}")]
    InvalidAttributeValue { attribute: String, message: String },

    /// A script ran and raised an error.
    #[error("script '{script_id}' failed: {message}")]
    ScriptFailed { script_id: String, message: String },

    /// Failure with no more specific category.
    #[error("connector error: {message}")]
    Generic {
        message: String,
        #[source]
        source: Option<Cause>,
    },

    /// Category name not known to this crate.
    #[error("unrecognized connector failure '{category}': {message}")]
    Unrecognized { category: String, message: String },
}

/// Category codes, paired with the name `from_native` matches after
/// normalization (lowercase, no underscores, no `Exception` suffix).
const CATEGORIES: &[(&str, &str)] = &[
    ("ALREADY_EXISTS", "alreadyexists"),
    ("UNKNOWN_UID", "unknownuid"),
    ("PRECONDITION_FAILED", "preconditionfailed"),
    ("PRECONDITION_REQUIRED", "preconditionrequired"),
    ("CONNECTION_FAILED", "connectionfailed"),
    ("CONNECTION_BROKEN", "connectionbroken"),
    ("CONNECTOR_IO", "connectorio"),
    ("OPERATION_TIMEOUT", "operationtimeout"),
    ("RETRYABLE", "retryable"),
    ("CONFIGURATION", "configuration"),
    ("INVALID_ARGUMENT", "invalidargument"),
    ("NULL_VALUE", "nullvalue"),
    ("CONNECTOR_SECURITY", "connectorsecurity"),
    ("INVALID_CREDENTIAL", "invalidcredential"),
    ("INVALID_PASSWORD", "invalidpassword"),
    ("PASSWORD_EXPIRED", "passwordexpired"),
    ("PERMISSION_DENIED", "permissiondenied"),
    ("UNSUPPORTED_OPERATION", "unsupportedoperation"),
    ("OBJECT_CLASS_NOT_SUPPORTED", "objectclassnotsupported"),
    ("INVALID_ATTRIBUTE_VALUE", "invalidattributevalue"),
    ("SCRIPT_FAILED", "scriptfailed"),
    ("CONNECTOR_ERROR", "connectorerror"),
];

impl ConnectorError {
    /// Connectivity failures; the same call may succeed later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. }
                | Self::ConnectionBroken { .. }
                | Self::ConnectorIo { .. }
                | Self::OperationTimeout { .. }
                | Self::Retryable { .. }
        )
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::AlreadyExists { .. } => "ALREADY_EXISTS",
            Self::UnknownUid { .. } => "UNKNOWN_UID",
            Self::PreconditionFailed { .. } => "PRECONDITION_FAILED",
            Self::PreconditionRequired { .. } => "PRECONDITION_REQUIRED",
            Self::ConnectionFailed { .. } => "CONNECTION_FAILED",
            Self::ConnectionBroken { .. } => "CONNECTION_BROKEN",
            Self::ConnectorIo { .. } => "CONNECTOR_IO",
            Self::OperationTimeout { .. } => "OPERATION_TIMEOUT",
            Self::Retryable { .. } => "RETRYABLE",
            Self::Configuration { .. } => "CONFIGURATION",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::NullValue { .. } => "NULL_VALUE",
            Self::ConnectorSecurity { .. } => "CONNECTOR_SECURITY",
            Self::InvalidCredential { .. } => "INVALID_CREDENTIAL",
            Self::InvalidPassword { .. } => "INVALID_PASSWORD",
            Self::PasswordExpired { .. } => "PASSWORD_EXPIRED",
            Self::PermissionDenied { .. } => "PERMISSION_DENIED",
            Self::UnsupportedOperation { .. } => "UNSUPPORTED_OPERATION",
            Self::ObjectClassNotSupported { .. } => "OBJECT_CLASS_NOT_SUPPORTED",
            Self::InvalidAttributeValue { .. } => "INVALID_ATTRIBUTE_VALUE",
            Self::ScriptFailed { .. } => "SCRIPT_FAILED",
            Self::Generic { .. } => "CONNECTOR_ERROR",
            Self::Unrecognized { .. } => "UNRECOGNIZED",
        }
    }

    /// Build an error from the category name a remote connector sent.
    ///
    /// Both codes (`OPERATION_TIMEOUT`) and exception names
    /// (`OperationTimeoutException`) are understood, in any case, along with
    /// a few platform aliases (`IllegalArgument`, `NullPointer`). Other names
    /// become [`ConnectorError::Unrecognized`].
    pub fn from_native(category: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let key = category
            .trim()
            .trim_end_matches("Exception")
            .replace('_', "")
            .to_lowercase();
        let key = match key.as_str() {
            "illegalargument" => "invalidargument",
            "nullpointer" => "nullvalue",
            "script" => "scriptfailed",
            "connector" => "connectorerror",
            other => other,
        };

        let code = CATEGORIES
            .iter()
            .find(|(_, name)| *name == key)
            .map(|(code, _)| *code);
        match code {
            Some("ALREADY_EXISTS") => Self::already_exists(message),
            Some("UNKNOWN_UID") => Self::unknown_uid(message),
            Some("PRECONDITION_FAILED") => Self::PreconditionFailed { message },
            Some("PRECONDITION_REQUIRED") => Self::PreconditionRequired { message },
            Some("CONNECTION_FAILED") => Self::connection_failed(message),
            Some("CONNECTION_BROKEN") => Self::ConnectionBroken { message },
            Some("CONNECTOR_IO") => Self::io(message),
            Some("OPERATION_TIMEOUT") => Self::timeout(message),
            Some("RETRYABLE") => Self::Retryable { message },
            Some("CONFIGURATION") => Self::configuration(message),
            Some("INVALID_ARGUMENT") => Self::InvalidArgument { message },
            Some("NULL_VALUE") => Self::NullValue { message },
            Some("CONNECTOR_SECURITY") => Self::ConnectorSecurity { message },
            Some("INVALID_CREDENTIAL") => Self::InvalidCredential { message },
            Some("INVALID_PASSWORD") => Self::InvalidPassword { message },
            Some("PASSWORD_EXPIRED") => Self::PasswordExpired { message },
            Some("PERMISSION_DENIED") => Self::PermissionDenied { operation: message },
            Some("UNSUPPORTED_OPERATION") => Self::unsupported_operation(message, ""),
            Some("OBJECT_CLASS_NOT_SUPPORTED") => Self::ObjectClassNotSupported {
                object_class: message,
            },
            Some("INVALID_ATTRIBUTE_VALUE") => Self::invalid_attribute_value("", message),
            Some("SCRIPT_FAILED") => Self::script_failed("", message),
            Some("CONNECTOR_ERROR") => Self::generic(message),
            _ => Self::Unrecognized {
                category: category.to_string(),
                message,
            },
        }
    }

    /// Attach the underlying error to categories that carry one.
    #[must_use]
    pub fn caused_by(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        if let Self::ConnectionFailed { source, .. }
        | Self::ConnectorIo { source, .. }
        | Self::Generic { source, .. } = &mut self
        {
            *source = Some(Box::new(cause));
        }
        self
    }

    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::ConnectorIo {
            message: message.into(),
            source: None,
        }
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
            source: None,
        }
    }

    pub fn already_exists(identifier: impl Into<String>) -> Self {
        Self::AlreadyExists {
            identifier: identifier.into(),
        }
    }

    pub fn unknown_uid(identifier: impl Into<String>) -> Self {
        Self::UnknownUid {
            identifier: identifier.into(),
        }
    }

    pub fn unsupported_operation(
        operation: impl Into<String>,
        object_class: impl Into<String>,
    ) -> Self {
        Self::UnsupportedOperation {
            operation: operation.into(),
            object_class: object_class.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::OperationTimeout {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn invalid_attribute_value(
        attribute: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidAttributeValue {
            attribute: attribute.into(),
            message: message.into(),
        }
    }

    pub fn script_failed(script_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ScriptFailed {
            script_id: script_id.into(),
            message: message.into(),
        }
    }
}

pub type ConnectorResult<T> = Result<T, ConnectorError>;
