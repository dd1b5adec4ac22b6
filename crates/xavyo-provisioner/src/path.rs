//! Resource paths of the form `system/{system}[/{objectClass}[/{id}]]`.

use std::fmt;
use std::str::FromStr;

use crate::error::ResourceError;

const ROOT: &str = "system";

/// A parsed resource path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourcePath {
    /// Target system name.
    pub system: String,
    /// Object class within the system.
    pub object_class: Option<String>,
    /// Object identifier within the object class.
    pub id: Option<String>,
}

impl ResourcePath {
    /// Path addressing a whole system.
    pub fn system(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            object_class: None,
            id: None,
        }
    }

    /// Path addressing an object class.
    pub fn object_class(system: impl Into<String>, object_class: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            object_class: Some(object_class.into()),
            id: None,
        }
    }

    /// Path addressing a single object.
    pub fn object(
        system: impl Into<String>,
        object_class: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            system: system.into(),
            object_class: Some(object_class.into()),
            id: Some(id.into()),
        }
    }

    /// Parse a path string.
    pub fn parse(path: &str) -> Result<Self, ResourceError> {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        let malformed = || ResourceError::bad_request(format!("Malformed resource path '{path}'"));

        if segments.iter().any(|s| s.is_empty()) {
            return Err(malformed());
        }

        match segments.as_slice() {
            [root, system] if *root == ROOT => Ok(Self::system(*system)),
            [root, system, object_class] if *root == ROOT => {
                Ok(Self::object_class(*system, *object_class))
            }
            [root, system, object_class, id] if *root == ROOT => {
                Ok(Self::object(*system, *object_class, *id))
            }
            _ => Err(malformed()),
        }
    }

    /// Object class, or a bad-request error naming the path.
    pub fn require_object_class(&self) -> Result<&str, ResourceError> {
        self.object_class
            .as_deref()
            .ok_or_else(|| ResourceError::bad_request(format!("'{self}' names no object class")))
    }

    /// Object identifier, or a bad-request error naming the path.
    pub fn require_id(&self) -> Result<&str, ResourceError> {
        self.id
            .as_deref()
            .ok_or_else(|| ResourceError::bad_request(format!("'{self}' names no object")))
    }
}

impl FromStr for ResourcePath {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ROOT}/{}", self.system)?;
        if let Some(object_class) = &self.object_class {
            write!(f, "/{object_class}")?;
        }
        if let Some(id) = &self.id {
            write!(f, "/{id}")?;
        }
        Ok(())
    }
}
