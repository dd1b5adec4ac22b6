//! Kinds of target system a connector can front.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The family of connector behind a configured system.
///
/// Only informational: the provisioner drives every kind through the same
/// capability traits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorType {
    Ldap,
    Database,
    Rest,
    /// Delimited flat file.
    Csv,
    /// Operations backed by connector-side scripts.
    Scripted,
}

const KNOWN: [ConnectorType; 5] = [
    ConnectorType::Ldap,
    ConnectorType::Database,
    ConnectorType::Rest,
    ConnectorType::Csv,
    ConnectorType::Scripted,
];

impl ConnectorType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ldap => "ldap",
            Self::Database => "database",
            Self::Rest => "rest",
            Self::Csv => "csv",
            Self::Scripted => "scripted",
        }
    }
}

impl fmt::Display for ConnectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A connector type name that matches none of the known kinds.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Unknown connector type '{0}'")]
pub struct UnknownConnectorType(String);

impl FromStr for ConnectorType {
    type Err = UnknownConnectorType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KNOWN
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownConnectorType(s.to_string()))
    }
}
