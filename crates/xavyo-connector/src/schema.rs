//! Object-class schemas.
//!
//! A schema lists the object classes a system exposes. Each class pairs
//! the names clients use with the native names the connector expects, so
//! the schema is also where attribute sets get renamed in either direction.

use serde::{Deserialize, Serialize};

use crate::operation::{AttributeSet, AttributeValue};

/// The object classes configured for one system.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    pub object_classes: Vec<ObjectClass>,
}

impl Schema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_object_classes(object_classes: Vec<ObjectClass>) -> Self {
        Self { object_classes }
    }

    pub fn add_object_class(&mut self, object_class: ObjectClass) {
        self.object_classes.push(object_class);
    }

    /// Look up a class by the name clients use (`account`).
    #[must_use]
    pub fn get_object_class(&self, name: &str) -> Option<&ObjectClass> {
        self.object_classes.iter().find(|oc| oc.name == name)
    }

    /// Look up a class by its native name (`__ACCOUNT__`).
    #[must_use]
    pub fn get_object_class_by_native(&self, native_name: &str) -> Option<&ObjectClass> {
        self.object_classes.iter().find(|oc| oc.native_name == native_name)
    }
}

/// One kind of object on a target system and its declared attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectClass {
    pub name: String,
    pub native_name: String,
    pub attributes: Vec<SchemaAttribute>,
}

impl ObjectClass {
    pub fn new(name: impl Into<String>, native_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            native_name: native_name.into(),
            attributes: Vec::new(),
        }
    }

    pub fn add_attribute(&mut self, attribute: SchemaAttribute) {
        self.attributes.push(attribute);
    }

    #[must_use]
    pub fn with_attribute(mut self, attribute: SchemaAttribute) -> Self {
        self.add_attribute(attribute);
        self
    }

    #[must_use]
    pub fn get_attribute(&self, name: &str) -> Option<&SchemaAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    #[must_use]
    pub fn get_attribute_by_native(&self, native_name: &str) -> Option<&SchemaAttribute> {
        self.attributes.iter().find(|a| a.native_name == native_name)
    }

    #[must_use]
    pub fn native_name_of(&self, name: &str) -> Option<String> {
        self.get_attribute(name).map(|a| a.native_name.clone())
    }

    /// Rename a client attribute set to native names.
    ///
    /// Every attribute must be declared; the first one that is not comes
    /// back as the error.
    pub fn to_native(&self, attributes: &AttributeSet) -> Result<AttributeSet, String> {
        let mut native = AttributeSet::new();
        for (name, value) in attributes.iter() {
            let attr = self.get_attribute(name).ok_or_else(|| name.clone())?;
            native.set(attr.native_name.clone(), value.clone());
        }
        Ok(native)
    }

    /// Rename a native attribute set to client names.
    ///
    /// Undeclared native attributes (including `__UID__`) and attributes
    /// marked unreadable are left out.
    #[must_use]
    pub fn to_internal(&self, attributes: &AttributeSet) -> AttributeSet {
        attributes
            .iter()
            .filter_map(|(native, value)| {
                let attr = self.get_attribute_by_native(native)?;
                attr.readable.then(|| (attr.name.clone(), value.clone()))
            })
            .collect()
    }
}

/// A declared attribute of an [`ObjectClass`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaAttribute {
    pub name: String,
    pub native_name: String,
    pub data_type: AttributeDataType,
    #[serde(default)]
    pub multi_valued: bool,
    /// Patches may not leave the attribute without a value.
    #[serde(default)]
    pub required: bool,
    /// Unreadable attributes (passwords) never appear in responses.
    #[serde(default = "yes")]
    pub readable: bool,
    #[serde(default = "yes")]
    pub writable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn yes() -> bool {
    true
}

impl SchemaAttribute {
    /// A readable, writable, optional single-valued attribute.
    pub fn new(
        name: impl Into<String>,
        native_name: impl Into<String>,
        data_type: AttributeDataType,
    ) -> Self {
        Self {
            name: name.into(),
            native_name: native_name.into(),
            data_type,
            multi_valued: false,
            required: false,
            readable: true,
            writable: true,
            description: None,
        }
    }

    #[must_use]
    pub fn multi_valued(mut self) -> Self {
        self.multi_valued = true;
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn write_only(mut self) -> Self {
        self.readable = false;
        self
    }

    #[must_use]
    pub fn accepts(&self, value: &AttributeValue) -> bool {
        self.data_type.accepts(value)
    }
}

/// Value type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeDataType {
    String,
    Integer,
    Long,
    Boolean,
    /// Base64 text.
    Binary,
    /// RFC 3339 text.
    DateTime,
    Uuid,
    /// LDAP distinguished name.
    Dn,
    Decimal,
    /// Any JSON value, unchecked.
    Json,
}

/// Native type spellings accepted in configuration, by data type.
const TYPE_NAMES: &[(AttributeDataType, &[&str])] = &[
    (AttributeDataType::String, &["string", "text", "varchar", "char"]),
    (AttributeDataType::Integer, &["integer", "int", "int32"]),
    (AttributeDataType::Long, &["long", "bigint", "int64"]),
    (AttributeDataType::Boolean, &["boolean", "bool"]),
    (AttributeDataType::Binary, &["binary", "bytes", "blob"]),
    (AttributeDataType::DateTime, &["datetime", "timestamp"]),
    (AttributeDataType::Uuid, &["uuid", "guid"]),
    (AttributeDataType::Dn, &["dn", "distinguishedname"]),
    (AttributeDataType::Decimal, &["decimal", "number", "double", "float"]),
    (AttributeDataType::Json, &["json", "object"]),
];

impl AttributeDataType {
    /// Canonical spelling, the first entry of its alias list.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        TYPE_NAMES
            .iter()
            .find(|(data_type, _)| *data_type == self)
            .and_then(|(_, names)| names.first().copied())
            .unwrap_or("string")
    }

    /// Resolve a configured native type name, ignoring case.
    #[must_use]
    pub fn parse_str(s: &str) -> Option<Self> {
        TYPE_NAMES
            .iter()
            .find(|(_, names)| names.iter().any(|n| n.eq_ignore_ascii_case(s)))
            .map(|(data_type, _)| *data_type)
    }

    /// Types `increment` applies to.
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Long | Self::Decimal)
    }

    /// Whether one scalar fits this type. Arrays never fit; check elements.
    #[must_use]
    pub fn accepts(self, value: &AttributeValue) -> bool {
        use AttributeValue as V;
        match value {
            V::Null => true,
            V::Array(_) => false,
            _ if self == Self::Json => true,
            V::String(_) => matches!(
                self,
                Self::String | Self::Binary | Self::DateTime | Self::Uuid | Self::Dn
            ),
            V::Integer(_) => matches!(self, Self::Integer | Self::Long | Self::Decimal),
            V::Float(_) => self == Self::Decimal,
            V::Boolean(_) => self == Self::Boolean,
            V::Object(_) => false,
        }
    }
}

impl std::fmt::Display for AttributeDataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
