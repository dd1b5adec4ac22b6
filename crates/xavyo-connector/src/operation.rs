//! Values exchanged with a connector.
//!
//! Object identifiers, attribute bags, search filters and paging cursors.
//! Everything here speaks native attribute names; renaming to the names a
//! client sees happens in the provisioner.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Native attribute holding the identifier of an object in search results.
pub const UID_ATTRIBUTE: &str = "__UID__";

/// Native attribute holding the naming attribute of an object.
pub const NAME_ATTRIBUTE: &str = "__NAME__";

/// Identifier a target system assigned to one of its objects.
///
/// The identifier is opaque to the provisioner. Only `value` is compared when
/// resolving a resource id; `attribute` records which native attribute the
/// connector read it from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Uid {
    attribute: String,
    value: String,
}

impl Uid {
    /// Identifier `value` read from the native attribute `attribute`.
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Identifier read from the generic `uid` attribute.
    pub fn from_value(value: impl Into<String>) -> Self {
        Self::new("uid", value)
    }

    /// Native attribute the identifier was read from.
    pub fn attribute_name(&self) -> &str {
        &self.attribute
    }

    /// The identifier itself.
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Display for Uid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.attribute, self.value)
    }
}

/// Attributes of one object, keyed by name.
///
/// Keys are ordered so two sets with equal content serialize identically.
/// A `Null` value is never stored: writing one deletes the key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeSet {
    #[serde(flatten)]
    attributes: BTreeMap<String, AttributeValue>,
}

impl AttributeSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `name`, or drop `name` when `value` is `Null`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        let name = name.into();
        match value.into() {
            AttributeValue::Null => {
                self.attributes.remove(&name);
            }
            value => {
                self.attributes.insert(name, value);
            }
        }
    }

    /// Builder form of [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.set(name, value);
        self
    }

    /// The value stored under `name`, if any.
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name).filter(|v| !v.is_null())
    }

    /// The value of `name` when it is a lone string.
    pub fn get_string(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(AttributeValue::as_string)
    }

    /// Every string held by `name`, whether stored as a scalar or a list.
    pub fn get_strings(&self, name: &str) -> Option<Vec<&str>> {
        self.get(name).map(AttributeValue::as_strings)
    }

    /// Whether `name` holds a value.
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Drop `name`, returning what it held.
    pub fn remove(&mut self, name: &str) -> Option<AttributeValue> {
        self.attributes.remove(name)
    }

    /// Number of attributes with a value.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Whether no attribute holds a value.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Attributes in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.attributes.iter()
    }

    /// Render as a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect(),
        )
    }
}

impl FromIterator<(String, AttributeValue)> for AttributeSet {
    fn from_iter<T: IntoIterator<Item = (String, AttributeValue)>>(iter: T) -> Self {
        let mut set = Self::new();
        for (name, value) in iter {
            set.set(name, value);
        }
        set
    }
}

impl IntoIterator for AttributeSet {
    type Item = (String, AttributeValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, AttributeValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.attributes.into_iter()
    }
}

/// Value of one attribute.
///
/// Multi-valued attributes hold an `Array` of scalars. Serialized untagged,
/// so a set renders as the plain JSON object a client exchanges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// No value; never stored in an [`AttributeSet`].
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    /// Values of a multi-valued attribute.
    Array(Vec<AttributeValue>),
    /// Structured value a connector passes through untouched.
    Object(serde_json::Map<String, Value>),
}

impl AttributeValue {
    /// Whether this is [`Null`](Self::Null).
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The string, when this is a string scalar.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Strings held by a scalar or a list; other scalars are skipped.
    pub fn as_strings(&self) -> Vec<&str> {
        match self {
            Self::String(s) => vec![s.as_str()],
            Self::Array(items) => items.iter().filter_map(Self::as_string).collect(),
            _ => Vec::new(),
        }
    }

    /// The integer, when this is an integer scalar.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value widened to `f64`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// The flag, when this is a boolean scalar.
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Whether this is an integer or float scalar.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Float(_))
    }

    /// The scalars this value stands for, with nulls dropped.
    pub fn into_values(self) -> Vec<AttributeValue> {
        match self {
            Self::Null => Vec::new(),
            Self::Array(items) => items.into_iter().filter(|v| !v.is_null()).collect(),
            scalar => vec![scalar],
        }
    }

    /// Render as the equivalent JSON value.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Boolean(b) => Value::Bool(*b),
            Self::Integer(i) => Value::from(*i),
            Self::Float(f) => Value::from(*f),
            Self::String(s) => Value::String(s.clone()),
            Self::Array(items) => items.iter().map(Self::to_json).collect(),
            Self::Object(map) => Value::Object(map.clone()),
        }
    }
}

impl From<Value> for AttributeValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Boolean(b),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Integer)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::Null),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => Self::Object(map),
        }
    }
}

macro_rules! scalar_from {
    ($($source:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$source> for AttributeValue {
                fn from(v: $source) -> Self {
                    Self::$variant(v.into())
                }
            }
        )*
    };
}

scalar_from! {
    String => String,
    &str => String,
    i64 => Integer,
    i32 => Integer,
    bool => Boolean,
    f64 => Float,
}

impl<T: Into<AttributeValue>> From<Vec<T>> for AttributeValue {
    fn from(items: Vec<T>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }
}

/// Changes to one object, handed to [`UpdateOp`](crate::traits::UpdateOp).
///
/// Attributes named in neither `replace` nor `clear` keep their values on
/// the target, including ones the provisioner cannot read back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeDelta {
    /// Attributes whose values are replaced entirely.
    #[serde(default, skip_serializing_if = "AttributeSet::is_empty")]
    pub replace: AttributeSet,

    /// Attributes to strip of every value.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clear: Vec<String>,
}

impl AttributeDelta {
    /// Create an empty delta.
    pub fn new() -> Self {
        Self::default()
    }

    /// The changes that turn `before` into `after`.
    ///
    /// Attributes whose value differs or that are new are replaced;
    /// attributes missing from `after` are cleared.
    pub fn between(before: &AttributeSet, after: &AttributeSet) -> Self {
        let mut delta = Self::new();
        for (name, value) in after.iter() {
            if before.get(name) != Some(value) {
                delta.replace(name.as_str(), value.clone());
            }
        }
        for (name, _) in before.iter() {
            if !after.has(name) {
                delta.clear_attribute(name.as_str());
            }
        }
        delta
    }

    /// Replace an attribute's values. A `Null` value clears it instead.
    pub fn replace(
        &mut self,
        name: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> &mut Self {
        let name = name.into();
        match value.into() {
            AttributeValue::Null => {
                self.clear_attribute(name);
            }
            value => {
                self.clear.retain(|n| *n != name);
                self.replace.set(name, value);
            }
        }
        self
    }

    /// Remove every value of an attribute.
    pub fn clear_attribute(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        self.replace.remove(&name);
        if !self.clear.contains(&name) {
            self.clear.push(name);
        }
        self
    }

    /// Whether the delta changes nothing.
    pub fn is_empty(&self) -> bool {
        self.replace.is_empty() && self.clear.is_empty()
    }

    /// Names of every attribute the delta touches, sorted.
    pub fn affected_attributes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .replace
            .iter()
            .map(|(name, _)| name.as_str())
            .chain(self.clear.iter().map(String::as_str))
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Apply the delta to an object held in memory.
    pub fn apply_to(&self, target: &mut AttributeSet) {
        for name in &self.clear {
            target.remove(name);
        }
        for (name, value) in self.replace.iter() {
            target.set(name.as_str(), value.clone());
        }
    }
}

/// Search criteria handed to [`SearchOp`](crate::traits::SearchOp).
///
/// The provisioner only renames attributes inside a filter; evaluating it is
/// the connector's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Filter {
    /// Some value of the attribute equals `value`.
    Equals { attribute: String, value: String },
    /// Substring match.
    Contains { attribute: String, value: String },
    /// Prefix match.
    StartsWith { attribute: String, value: String },
    /// The attribute holds at least one value.
    Present { attribute: String },
    /// Every filter matches.
    And { filters: Vec<Filter> },
    /// At least one filter matches.
    Or { filters: Vec<Filter> },
    /// The inner filter does not match.
    Not { filter: Box<Filter> },
}

impl Filter {
    /// Shorthand for [`Filter::Equals`].
    pub fn eq(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Equals {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Shorthand for [`Filter::StartsWith`].
    pub fn starts_with(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self::StartsWith {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Shorthand for [`Filter::Present`].
    pub fn present(attribute: impl Into<String>) -> Self {
        Self::Present {
            attribute: attribute.into(),
        }
    }

    /// Rename every attribute referenced by the filter.
    ///
    /// Stops at the first name `rename` has no mapping for and returns it.
    pub fn map_attributes<F>(self, rename: &F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let renamed = |attribute: String| rename(&attribute).ok_or(attribute);
        let all = |filters: Vec<Filter>| {
            filters
                .into_iter()
                .map(|f| f.map_attributes(rename))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(match self {
            Self::Equals { attribute, value } => Self::Equals {
                attribute: renamed(attribute)?,
                value,
            },
            Self::Contains { attribute, value } => Self::Contains {
                attribute: renamed(attribute)?,
                value,
            },
            Self::StartsWith { attribute, value } => Self::StartsWith {
                attribute: renamed(attribute)?,
                value,
            },
            Self::Present { attribute } => Self::Present {
                attribute: renamed(attribute)?,
            },
            Self::And { filters } => Self::And {
                filters: all(filters)?,
            },
            Self::Or { filters } => Self::Or {
                filters: all(filters)?,
            },
            Self::Not { filter } => Self::Not {
                filter: Box::new(filter.map_attributes(rename)?),
            },
        })
    }
}

/// Page of a search: how many objects, and where the previous page stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Most objects to return.
    pub page_size: u32,
    /// Cookie from the previous [`SearchResult`]; `None` starts at the top.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookie: Option<String>,
}

impl PageRequest {
    /// First page of `page_size` objects.
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size,
            cookie: None,
        }
    }

    /// Continue from a previous page.
    #[must_use]
    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }
}

/// Objects a search returned, plus the cookie to continue from if the
/// connector stopped short.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Matching objects, with native names.
    pub objects: Vec<AttributeSet>,
    /// Set when more objects follow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cookie: Option<String>,
}

impl SearchResult {
    /// A final page holding `objects`.
    pub fn new(objects: Vec<AttributeSet>) -> Self {
        Self {
            objects,
            next_cookie: None,
        }
    }

    /// A final page with no objects.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Mark the page as partial, resumable from `cookie`.
    #[must_use]
    pub fn with_next_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.next_cookie = Some(cookie.into());
        self
    }
}
