//! Patch application against schema-constrained attribute sets.
//!
//! A patch is an ordered list of [`PatchOperation`]s applied to a fetched
//! object. Operations run left to right on a working copy; the first failure
//! aborts the whole sequence and the caller writes nothing.

use serde::{Deserialize, Serialize};
use tracing::debug;

use xavyo_connector::operation::{AttributeSet, AttributeValue};
use xavyo_connector::schema::{AttributeDataType, ObjectClass, SchemaAttribute};

use crate::error::{ResourceError, ResourceResult};

/// Kind of patch operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    /// Set the attribute (or one element of it).
    Replace,
    /// Add values; appends for multi-valued attributes.
    Add,
    /// Remove the attribute, matching values, or one element.
    Remove,
    /// Add a number to a numeric attribute.
    Increment,
}

impl PatchOp {
    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchOp::Replace => "replace",
            PatchOp::Add => "add",
            PatchOp::Remove => "remove",
            PatchOp::Increment => "increment",
        }
    }
}

impl std::fmt::Display for PatchOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Position within a multi-valued attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchIndex {
    /// After the last element (`/attr/-`).
    End,
    /// A zero-based element index (`/attr/1`).
    At(usize),
}

/// Target of a patch operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchPath {
    /// Internal attribute name.
    pub attribute: String,
    /// Element position, when the pointer names one.
    pub index: Option<PatchIndex>,
}

impl PatchPath {
    /// Parse a bare attribute name (`lastname`) or a pointer (`/email`,
    /// `/email/1`, `/email/-`).
    pub fn parse(field: &str) -> ResourceResult<Self> {
        let malformed = || ResourceError::bad_request(format!("Malformed patch field '{field}'"));

        let Some(pointer) = field.strip_prefix('/') else {
            if field.is_empty() || field.contains('/') {
                return Err(malformed());
            }
            return Ok(Self {
                attribute: field.to_string(),
                index: None,
            });
        };

        let segments: Vec<String> = pointer.split('/').map(unescape).collect();
        match segments.as_slice() {
            [attribute] if !attribute.is_empty() => Ok(Self {
                attribute: attribute.clone(),
                index: None,
            }),
            [attribute, index] if !attribute.is_empty() => {
                let index = if index == "-" {
                    PatchIndex::End
                } else if !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()) {
                    PatchIndex::At(index.parse().map_err(|_| malformed())?)
                } else {
                    return Err(malformed());
                };
                Ok(Self {
                    attribute: attribute.clone(),
                    index: Some(index),
                })
            }
            _ => Err(malformed()),
        }
    }
}

fn unescape(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

/// A single patch operation as received from a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    /// What to do.
    #[serde(rename = "operation")]
    pub op: PatchOp,
    /// Attribute name or pointer, parsed on application.
    pub field: String,
    /// Operand; absent for whole-attribute removal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<AttributeValue>,
}

impl PatchOperation {
    /// Create an operation of any kind.
    pub fn new(op: PatchOp, field: impl Into<String>, value: Option<AttributeValue>) -> Self {
        Self {
            op,
            field: field.into(),
            value,
        }
    }

    /// `replace(field, value)`.
    pub fn replace(field: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self::new(PatchOp::Replace, field, Some(value.into()))
    }

    /// `add(field, value)`.
    pub fn add(field: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self::new(PatchOp::Add, field, Some(value.into()))
    }

    /// `remove(field)`.
    pub fn remove(field: impl Into<String>) -> Self {
        Self::new(PatchOp::Remove, field, None)
    }

    /// `remove(field, value)`.
    pub fn remove_value(field: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self::new(PatchOp::Remove, field, Some(value.into()))
    }

    /// `increment(field, delta)`.
    pub fn increment(field: impl Into<String>, delta: impl Into<AttributeValue>) -> Self {
        Self::new(PatchOp::Increment, field, Some(delta.into()))
    }

    /// Parsed target of this operation.
    pub fn path(&self) -> ResourceResult<PatchPath> {
        PatchPath::parse(&self.field)
    }

    fn operands(&self) -> Vec<AttributeValue> {
        self.value.clone().map(AttributeValue::into_values).unwrap_or_default()
    }
}

/// Applies patch operations to attribute sets of one object class.
#[derive(Debug, Clone, Copy)]
pub struct PatchEngine<'a> {
    object_class: &'a ObjectClass,
}

impl<'a> PatchEngine<'a> {
    /// Create an engine for the given object class.
    #[must_use]
    pub fn new(object_class: &'a ObjectClass) -> Self {
        Self { object_class }
    }

    /// Apply `operations` in order to a copy of `current`.
    ///
    /// `current` uses internal attribute names. Returns the patched copy, or
    /// the first failure.
    pub fn apply(
        &self,
        current: &AttributeSet,
        operations: &[PatchOperation],
    ) -> ResourceResult<AttributeSet> {
        let mut working = current.clone();
        for (position, operation) in operations.iter().enumerate() {
            debug!(
                position,
                op = %operation.op,
                field = %operation.field,
                "Applying patch operation"
            );
            self.apply_one(&mut working, operation)?;
        }
        Ok(working)
    }

    fn apply_one(
        &self,
        working: &mut AttributeSet,
        operation: &PatchOperation,
    ) -> ResourceResult<()> {
        let path = operation.path()?;
        let attr = self.object_class.get_attribute(&path.attribute).ok_or_else(|| {
            ResourceError::not_found(format!(
                "Attribute '{}' is not supported by object class '{}'",
                path.attribute, self.object_class.name
            ))
        })?;

        match operation.op {
            PatchOp::Replace => replace(working, attr, path.index, operation.operands())?,
            PatchOp::Add => add(working, attr, path.index, operation.operands())?,
            PatchOp::Remove => remove(
                working,
                attr,
                path.index,
                operation.value.is_some(),
                operation.operands(),
            )?,
            PatchOp::Increment => increment(working, attr, path.index, operation.operands())?,
        }

        if attr.required && !working.has(&attr.name) {
            return Err(ResourceError::policy_violation(format!(
                "Attribute '{}' is required and cannot be removed",
                attr.name
            )));
        }
        Ok(())
    }
}

fn current_values(working: &AttributeSet, attr: &SchemaAttribute) -> Vec<AttributeValue> {
    working
        .get(&attr.name)
        .cloned()
        .map(AttributeValue::into_values)
        .unwrap_or_default()
}

fn store(working: &mut AttributeSet, attr: &SchemaAttribute, mut values: Vec<AttributeValue>) {
    if values.is_empty() {
        working.remove(&attr.name);
    } else if attr.multi_valued {
        working.set(attr.name.clone(), AttributeValue::Array(values));
    } else {
        working.set(attr.name.clone(), values.swap_remove(0));
    }
}

fn check_types(attr: &SchemaAttribute, values: &[AttributeValue]) -> ResourceResult<()> {
    match values.iter().find(|v| !attr.accepts(v)) {
        Some(bad) => Err(ResourceError::type_mismatch(
            &attr.name,
            format!("value {} is not of type {}", bad.to_json(), attr.data_type),
        )),
        None => Ok(()),
    }
}

fn check_single(attr: &SchemaAttribute, values: &[AttributeValue]) -> ResourceResult<()> {
    if !attr.multi_valued && values.len() > 1 {
        return Err(ResourceError::type_mismatch(
            &attr.name,
            format!("single-valued attribute given {} values", values.len()),
        ));
    }
    Ok(())
}

fn require_multi(attr: &SchemaAttribute) -> ResourceResult<()> {
    if attr.multi_valued {
        Ok(())
    } else {
        Err(ResourceError::bad_request(format!(
            "Attribute '{}' is single-valued and cannot be indexed",
            attr.name
        )))
    }
}

fn out_of_range(attr: &SchemaAttribute, index: usize, len: usize) -> ResourceError {
    ResourceError::bad_request(format!(
        "Index {index} is out of range for attribute '{}' with {len} values",
        attr.name
    ))
}

fn replace(
    working: &mut AttributeSet,
    attr: &SchemaAttribute,
    index: Option<PatchIndex>,
    operands: Vec<AttributeValue>,
) -> ResourceResult<()> {
    check_types(attr, &operands)?;
    match index {
        None => {
            check_single(attr, &operands)?;
            store(working, attr, operands);
        }
        Some(PatchIndex::End) => return add(working, attr, index, operands),
        Some(PatchIndex::At(i)) => {
            require_multi(attr)?;
            let mut values = current_values(working, attr);
            if i >= values.len() {
                return Err(out_of_range(attr, i, values.len()));
            }
            let [replacement] = <[AttributeValue; 1]>::try_from(operands).map_err(|_| {
                ResourceError::bad_request(format!(
                    "Replacing element {i} of '{}' requires exactly one value",
                    attr.name
                ))
            })?;
            values[i] = replacement;
            store(working, attr, values);
        }
    }
    Ok(())
}

fn add(
    working: &mut AttributeSet,
    attr: &SchemaAttribute,
    index: Option<PatchIndex>,
    operands: Vec<AttributeValue>,
) -> ResourceResult<()> {
    check_types(attr, &operands)?;
    if operands.is_empty() {
        return Ok(());
    }

    if !attr.multi_valued {
        if index.is_some() {
            require_multi(attr)?;
        }
        check_single(attr, &operands)?;
        store(working, attr, operands);
        return Ok(());
    }

    let mut values = current_values(working, attr);
    match index {
        None | Some(PatchIndex::End) => values.extend(operands),
        Some(PatchIndex::At(i)) => {
            if i > values.len() {
                return Err(out_of_range(attr, i, values.len()));
            }
            values.splice(i..i, operands);
        }
    }
    store(working, attr, values);
    Ok(())
}

fn remove(
    working: &mut AttributeSet,
    attr: &SchemaAttribute,
    index: Option<PatchIndex>,
    has_value: bool,
    operands: Vec<AttributeValue>,
) -> ResourceResult<()> {
    match index {
        Some(PatchIndex::End) => Err(ResourceError::bad_request(format!(
            "Cannot remove '/{}/-'",
            attr.name
        ))),
        Some(PatchIndex::At(i)) => {
            require_multi(attr)?;
            let mut values = current_values(working, attr);
            if i >= values.len() {
                return Err(out_of_range(attr, i, values.len()));
            }
            values.remove(i);
            store(working, attr, values);
            Ok(())
        }
        None if !has_value => {
            working.remove(&attr.name);
            Ok(())
        }
        None => {
            let mut values = current_values(working, attr);
            if attr.multi_valued {
                values.retain(|v| !operands.contains(v));
                store(working, attr, values);
            } else if values.len() == 1 && operands == values {
                working.remove(&attr.name);
            }
            Ok(())
        }
    }
}

fn increment(
    working: &mut AttributeSet,
    attr: &SchemaAttribute,
    index: Option<PatchIndex>,
    operands: Vec<AttributeValue>,
) -> ResourceResult<()> {
    if index.is_some() {
        return Err(ResourceError::bad_request(format!(
            "Cannot increment an element of '{}'",
            attr.name
        )));
    }
    if attr.multi_valued || !attr.data_type.is_numeric() {
        return Err(ResourceError::type_mismatch(
            &attr.name,
            format!("cannot increment a {} attribute", attr.data_type),
        ));
    }

    let delta = match operands.as_slice() {
        [delta] if delta.is_numeric() && attr.accepts(delta) => delta.clone(),
        _ => {
            return Err(ResourceError::type_mismatch(
                &attr.name,
                "increment requires a single numeric value of the attribute's type",
            ))
        }
    };

    let current = match working.get(&attr.name) {
        None => AttributeValue::Integer(0),
        Some(v) if v.is_numeric() => v.clone(),
        Some(v) => {
            return Err(ResourceError::type_mismatch(
                &attr.name,
                format!("current value {} is not numeric", v.to_json()),
            ))
        }
    };

    let sum = match (&current, &delta, attr.data_type) {
        (AttributeValue::Integer(a), AttributeValue::Integer(b), _) => {
            AttributeValue::Integer(a.checked_add(*b).ok_or_else(|| {
                ResourceError::bad_request(format!("Incrementing '{}' overflows", attr.name))
            })?)
        }
        (_, _, AttributeDataType::Decimal) => AttributeValue::Float(
            current.as_float().unwrap_or_default() + delta.as_float().unwrap_or_default(),
        ),
        _ => {
            return Err(ResourceError::type_mismatch(
                &attr.name,
                format!("current value {} is not of type {}", current.to_json(), attr.data_type),
            ))
        }
    };

    working.set(attr.name.clone(), sum);
    Ok(())
}
