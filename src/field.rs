//! Field registry: the named, typed attributes a query may reference.
//!
//! A registry is generic over its accessor. The object-list backend stores a
//! [`FieldAccessor`] per field, the SQL backend a column name and the document
//! backend a dot-delimited path. Parsing only needs names and declared types,
//! so the same grammar works for every registry.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{AccessorError, QueryError, QueryResult};
use crate::query::operand::parse_datetime;

/// Declared type of a field; decides which operand forms are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Int,
    Float,
    Bool,
    DateTime,
    List,
}

impl FieldType {
    pub fn is_numeric(self) -> bool {
        matches!(self, FieldType::Int | FieldType::Float)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Bool => "bool",
            FieldType::DateTime => "datetime",
            FieldType::List => "list",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value read from an object by a [`FieldAccessor`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    List(Vec<String>),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Text(_) => "string",
            Value::Number(_) => "number",
            Value::Bool(_) => "bool",
            Value::DateTime(_) => "datetime",
            Value::List(_) => "list",
        }
    }

    /// Convert to the representation indexed for `field_type`. NaN and
    /// infinities are rejected, since they would sort past every bound.
    ///
    /// Datetime fields also accept ISO-8601 text, since JSON documents carry
    /// dates as strings.
    pub fn coerce(self, field_type: FieldType) -> Result<Value, AccessorError> {
        match (field_type, self) {
            (FieldType::String, v @ Value::Text(_)) => Ok(v),
            (FieldType::Int | FieldType::Float, Value::Number(n)) if !n.is_finite() => {
                Err(AccessorError::Invalid(format!("{} is not a finite number", n)))
            }
            (FieldType::Int | FieldType::Float, v @ Value::Number(_)) => Ok(v),
            (FieldType::Bool, v @ Value::Bool(_)) => Ok(v),
            (FieldType::DateTime, v @ Value::DateTime(_)) => Ok(v),
            (FieldType::DateTime, Value::Text(s)) => parse_datetime(&s)
                .map(Value::DateTime)
                .ok_or_else(|| AccessorError::Invalid(format!("'{}' is not an ISO-8601 date", s))),
            (FieldType::List, v @ Value::List(_)) => Ok(v),
            (expected, found) => Err(AccessorError::TypeMismatch {
                expected: expected.to_string(),
                found: found.kind().to_string(),
            }),
        }
    }

    /// Convert a JSON value. `null` counts as missing.
    pub fn from_json(json: &JsonValue) -> Result<Value, AccessorError> {
        match json {
            JsonValue::Null => Err(AccessorError::Missing),
            JsonValue::String(s) => Ok(Value::Text(s.clone())),
            JsonValue::Bool(b) => Ok(Value::Bool(*b)),
            JsonValue::Number(n) => n
                .as_f64()
                .map(Value::Number)
                .ok_or_else(|| AccessorError::Invalid(format!("number {} out of range", n))),
            JsonValue::Array(items) => Ok(Value::List(
                items
                    .iter()
                    .map(|item| match item {
                        JsonValue::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            )),
            JsonValue::Object(_) => Err(AccessorError::TypeMismatch {
                expected: "scalar or array".to_string(),
                found: "object".to_string(),
            }),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::DateTime(d.and_time(chrono::NaiveTime::MIN))
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::List(items)
    }
}

/// Reads one field's value from an object of type `T`.
pub trait FieldAccessor<T>: Send + Sync {
    fn get(&self, object: &T) -> Result<Value, AccessorError>;
}

impl<T, F> FieldAccessor<T> for F
where
    F: Fn(&T) -> Result<Value, AccessorError> + Send + Sync,
{
    fn get(&self, object: &T) -> Result<Value, AccessorError> {
        self(object)
    }
}

/// Dot-delimited path lookup into a JSON document, e.g. `appendages.legs`.
/// Numeric segments index into arrays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    segments: Vec<String>,
}

impl JsonPath {
    pub fn new(path: &str) -> Self {
        Self {
            segments: path.split('.').map(str::to_string).collect(),
        }
    }

    pub fn lookup<'a>(&self, doc: &'a JsonValue) -> Option<&'a JsonValue> {
        self.segments.iter().try_fold(doc, |current, segment| match current {
            JsonValue::Object(map) => map.get(segment),
            JsonValue::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }
}

impl FieldAccessor<JsonValue> for JsonPath {
    fn get(&self, object: &JsonValue) -> Result<Value, AccessorError> {
        self.lookup(object)
            .ok_or(AccessorError::Missing)
            .and_then(Value::from_json)
    }
}

/// Boxed accessor used by object-list registries.
pub type BoxedAccessor<T> = Box<dyn FieldAccessor<T>>;

/// A queryable attribute: full name, abbreviation, declared type and the
/// backend-specific accessor.
pub struct Field<A> {
    pub full_name: String,
    pub abbreviation: String,
    pub field_type: FieldType,
    pub accessor: A,
}

impl<A> Field<A> {
    pub fn new(full_name: &str, abbreviation: &str, field_type: FieldType, accessor: A) -> Self {
        Self {
            full_name: full_name.to_lowercase(),
            abbreviation: abbreviation.to_lowercase(),
            field_type,
            accessor,
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        name == self.full_name || name == self.abbreviation
    }
}

impl<A> fmt::Debug for Field<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("full_name", &self.full_name)
            .field("abbreviation", &self.abbreviation)
            .field("field_type", &self.field_type)
            .finish_non_exhaustive()
    }
}

/// Immutable set of fields with unique (case-insensitive) names.
#[derive(Debug)]
pub struct FieldRegistry<A> {
    fields: Vec<Field<A>>,
}

impl<A> FieldRegistry<A> {
    pub fn builder() -> RegistryBuilder<A> {
        RegistryBuilder { fields: Vec::new() }
    }

    /// Build a registry, rejecting any name used by two different fields.
    pub fn new(fields: Vec<Field<A>>) -> QueryResult<Self> {
        let mut seen: Vec<(&str, usize)> = Vec::new();
        for (i, field) in fields.iter().enumerate() {
            for name in [field.full_name.as_str(), field.abbreviation.as_str()] {
                if seen.iter().any(|(n, owner)| *n == name && *owner != i) {
                    return Err(QueryError::DuplicateField(name.to_string()));
                }
                seen.push((name, i));
            }
        }
        Ok(Self { fields })
    }

    /// Resolve a full name or abbreviation, case-insensitively.
    pub fn resolve(&self, name: &str) -> QueryResult<(usize, &Field<A>)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, field)| field.matches(name))
            .ok_or_else(|| QueryError::UnknownField(name.to_string()))
    }

    pub fn get(&self, index: usize) -> Option<&Field<A>> {
        self.fields.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field<A>> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

pub struct RegistryBuilder<A> {
    fields: Vec<Field<A>>,
}

impl<A> RegistryBuilder<A> {
    pub fn field(
        mut self,
        full_name: &str,
        abbreviation: &str,
        field_type: FieldType,
        accessor: impl Into<A>,
    ) -> Self {
        self.fields
            .push(Field::new(full_name, abbreviation, field_type, accessor.into()));
        self
    }

    pub fn build(self) -> QueryResult<FieldRegistry<A>> {
        FieldRegistry::new(self.fields)
    }
}

impl<T> RegistryBuilder<BoxedAccessor<T>> {
    /// Register a field read by a closure or any other [`FieldAccessor`].
    pub fn accessor<F>(
        self,
        full_name: &str,
        abbreviation: &str,
        field_type: FieldType,
        accessor: F,
    ) -> Self
    where
        F: FieldAccessor<T> + 'static,
    {
        let boxed: BoxedAccessor<T> = Box::new(accessor);
        self.field(full_name, abbreviation, field_type, boxed)
    }

    /// Register a field read by attribute lookup; `None` means the object has
    /// no value for it.
    pub fn attribute<F>(
        self,
        full_name: &str,
        abbreviation: &str,
        field_type: FieldType,
        read: F,
    ) -> Self
    where
        T: 'static,
        F: Fn(&T) -> Option<Value> + Send + Sync + 'static,
    {
        self.accessor(full_name, abbreviation, field_type, move |object: &T| {
            read(object).ok_or(AccessorError::Missing)
        })
    }
}

impl RegistryBuilder<BoxedAccessor<JsonValue>> {
    /// Register a field read from a JSON document by dot path.
    pub fn path(self, full_name: &str, abbreviation: &str, field_type: FieldType, path: &str) -> Self {
        self.accessor(full_name, abbreviation, field_type, JsonPath::new(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn columns() -> FieldRegistry<String> {
        FieldRegistry::builder()
            .field("Name", "NM", FieldType::String, "name")
            .field("legs", "lg", FieldType::Int, "legs")
            .build()
            .unwrap()
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let registry = columns();
        let (i, field) = registry.resolve("nm").unwrap();
        assert_eq!(i, 0);
        assert_eq!(field.full_name, "name");
        assert_eq!(registry.resolve("LEGS").unwrap().0, 1);
        assert_eq!(registry.resolve("Lg").unwrap().1.accessor, "legs");
    }

    #[test]
    fn test_unknown_field() {
        let err = columns().resolve("eggs").unwrap_err();
        assert!(matches!(err, QueryError::UnknownField(ref f) if f == "eggs"));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = FieldRegistry::<String>::builder()
            .field("name", "nm", FieldType::String, "name")
            .field("number", "NM", FieldType::Int, "number")
            .build();
        assert!(matches!(result, Err(QueryError::DuplicateField(ref n)) if n == "nm"));

        // A field may reuse its own name as its abbreviation.
        let registry = FieldRegistry::<String>::builder()
            .field("age", "age", FieldType::Int, "age")
            .build();
        assert!(registry.is_ok());
    }

    #[test]
    fn test_json_path_accessor() {
        let doc = json!({"name": "duck", "appendages": {"legs": 2}, "tags": ["bird", 3]});
        assert_eq!(JsonPath::new("appendages.legs").get(&doc), Ok(Value::Number(2.0)));
        assert_eq!(JsonPath::new("appendages.arms").get(&doc), Err(AccessorError::Missing));
        assert_eq!(
            JsonPath::new("tags").get(&doc),
            Ok(Value::List(vec!["bird".to_string(), "3".to_string()]))
        );
        assert_eq!(JsonPath::new("tags.0").get(&doc), Ok(Value::Text("bird".to_string())));
    }

    #[test]
    fn test_coerce() {
        let dt = Value::Text("2010-03-15".to_string())
            .coerce(FieldType::DateTime)
            .unwrap();
        assert_eq!(
            dt,
            Value::from(NaiveDate::from_ymd_opt(2010, 3, 15).unwrap())
        );
        assert_eq!(Value::from(4).coerce(FieldType::Int), Ok(Value::Number(4.0)));
        assert!(matches!(
            Value::from("four").coerce(FieldType::Int),
            Err(AccessorError::TypeMismatch { .. })
        ));
        assert!(matches!(
            Value::from("someday").coerce(FieldType::DateTime),
            Err(AccessorError::Invalid(_))
        ));
    }

    #[test]
    fn test_coerce_rejects_non_finite_numbers() {
        for n in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                Value::from(n).coerce(FieldType::Float),
                Err(AccessorError::Invalid(_))
            ));
        }
        assert_eq!(Value::from(-0.5).coerce(FieldType::Float), Ok(Value::Number(-0.5)));
    }
}
