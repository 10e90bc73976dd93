//! Typed field values
//!
//! Documents travel as permissive JSON; before a write each field is lifted
//! into a `FieldValue` and checked against its declared `FieldType`.

use serde_json::{Map, Value};

use super::FieldType;

/// A JSON field value tagged with its storage type
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Array(Vec<Value>),
    Object(Map<String, Value>),
    Null,
}

impl FieldValue {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(s) => FieldValue::String(s.clone()),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => FieldValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::Bool(b) => FieldValue::Bool(*b),
            Value::Array(items) => FieldValue::Array(items.clone()),
            Value::Object(map) => FieldValue::Object(map.clone()),
            Value::Null => FieldValue::Null,
        }
    }

    /// The field type this value naturally has
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::String(_) => FieldType::String,
            FieldValue::Integer(_) => FieldType::Int,
            FieldValue::Float(_) => FieldType::Float,
            FieldValue::Bool(_) => FieldType::Bool,
            FieldValue::Array(_) => FieldType::Array,
            FieldValue::Object(_) => FieldType::Object,
            FieldValue::Null => FieldType::Null,
        }
    }

    /// Whether this value may be stored in a field declared as `declared`.
    ///
    /// Integers widen to float.
    pub fn conforms_to(&self, declared: FieldType) -> bool {
        match (self, declared) {
            (FieldValue::Integer(_), FieldType::Float) => true,
            _ => self.field_type() == declared,
        }
    }
}

impl From<&Value> for FieldValue {
    fn from(value: &Value) -> Self {
        FieldValue::from_json(value)
    }
}
