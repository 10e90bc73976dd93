//! Field descriptors
//!
//! One descriptor per schema field: name, type, required, indexed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SydbError};
use crate::validation::validate_field_name;

/// Declared type of a schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Int,
    Float,
    Bool,
    Array,
    Object,
    Null,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Bool => "bool",
            FieldType::Array => "array",
            FieldType::Object => "object",
            FieldType::Null => "null",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = SydbError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "string" => Ok(FieldType::String),
            "int" => Ok(FieldType::Int),
            "float" => Ok(FieldType::Float),
            "bool" => Ok(FieldType::Bool),
            "array" => Ok(FieldType::Array),
            "object" => Ok(FieldType::Object),
            "null" => Ok(FieldType::Null),
            other => Err(SydbError::Validation(format!(
                "unknown field type '{}'",
                other
            ))),
        }
    }
}

/// A single schema field
///
/// `indexed` is stored and reported but no index structure is built from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub indexed: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            indexed: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    /// Parse a command-line field spec: `name-type[-req][-idx]`
    ///
    /// `opt` and `unidx` are accepted as explicit defaults.
    pub fn parse_spec(spec: &str) -> Result<Self> {
        let mut parts = spec.split('-');
        let name = parts.next().unwrap_or_default();
        let field_type = parts
            .next()
            .ok_or_else(|| {
                SydbError::Validation(format!("field spec '{}' is missing a type", spec))
            })?
            .parse::<FieldType>()?;

        let mut descriptor = FieldDescriptor::new(name, field_type);
        for flag in parts {
            match flag {
                "req" => descriptor.required = true,
                "opt" => descriptor.required = false,
                "idx" => descriptor.indexed = true,
                "unidx" => descriptor.indexed = false,
                other => {
                    return Err(SydbError::Validation(format!(
                        "unknown flag '{}' in field spec '{}'",
                        other, spec
                    )))
                }
            }
        }
        validate_field_name(&descriptor.name)?;
        Ok(descriptor)
    }

    /// Render as one schema descriptor line: `name:type:required|optional:indexed|unindexed`
    pub fn to_line(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.name,
            self.field_type,
            if self.required { "required" } else { "optional" },
            if self.indexed { "indexed" } else { "unindexed" }
        )
    }

    /// Parse one schema descriptor line
    pub fn from_line(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.split(':').collect();
        if parts.len() != 4 {
            return Err(SydbError::CorruptFile(format!(
                "malformed schema line '{}'",
                line
            )));
        }

        let required = match parts[2] {
            "required" => true,
            "optional" => false,
            other => {
                return Err(SydbError::CorruptFile(format!(
                    "bad required flag '{}' in schema line",
                    other
                )))
            }
        };
        let indexed = match parts[3] {
            "indexed" => true,
            "unindexed" => false,
            other => {
                return Err(SydbError::CorruptFile(format!(
                    "bad indexed flag '{}' in schema line",
                    other
                )))
            }
        };

        Ok(Self {
            name: parts[0].to_string(),
            field_type: parts[1].parse()?,
            required,
            indexed,
        })
    }
}
