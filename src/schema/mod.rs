//! Schema Module
//!
//! Collection schemas: field descriptors, the on-disk descriptor text, and
//! write-time validation of documents.
//!
//! ## Descriptor Format
//! One field per line, newline-delimited:
//! ```text
//! title:string:required:unindexed
//! price:float:optional:indexed
//! ```

mod field;
mod value;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SydbError};
use crate::validation::validate_field_name;

pub use field::{FieldDescriptor, FieldType};
pub use value::FieldValue;

/// Fields injected by the engine on insert
pub const SYSTEM_FIELDS: [&str; 2] = ["_id", "_created_at"];

/// Ordered list of field descriptors for one collection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<FieldDescriptor>,
}

impl Schema {
    /// Build a schema, rejecting bad or duplicate field names
    pub fn new(fields: Vec<FieldDescriptor>) -> Result<Self> {
        let schema = Self { fields };
        schema.validate()?;
        Ok(schema)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(SydbError::Validation(
                "schema must declare at least one field".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            validate_field_name(&field.name)?;
            if SYSTEM_FIELDS.contains(&field.name.as_str()) {
                return Err(SydbError::Validation(format!(
                    "field name '{}' is reserved",
                    field.name
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(SydbError::Validation(format!(
                    "duplicate field '{}' in schema",
                    field.name
                )));
            }
        }
        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Render the newline-delimited descriptor stored next to the data file
    pub fn to_descriptor(&self) -> String {
        let mut text = String::new();
        for field in &self.fields {
            text.push_str(&field.to_line());
            text.push('\n');
        }
        text
    }

    /// Parse a descriptor previously written by `to_descriptor`
    pub fn from_descriptor(text: &str) -> Result<Self> {
        let fields = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(FieldDescriptor::from_line)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { fields })
    }

    /// CRC-32 of the descriptor text, recorded in the data file header
    pub fn checksum(&self) -> u32 {
        crc32fast::hash(self.to_descriptor().as_bytes())
    }

    /// Check a document's caller fields against the declared types.
    ///
    /// Required fields must be present, and non-null unless declared `null`;
    /// present fields must conform to their type. Fields not in the schema pass through.
    pub fn validate_document(&self, document: &Map<String, Value>) -> Result<()> {
        for field in &self.fields {
            match document.get(&field.name) {
                None if field.required => {
                    return Err(SydbError::Validation(format!(
                        "required field '{}' is missing",
                        field.name
                    )));
                }
                Some(Value::Null) if field.required && field.field_type != FieldType::Null => {
                    return Err(SydbError::Validation(format!(
                        "required field '{}' is missing",
                        field.name
                    )));
                }
                None => {}
                Some(value) => {
                    let typed = FieldValue::from_json(value);
                    if matches!(typed, FieldValue::Null) && !field.required {
                        continue;
                    }
                    if !typed.conforms_to(field.field_type) {
                        return Err(SydbError::Validation(format!(
                            "field '{}' expects {}, got {}",
                            field.name,
                            field.field_type,
                            typed.field_type()
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}
