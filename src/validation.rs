//! Name validation
//!
//! Database and collection names become path components, so they are checked
//! before anything touches the filesystem.

use crate::error::{Result, SydbError};

/// Maximum length of a database or collection name (bytes)
pub const MAX_NAME_LENGTH: usize = 255;

/// Maximum length of a schema field name (bytes)
pub const MAX_FIELD_NAME_LENGTH: usize = 63;

/// Maximum length of an instance id path component
pub const MAX_ID_LENGTH: usize = 64;

/// Returns true if `name` is usable as a database or collection name.
///
/// Allowed: ASCII letters, digits, `_`, `-`, `.`; never `.` or `..` alone.
pub fn is_valid_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_NAME_LENGTH {
        return false;
    }
    if name == "." || name == ".." {
        return false;
    }
    name.bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.')
}

/// Returns true if `name` is usable as a schema field or query field name.
pub fn is_valid_field_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_FIELD_NAME_LENGTH
        && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Returns true if `id` looks like an instance identifier path component.
pub fn is_valid_instance_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LENGTH
        && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

pub fn validate_database_name(name: &str) -> Result<()> {
    validate_name("database", name)
}

pub fn validate_collection_name(name: &str) -> Result<()> {
    validate_name("collection", name)
}

pub fn validate_field_name(name: &str) -> Result<()> {
    if is_valid_field_name(name) {
        Ok(())
    } else {
        Err(SydbError::Validation(format!(
            "invalid field name '{}': use 1-{} letters, digits or underscores",
            name, MAX_FIELD_NAME_LENGTH
        )))
    }
}

pub fn validate_instance_id(id: &str) -> Result<()> {
    if is_valid_instance_id(id) {
        Ok(())
    } else {
        Err(SydbError::Validation(format!("invalid instance id '{}'", id)))
    }
}

fn validate_name(kind: &str, name: &str) -> Result<()> {
    if is_valid_name(name) {
        return Ok(());
    }
    let reason = if name.is_empty() {
        "name is empty".to_string()
    } else if name.len() > MAX_NAME_LENGTH {
        format!("name exceeds {} bytes", MAX_NAME_LENGTH)
    } else if name == "." || name == ".." {
        "name is a reserved path component".to_string()
    } else {
        "only letters, digits, '_', '-' and '.' are allowed".to_string()
    };
    Err(SydbError::Validation(format!(
        "invalid {} name '{}': {}",
        kind, name, reason
    )))
}
