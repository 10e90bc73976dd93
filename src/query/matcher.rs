//! Query parsing and matching

use std::str::FromStr;

use serde_json::Value;

use crate::error::{Result, SydbError};
use crate::validation::is_valid_field_name;

/// One `field:value` condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub field: String,
    pub value: String,
}

impl Clause {
    /// Evaluate against one document.
    ///
    /// String fields compare textually; everything else falls back to
    /// integer-prefix comparison of both sides.
    pub fn matches(&self, document: &Value) -> bool {
        match document.get(&self.field) {
            None => false,
            Some(Value::String(stored)) => *stored == self.value,
            Some(other) => {
                let stored = match other {
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    Value::Null => return false,
                    compound => compound.to_string(),
                };
                match (parse_int_prefix(&stored), parse_int_prefix(&self.value)) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                }
            }
        }
    }
}

/// A parsed conjunctive query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub clauses: Vec<Clause>,
}

impl Query {
    /// Parse `f1:v1,f2:v2`. Fails if any field name is not an identifier.
    pub fn parse(input: &str) -> Result<Self> {
        let mut clauses = Vec::new();

        for raw in input.split(',') {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }

            let (field, value) = raw.split_once(':').ok_or_else(|| {
                SydbError::Validation(format!("query clause '{}' is not field:value", raw))
            })?;

            let field = field.trim();
            if !is_valid_field_name(field) {
                return Err(SydbError::Validation(format!(
                    "invalid query field '{}'",
                    field
                )));
            }

            clauses.push(Clause {
                field: field.to_string(),
                value: strip_quotes(value.trim()).to_string(),
            });
        }

        Ok(Self { clauses })
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, document: &Value) -> bool {
        self.clauses.iter().all(|clause| clause.matches(document))
    }
}

impl FromStr for Query {
    type Err = SydbError;

    fn from_str(s: &str) -> Result<Self> {
        Query::parse(s)
    }
}

/// Parse-and-match in one step; an unparseable query matches nothing
pub fn matches_query(query: &str, document: &Value) -> bool {
    match Query::parse(query) {
        Ok(query) => query.matches(document),
        Err(_) => false,
    }
}

/// Leading-integer parse: optional whitespace and sign, then digits.
///
/// `"42abc"` gives 42, `"3.9"` gives 3, `"abc"` gives None.
pub fn parse_int_prefix(input: &str) -> Option<i64> {
    let trimmed = input.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits_len == 0 {
        return None;
    }

    let magnitude: i64 = rest[..digits_len].parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

fn strip_quotes(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}
