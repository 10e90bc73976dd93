//! Query Module
//!
//! Conjunctive `field:value` filters evaluated against decoded documents.
//!
//! ## Syntax
//! ```text
//! title:Widget,qty:3,name:"two words"
//! ```
//! - Clauses are separated by `,` and all must match (AND)
//! - Quotes around a value are stripped
//! - An empty query matches every document
//!
//! ## Comparison
//! A stored string must equal the value textually. Any other stored value is
//! compared after integer-prefix parsing of both sides, so `qty:3` matches a
//! stored `3` or `3.9`. Schema types are not consulted.

mod matcher;

pub use matcher::{matches_query, parse_int_prefix, Clause, Query};
