//! SQL utilities for the table accessor
//!
//! Provides statement generation, condition building, and identifier rendering.

pub mod condition;
pub mod dml;
pub mod sanitize;

pub use condition::{build_condition_clause, resolve_condition_fields};
pub use dml::DmlGenerator;
pub use sanitize::{
    POSTGRES_RESERVED_WORDS, is_plain_identifier, quote_identifier, render_identifier,
    render_identifier_list,
};
