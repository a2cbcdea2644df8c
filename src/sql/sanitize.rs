//! SQL identifier rendering
//!
//! Identifiers reaching SQL text come from catalog discovery. They are written
//! bare when PostgreSQL would read them back unchanged, and double-quoted
//! otherwise.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

static PLAIN_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("static identifier pattern"));

/// PostgreSQL reserved keywords that cannot be used as unquoted identifiers
pub const POSTGRES_RESERVED_WORDS: &[&str] = &[
    "ALL",
    "ANALYSE",
    "ANALYZE",
    "AND",
    "ANY",
    "ARRAY",
    "AS",
    "ASC",
    "ASYMMETRIC",
    "BOTH",
    "CASE",
    "CAST",
    "CHECK",
    "COLLATE",
    "COLUMN",
    "CONSTRAINT",
    "CREATE",
    "CURRENT_CATALOG",
    "CURRENT_DATE",
    "CURRENT_ROLE",
    "CURRENT_TIME",
    "CURRENT_TIMESTAMP",
    "CURRENT_USER",
    "DEFAULT",
    "DEFERRABLE",
    "DESC",
    "DISTINCT",
    "DO",
    "ELSE",
    "END",
    "EXCEPT",
    "FALSE",
    "FETCH",
    "FOR",
    "FOREIGN",
    "FROM",
    "GRANT",
    "GROUP",
    "HAVING",
    "IN",
    "INITIALLY",
    "INTERSECT",
    "INTO",
    "LATERAL",
    "LEADING",
    "LIMIT",
    "LOCALTIME",
    "LOCALTIMESTAMP",
    "NOT",
    "NULL",
    "OFFSET",
    "ON",
    "ONLY",
    "OR",
    "ORDER",
    "PLACING",
    "PRIMARY",
    "REFERENCES",
    "RETURNING",
    "SELECT",
    "SESSION_USER",
    "SOME",
    "SYMMETRIC",
    "TABLE",
    "THEN",
    "TO",
    "TRAILING",
    "TRUE",
    "UNION",
    "UNIQUE",
    "USER",
    "USING",
    "VARIADIC",
    "WHEN",
    "WHERE",
    "WINDOW",
    "WITH",
];

/// Quote a SQL identifier, doubling any embedded double quotes
///
/// # Arguments
/// * `identifier` - The identifier to quote
///
/// # Returns
/// The identifier wrapped in double quotes with escaped internal quotes
///
/// # Example
/// ```
/// use runtara_table_accessor::sql::quote_identifier;
///
/// assert_eq!(quote_identifier("my_table"), "\"my_table\"");
/// ```
pub fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Whether `name` survives PostgreSQL identifier folding when left unquoted
///
/// True for lowercase ASCII names starting with a letter or underscore that
/// are not reserved keywords.
///
/// # Arguments
/// * `name` - The identifier to check
///
/// # Example
/// ```
/// use runtara_table_accessor::sql::is_plain_identifier;
///
/// assert!(is_plain_identifier("first_name"));
/// assert!(!is_plain_identifier("firstName"));
/// assert!(!is_plain_identifier("select")); // reserved keyword
/// ```
pub fn is_plain_identifier(name: &str) -> bool {
    PLAIN_IDENTIFIER.is_match(name)
        && !POSTGRES_RESERVED_WORDS.contains(&name.to_uppercase().as_str())
}

/// Render an identifier for SQL text: bare when plain, quoted otherwise
///
/// # Arguments
/// * `name` - A table or column name taken from catalog metadata
///
/// # Returns
/// The name borrowed unchanged when [`is_plain_identifier`] holds, otherwise
/// an owned quoted copy
///
/// # Example
/// ```
/// use runtara_table_accessor::sql::render_identifier;
///
/// assert_eq!(render_identifier("users"), "users");
/// assert_eq!(render_identifier("user"), "\"user\"");
/// assert_eq!(render_identifier("CamelCase"), "\"CamelCase\"");
/// ```
pub fn render_identifier(name: &str) -> Cow<'_, str> {
    if is_plain_identifier(name) {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(quote_identifier(name))
    }
}

/// Render a list of identifiers as a comma separated column list
///
/// # Arguments
/// * `names` - Column names, rendered in order through [`render_identifier`]
///
/// # Example
/// ```
/// use runtara_table_accessor::sql::render_identifier_list;
///
/// assert_eq!(render_identifier_list(&["id", "order"]), "id, \"order\"");
/// ```
pub fn render_identifier_list<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(|n| render_identifier(n.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}
