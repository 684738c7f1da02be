//! PostgreSQL-style quoting for identifiers and literals in generated SQL.

/// Keywords that cannot be used as bare identifiers.
const RESERVED_KEYWORDS: &[&str] = &[
    "all",
    "analyse",
    "analyze",
    "and",
    "any",
    "array",
    "as",
    "asc",
    "asymmetric",
    "authorization",
    "binary",
    "both",
    "case",
    "cast",
    "check",
    "collate",
    "collation",
    "column",
    "concurrently",
    "constraint",
    "create",
    "cross",
    "current_catalog",
    "current_date",
    "current_role",
    "current_schema",
    "current_time",
    "current_timestamp",
    "current_user",
    "default",
    "deferrable",
    "desc",
    "distinct",
    "do",
    "else",
    "end",
    "except",
    "false",
    "fetch",
    "for",
    "foreign",
    "freeze",
    "from",
    "full",
    "grant",
    "group",
    "having",
    "ilike",
    "in",
    "initially",
    "inner",
    "intersect",
    "into",
    "is",
    "isnull",
    "join",
    "lateral",
    "leading",
    "left",
    "like",
    "limit",
    "localtime",
    "localtimestamp",
    "natural",
    "not",
    "notnull",
    "null",
    "offset",
    "on",
    "only",
    "or",
    "order",
    "outer",
    "overlaps",
    "placing",
    "primary",
    "references",
    "returning",
    "right",
    "select",
    "session_user",
    "similar",
    "some",
    "symmetric",
    "table",
    "tablesample",
    "then",
    "to",
    "trailing",
    "true",
    "union",
    "unique",
    "user",
    "using",
    "variadic",
    "verbose",
    "when",
    "where",
    "window",
    "with",
];

/// Schema assumed for unqualified table names.
pub const DEFAULT_SCHEMA: &str = "public";

fn is_bare_ident(s: &str) -> bool {
    let mut chars = s.chars();
    let first_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
    first_ok
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '$')
        && !RESERVED_KEYWORDS.contains(&s)
}

/// Quote a single identifier.
///
/// Lowercase identifiers that are not reserved words are returned as-is,
/// everything else is wrapped in double quotes with embedded quotes doubled.
pub fn quote_ident(s: &str) -> String {
    if is_bare_ident(s) {
        s.to_string()
    } else {
        format!("\"{}\"", s.replace('"', "\"\""))
    }
}

/// Quote a possibly schema-qualified name.
///
/// The name is split on the first `.` and each side is quoted separately. An
/// unqualified name is placed in [`DEFAULT_SCHEMA`].
pub fn quote_fqident(s: &str) -> String {
    match s.split_once('.') {
        Some((schema, name)) => format!("{}.{}", quote_ident(schema), quote_ident(name)),
        None => format!("{DEFAULT_SCHEMA}.{}", quote_ident(s)),
    }
}

/// Quote a value as an SQL literal, `None` being `NULL`.
///
/// Values containing a backslash use the `E'...'` escape string syntax so the
/// result is independent of `standard_conforming_strings`.
pub fn quote_literal(value: Option<&str>) -> String {
    let Some(value) = value else {
        return "NULL".to_string();
    };

    let quoted = value.replace('\'', "''");
    if quoted.contains('\\') {
        format!("E'{}'", quoted.replace('\\', "\\\\"))
    } else {
        format!("'{quoted}'")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idents() {
        assert_eq!(quote_ident("orders_2024_03"), "orders_2024_03");
        assert_eq!(quote_ident("_x$1"), "_x$1");
        assert_eq!(quote_ident("Orders"), "\"Orders\"");
        assert_eq!(quote_ident("2024"), "\"2024\"");
        assert_eq!(quote_ident("user"), "\"user\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
        assert_eq!(quote_ident("with space"), "\"with space\"");
        assert_eq!(quote_ident(""), "\"\"");
    }

    #[test]
    fn fqidents() {
        assert_eq!(quote_fqident("orders"), "public.orders");
        assert_eq!(
            quote_fqident("reporting.orders_2024_03"),
            "reporting.orders_2024_03"
        );
        assert_eq!(quote_fqident("Baz.Foo.Bar"), "\"Baz\".\"Foo.Bar\"");
        assert_eq!(quote_fqident("public.user"), "public.\"user\"");
    }

    #[test]
    fn literals() {
        assert_eq!(quote_literal(None), "NULL");
        assert_eq!(quote_literal(Some("")), "''");
        assert_eq!(quote_literal(Some("x")), "'x'");
        assert_eq!(quote_literal(Some("it's")), "'it''s'");
        assert_eq!(quote_literal(Some("a\\b")), "E'a\\\\b'");
    }
}
