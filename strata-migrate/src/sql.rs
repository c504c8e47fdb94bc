//! SQL text helpers shared by the ledger, shadow and reset modules.

/// Quote a PostgreSQL identifier.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a PostgreSQL string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Qualified `"schema"."table"` reference.
pub fn qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_identifier(schema), quote_identifier(table))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("users"), "\"users\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("public"), "'public'");
        assert_eq!(quote_literal("o'neil"), "'o''neil'");
    }

    #[test]
    fn test_qualified() {
        assert_eq!(
            qualified("strata", "_strata_migrations"),
            "\"strata\".\"_strata_migrations\""
        );
    }
}
