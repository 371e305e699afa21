//! SQL dialects the fingerprint expression and statements can be rendered for.

use std::fmt;
use std::str::FromStr;

use crate::bail;
use crate::error::{ErrorKind, EtlError};
use crate::types::TableName;

/// Name of the computed fingerprint column added to every extracted row.
pub const FINGERPRINT_COLUMN: &str = "_fingerprint";

/// A SQL dialect.
///
/// Every dialect can render fingerprint queries and statements. Statements are only executed
/// against Postgres.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    MySql,
    SqlServer,
}

impl Dialect {
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
            Dialect::SqlServer => "sqlserver",
        }
    }

    /// Quotes a single identifier.
    ///
    /// Postgres identifiers are only quoted when required.
    pub fn quote_identifier(&self, identifier: &str) -> String {
        match self {
            Dialect::Postgres => pg_escape::quote_identifier(identifier).into_owned(),
            Dialect::MySql => format!("`{}`", identifier.replace('`', "``")),
            Dialect::SqlServer => format!("[{}]", identifier.replace(']', "]]")),
        }
    }

    /// Quotes a schema qualified table name.
    pub fn quote_table(&self, table: &TableName) -> String {
        match self {
            Dialect::Postgres => table.as_quoted_identifier(),
            Dialect::MySql | Dialect::SqlServer => format!(
                "{}.{}",
                self.quote_identifier(&table.schema),
                self.quote_identifier(&table.name)
            ),
        }
    }

    /// Returns an expression computing the MD5 fingerprint of `columns` as lowercase hex.
    ///
    /// Values are cast to text and joined with `|`. NULLs are skipped on Postgres and MySQL,
    /// where `CONCAT_WS` ignores them.
    pub fn fingerprint_expression(&self, columns: &[String]) -> String {
        let quoted = columns
            .iter()
            .map(|column| self.quote_identifier(column))
            .collect::<Vec<_>>();

        match self {
            Dialect::Postgres | Dialect::MySql => {
                format!("MD5(CONCAT_WS('|', {}))", quoted.join(", "))
            }
            Dialect::SqlServer => {
                let parts = quoted
                    .iter()
                    .map(|column| format!("CAST({column} as varchar)"))
                    .collect::<Vec<_>>()
                    .join(" + '|' + ");

                format!("LOWER(CONVERT(varchar(32), HASHBYTES('md5', {parts}), 2))")
            }
        }
    }

    /// Returns the placeholder of the 1-based parameter `position`.
    pub fn placeholder(&self, position: usize) -> String {
        match self {
            Dialect::Postgres => format!("${position}"),
            Dialect::MySql => "?".to_string(),
            Dialect::SqlServer => format!("@p{position}"),
        }
    }

    /// Returns the clause limiting a select to `limit` rows, placed after `order by`.
    pub fn limit_clause(&self, limit: usize) -> String {
        match self {
            Dialect::Postgres | Dialect::MySql => format!("limit {limit}"),
            Dialect::SqlServer => format!("offset 0 rows fetch next {limit} rows only"),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = EtlError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let dialect = match value.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pgsql" => Dialect::Postgres,
            "mysql" | "mariadb" => Dialect::MySql,
            "sqlserver" | "sqlsrv" | "mssql" => Dialect::SqlServer,
            _ => bail!(
                ErrorKind::ConfigError,
                "Unsupported database dialect, only Postgres, MySQL and SQL Server are supported",
                value
            ),
        };

        Ok(dialect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn postgres_fingerprint_expression() {
        assert_eq!(
            Dialect::Postgres.fingerprint_expression(&columns(&["id", "Region"])),
            r#"MD5(CONCAT_WS('|', id, "Region"))"#
        );
    }

    #[test]
    fn mysql_fingerprint_expression() {
        assert_eq!(
            Dialect::MySql.fingerprint_expression(&columns(&["id", "region"])),
            "MD5(CONCAT_WS('|', `id`, `region`))"
        );
    }

    #[test]
    fn sqlserver_fingerprint_expression() {
        assert_eq!(
            Dialect::SqlServer.fingerprint_expression(&columns(&["id", "region"])),
            "LOWER(CONVERT(varchar(32), HASHBYTES('md5', CAST([id] as varchar) + '|' + CAST([region] as varchar)), 2))"
        );
    }

    #[test]
    fn placeholders_per_dialect() {
        assert_eq!(Dialect::Postgres.placeholder(3), "$3");
        assert_eq!(Dialect::MySql.placeholder(3), "?");
        assert_eq!(Dialect::SqlServer.placeholder(3), "@p3");
    }

    #[test]
    fn unsupported_dialects_are_config_errors() {
        assert_eq!("PostgreSQL".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert_eq!("mssql".parse::<Dialect>().unwrap(), Dialect::SqlServer);

        let err = "sqlite".parse::<Dialect>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigError);
        assert_eq!(err.detail(), Some("sqlite"));
    }

    #[test]
    fn identifiers_are_escaped() {
        assert_eq!(Dialect::MySql.quote_identifier("a`b"), "`a``b`");
        assert_eq!(Dialect::SqlServer.quote_identifier("a]b"), "[a]]b]");
        assert_eq!(Dialect::Postgres.quote_identifier("Order Id"), r#""Order Id""#);
    }
}
