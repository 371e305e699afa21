use std::fmt;
use std::str::FromStr;

use pg_escape::quote_identifier;
use thiserror::Error;

/// Schema used when a table name is not qualified.
pub const DEFAULT_SCHEMA: &str = "public";

/// Errors raised while parsing a [`TableName`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableNameError {
    #[error("table name is empty")]
    Empty,

    #[error("table name `{0}` has more than one schema separator")]
    TooManyParts(String),
}

/// A fully qualified Postgres table name consisting of a schema and table name.
#[derive(Debug, Clone, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct TableName {
    /// The schema name containing the table
    pub schema: String,
    /// The name of the table within the schema
    pub name: String,
}

impl TableName {
    pub fn new(schema: String, name: String) -> TableName {
        Self { schema, name }
    }

    /// Returns the table name as a properly quoted Postgres identifier.
    pub fn as_quoted_identifier(&self) -> String {
        let quoted_schema = quote_identifier(&self.schema);
        let quoted_name = quote_identifier(&self.name);

        format!("{quoted_schema}.{quoted_name}")
    }
}

impl FromStr for TableName {
    type Err = TableNameError;

    /// Parses `table` or `schema.table`, defaulting the schema to [`DEFAULT_SCHEMA`].
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        let mut parts = value.split('.');

        let (schema, name) = match (parts.next(), parts.next(), parts.next()) {
            (Some(name), None, None) => (DEFAULT_SCHEMA, name),
            (Some(schema), Some(name), None) => (schema, name),
            (Some(_), Some(_), Some(_)) => {
                return Err(TableNameError::TooManyParts(value.to_string()));
            }
            _ => return Err(TableNameError::Empty),
        };

        if schema.is_empty() || name.is_empty() {
            return Err(TableNameError::Empty);
        }

        Ok(TableName::new(schema.to_string(), name.to_string()))
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("{0}.{1}", self.schema, self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unqualified_names_use_default_schema() {
        let table: TableName = "products".parse().unwrap();
        assert_eq!(table.schema, "public");
        assert_eq!(table.name, "products");
        assert_eq!(table.to_string(), "public.products");
    }

    #[test]
    fn quoted_identifier_escapes_when_needed() {
        let table: TableName = "Sales.order items".parse().unwrap();
        assert_eq!(table.as_quoted_identifier(), r#""Sales"."order items""#);

        let table: TableName = "sales.orders".parse().unwrap();
        assert_eq!(table.as_quoted_identifier(), "sales.orders");
    }

    #[test]
    fn invalid_names_are_rejected() {
        assert_eq!("".parse::<TableName>(), Err(TableNameError::Empty));
        assert_eq!(".orders".parse::<TableName>(), Err(TableNameError::Empty));
        assert!(matches!(
            "a.b.c".parse::<TableName>(),
            Err(TableNameError::TooManyParts(_))
        ));
    }
}
