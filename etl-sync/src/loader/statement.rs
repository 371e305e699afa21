use crate::bail;
use crate::dialect::Dialect;
use crate::error::{ErrorKind, EtlResult};
use crate::types::{Cell, Record, TableName};

/// Merges column lists keeping the first occurrence of every column.
fn merge_columns(base: &[String], extra: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(base.len() + extra.len());
    for column in base.iter().chain(extra) {
        if !merged.contains(column) {
            merged.push(column.clone());
        }
    }

    merged
}

/// A parameterized insert rendered once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement {
    table: TableName,
    columns: Vec<String>,
    sql: String,
}

impl InsertStatement {
    /// Plans an insert of `columns` followed by `insert_only_columns`.
    pub fn plan(
        dialect: Dialect,
        table: &TableName,
        columns: &[String],
        insert_only_columns: &[String],
    ) -> EtlResult<Self> {
        let columns = merge_columns(columns, insert_only_columns);
        if columns.is_empty() {
            bail!(
                ErrorKind::ConfigError,
                "Insert statement has no columns",
                table.to_string()
            );
        }

        let quoted = columns
            .iter()
            .map(|column| dialect.quote_identifier(column))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=columns.len())
            .map(|position| dialect.placeholder(position))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            "insert into {} ({quoted}) values ({placeholders})",
            dialect.quote_table(table)
        );

        Ok(Self {
            table: table.clone(),
            columns,
            sql,
        })
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Returns the parameters for `record`, NULL for columns it does not have.
    pub fn parameters(&self, record: &Record) -> Vec<Cell> {
        self.columns
            .iter()
            .map(|column| record.value_or_null(column))
            .collect()
    }
}

/// A parameterized update by identity rendered once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateStatement {
    table: TableName,
    set_columns: Vec<String>,
    key_columns: Vec<String>,
    sql: String,
}

impl UpdateStatement {
    /// Plans an update setting `columns` and `update_only_columns` except the identity columns,
    /// matched on the identity columns that are part of those lists.
    ///
    /// Fails when no column is left to set or no identity column is left to match on.
    pub fn plan(
        dialect: Dialect,
        table: &TableName,
        columns: &[String],
        update_only_columns: &[String],
        unique_columns: &[String],
    ) -> EtlResult<Self> {
        let all_columns = merge_columns(columns, update_only_columns);

        let set_columns = all_columns
            .iter()
            .filter(|column| !unique_columns.contains(*column))
            .cloned()
            .collect::<Vec<_>>();
        let key_columns = unique_columns
            .iter()
            .filter(|column| all_columns.contains(*column))
            .cloned()
            .collect::<Vec<_>>();

        if set_columns.is_empty() {
            bail!(
                ErrorKind::ConfigError,
                "Update statement has no columns to set besides the unique columns",
                table.to_string()
            );
        }

        if key_columns.is_empty() {
            bail!(
                ErrorKind::ConfigError,
                "Update statement has no unique column to match rows on",
                table.to_string()
            );
        }

        let assignments = set_columns
            .iter()
            .enumerate()
            .map(|(index, column)| {
                format!(
                    "{} = {}",
                    dialect.quote_identifier(column),
                    dialect.placeholder(index + 1)
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        let predicates = key_columns
            .iter()
            .enumerate()
            .map(|(index, column)| {
                format!(
                    "{} = {}",
                    dialect.quote_identifier(column),
                    dialect.placeholder(set_columns.len() + index + 1)
                )
            })
            .collect::<Vec<_>>()
            .join(" and ");

        let sql = format!(
            "update {} set {assignments} where {predicates}",
            dialect.quote_table(table)
        );

        Ok(Self {
            table: table.clone(),
            set_columns,
            key_columns,
            sql,
        })
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    pub fn set_columns(&self) -> &[String] {
        &self.set_columns
    }

    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Returns the set values followed by the key values for `record`.
    pub fn parameters(&self, record: &Record) -> Vec<Cell> {
        self.set_columns
            .iter()
            .chain(&self.key_columns)
            .map(|column| record.value_or_null(column))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    fn table() -> TableName {
        "public.products".parse().unwrap()
    }

    #[test]
    fn insert_includes_insert_only_columns_once() {
        let statement = InsertStatement::plan(
            Dialect::Postgres,
            &table(),
            &strings(&["id", "title"]),
            &strings(&["created_at", "title"]),
        )
        .unwrap();

        assert_eq!(statement.columns(), strings(&["id", "title", "created_at"]));
        assert_eq!(
            statement.sql(),
            "insert into public.products (id, title, created_at) values ($1, $2, $3)"
        );
    }

    #[test]
    fn update_sets_non_unique_columns_and_matches_on_unique_ones() {
        let statement = UpdateStatement::plan(
            Dialect::Postgres,
            &table(),
            &strings(&["id", "region", "title"]),
            &strings(&["updated_at"]),
            &strings(&["id", "region"]),
        )
        .unwrap();

        assert_eq!(
            statement.sql(),
            "update public.products set title = $1, updated_at = $2 where id = $3 and region = $4"
        );

        let record = Record::from_pairs([
            ("id", Cell::I32(7)),
            ("title", Cell::from("lamp")),
            ("region", Cell::from("eu")),
        ]);
        assert_eq!(
            statement.parameters(&record),
            vec![
                Cell::from("lamp"),
                Cell::Null,
                Cell::I32(7),
                Cell::from("eu")
            ]
        );
    }

    #[test]
    fn update_without_settable_columns_is_rejected() {
        let err = UpdateStatement::plan(
            Dialect::Postgres,
            &table(),
            &strings(&["id"]),
            &[],
            &strings(&["id"]),
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }

    #[test]
    fn update_without_unique_predicate_is_rejected() {
        let err = UpdateStatement::plan(
            Dialect::Postgres,
            &table(),
            &strings(&["title"]),
            &[],
            &strings(&["id"]),
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }

    #[test]
    fn statements_render_for_other_dialects() {
        let insert = InsertStatement::plan(
            Dialect::MySql,
            &table(),
            &strings(&["id", "title"]),
            &[],
        )
        .unwrap();
        assert_eq!(
            insert.sql(),
            "insert into `public`.`products` (`id`, `title`) values (?, ?)"
        );

        let update = UpdateStatement::plan(
            Dialect::SqlServer,
            &table(),
            &strings(&["id", "title"]),
            &[],
            &strings(&["id"]),
        )
        .unwrap();
        assert_eq!(
            update.sql(),
            "update [public].[products] set [title] = @p1 where [id] = @p2"
        );
    }
}
