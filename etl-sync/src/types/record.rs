use crate::types::{Cell, Fingerprint};

/// An ordered mapping of column names to values.
///
/// Records produced by an extractor carry the fingerprint of their identity columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    values: Vec<(String, Cell)>,
    fingerprint: Option<Fingerprint>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a record from `(column, value)` pairs.
    ///
    /// Later pairs overwrite earlier ones with the same column.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Cell>,
    {
        let mut record = Self::new();
        for (column, value) in pairs {
            record.set(column, value);
        }

        record
    }

    /// Returns the value of `column`, or [`None`] when the column is absent.
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Returns the value of `column`, treating absent columns as NULL.
    pub fn value_or_null(&self, column: &str) -> Cell {
        self.get(column).cloned().unwrap_or(Cell::Null)
    }

    /// Sets `column` to `value`, keeping the original position of existing columns.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Cell>) {
        let column = column.into();
        let value = value.into();

        match self.values.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => *existing = value,
            None => self.values.push((column, value)),
        }
    }

    /// Removes `column` and returns its value.
    pub fn remove(&mut self, column: &str) -> Option<Cell> {
        let position = self.values.iter().position(|(name, _)| name == column)?;
        Some(self.values.remove(position).1)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> &[(String, Cell)] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        self.fingerprint.as_ref()
    }

    pub fn set_fingerprint(&mut self, fingerprint: Option<Fingerprint>) {
        self.fingerprint = fingerprint;
    }

    pub fn with_fingerprint(mut self, fingerprint: Fingerprint) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }

    /// Computes the fingerprint of this record over `unique_columns`.
    ///
    /// Absent columns count as NULL.
    pub fn compute_fingerprint(&self, unique_columns: &[String]) -> Fingerprint {
        Fingerprint::compute(&self.identity(unique_columns))
    }

    /// Returns the values of `unique_columns`, with missing columns as [`Cell::Null`].
    pub fn identity(&self, unique_columns: &[String]) -> Vec<Cell> {
        unique_columns
            .iter()
            .map(|column| self.value_or_null(column))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_keeps_column_order() {
        let mut record = Record::from_pairs([("id", Cell::I32(1)), ("name", Cell::from("a"))]);
        record.set("id", 2);
        record.set("price", 10.5);

        assert_eq!(record.columns().collect::<Vec<_>>(), ["id", "name", "price"]);
        assert_eq!(record.get("id"), Some(&Cell::I32(2)));
    }

    #[test]
    fn absent_columns_are_null() {
        let record = Record::from_pairs([("id", 1)]);

        assert_eq!(record.get("missing"), None);
        assert_eq!(record.value_or_null("missing"), Cell::Null);
    }

    #[test]
    fn fingerprint_uses_identity_columns_in_order() {
        let record = Record::from_pairs([("b", Cell::from("x")), ("a", Cell::I32(1))]);
        let unique_columns = vec!["a".to_string(), "b".to_string()];

        assert_eq!(
            record.compute_fingerprint(&unique_columns),
            Fingerprint::compute(&[Cell::I32(1), Cell::from("x")])
        );
    }
}
