use std::fmt;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use uuid::Uuid;

/// A single column value of a [`crate::types::Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Numeric(BigDecimal),
    String(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Uuid(Uuid),
    Json(serde_json::Value),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Returns the text form used when fingerprinting, or [`None`] for NULL.
    ///
    /// The forms match what Postgres produces when casting the value to text in a session
    /// running with `datestyle = ISO` and `timezone = UTC`.
    pub fn to_text(&self) -> Option<String> {
        let text = match self {
            Cell::Null => return None,
            Cell::Bool(value) => (if *value { "t" } else { "f" }).to_string(),
            Cell::I16(value) => value.to_string(),
            Cell::I32(value) => value.to_string(),
            Cell::I64(value) => value.to_string(),
            Cell::F32(value) => value.to_string(),
            Cell::F64(value) => value.to_string(),
            Cell::Numeric(value) => value.to_string(),
            Cell::String(value) => value.clone(),
            Cell::Bytes(value) => {
                let mut hex = String::with_capacity(2 + value.len() * 2);
                hex.push_str("\\x");
                for byte in value {
                    hex.push_str(&format!("{byte:02x}"));
                }
                hex
            }
            Cell::Date(value) => value.format("%Y-%m-%d").to_string(),
            Cell::Time(value) => value.format("%H:%M:%S%.f").to_string(),
            Cell::Timestamp(value) => value.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            Cell::TimestampTz(value) => value.format("%Y-%m-%d %H:%M:%S%.f+00").to_string(),
            Cell::Uuid(value) => value.hyphenated().to_string(),
            Cell::Json(value) => value.to_string(),
        };

        Some(text)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_text() {
            Some(text) => f.write_str(&text),
            None => f.write_str("NULL"),
        }
    }
}

/// Ordering between comparable cells of the same kind, used for watermarks.
impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Cell::Bool(a), Cell::Bool(b)) => a.partial_cmp(b),
            (Cell::I16(a), Cell::I16(b)) => a.partial_cmp(b),
            (Cell::I32(a), Cell::I32(b)) => a.partial_cmp(b),
            (Cell::I64(a), Cell::I64(b)) => a.partial_cmp(b),
            (Cell::F32(a), Cell::F32(b)) => a.partial_cmp(b),
            (Cell::F64(a), Cell::F64(b)) => a.partial_cmp(b),
            (Cell::Numeric(a), Cell::Numeric(b)) => a.partial_cmp(b),
            (Cell::String(a), Cell::String(b)) => a.partial_cmp(b),
            (Cell::Bytes(a), Cell::Bytes(b)) => a.partial_cmp(b),
            (Cell::Date(a), Cell::Date(b)) => a.partial_cmp(b),
            (Cell::Time(a), Cell::Time(b)) => a.partial_cmp(b),
            (Cell::Timestamp(a), Cell::Timestamp(b)) => a.partial_cmp(b),
            (Cell::TimestampTz(a), Cell::TimestampTz(b)) => a.partial_cmp(b),
            (Cell::Uuid(a), Cell::Uuid(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Bool(value)
    }
}

impl From<i16> for Cell {
    fn from(value: i16) -> Self {
        Cell::I16(value)
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        Cell::I32(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::I64(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::F64(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::String(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::String(value)
    }
}

impl From<NaiveDate> for Cell {
    fn from(value: NaiveDate) -> Self {
        Cell::Date(value)
    }
}

impl From<NaiveDateTime> for Cell {
    fn from(value: NaiveDateTime) -> Self {
        Cell::Timestamp(value)
    }
}

impl From<DateTime<Utc>> for Cell {
    fn from(value: DateTime<Utc>) -> Self {
        Cell::TimestampTz(value)
    }
}

impl From<Uuid> for Cell {
    fn from(value: Uuid) -> Self {
        Cell::Uuid(value)
    }
}

impl<T> From<Option<T>> for Cell
where
    T: Into<Cell>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_forms_follow_postgres_output() {
        assert_eq!(Cell::Null.to_text(), None);
        assert_eq!(Cell::Bool(true).to_text().unwrap(), "t");
        assert_eq!(Cell::I64(-42).to_text().unwrap(), "-42");
        assert_eq!(Cell::Bytes(vec![0xde, 0xad]).to_text().unwrap(), "\\xdead");

        let timestamp = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        assert_eq!(
            Cell::Timestamp(timestamp).to_text().unwrap(),
            "2024-01-02 03:04:05"
        );
        assert_eq!(
            Cell::TimestampTz(timestamp.and_utc()).to_text().unwrap(),
            "2024-01-02 03:04:05+00"
        );
    }

    #[test]
    fn cells_of_different_kinds_do_not_compare() {
        assert!(Cell::I32(1) < Cell::I32(2));
        assert_eq!(Cell::I32(1).partial_cmp(&Cell::I64(1)), None);
        assert_eq!(Cell::Null.partial_cmp(&Cell::Null), None);
    }

    #[test]
    fn options_map_to_null() {
        assert_eq!(Cell::from(None::<i32>), Cell::Null);
        assert_eq!(Cell::from(Some("a")), Cell::String("a".to_string()));
    }
}
