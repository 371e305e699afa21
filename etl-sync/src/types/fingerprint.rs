use std::fmt;

use serde::Serialize;

use crate::types::Cell;

/// Separator placed between identity values before hashing.
pub const FINGERPRINT_SEPARATOR: &str = "|";

/// MD5 digest over the identity columns of a record, as 32 lowercase hex characters.
///
/// Fingerprints order lexicographically, which makes them usable as a pagination cursor.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wraps an already computed digest, normalizing it to lowercase.
    pub fn new(digest: impl Into<String>) -> Self {
        Self(digest.into().to_ascii_lowercase())
    }

    /// Computes the fingerprint of the given identity values.
    ///
    /// NULL values are skipped and the remaining text forms are joined with `|`, the same way
    /// `MD5(CONCAT_WS('|', ...))` does in SQL.
    pub fn compute<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a Cell>,
    {
        let joined = values
            .into_iter()
            .filter_map(Cell::to_text)
            .collect::<Vec<_>>()
            .join(FINGERPRINT_SEPARATOR);

        Self(format!("{:x}", md5::compute(joined.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Fingerprint> for Cell {
    fn from(value: Fingerprint) -> Self {
        Cell::String(value.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_values_give_same_fingerprint() {
        let a = Fingerprint::compute(&[Cell::I32(1), Cell::from("x")]);
        let b = Fingerprint::compute(&[Cell::I32(1), Cell::from("x")]);
        let c = Fingerprint::compute(&[Cell::I32(2), Cell::from("x")]);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn matches_known_md5_digests() {
        // md5('') is the digest of an empty identity.
        assert_eq!(
            Fingerprint::compute(&[Cell::I32(1), Cell::from("x")]).as_str(),
            format!("{:x}", md5::compute("1|x"))
        );
        assert_eq!(
            Fingerprint::compute(std::iter::empty::<&Cell>()).as_str(),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
    }

    #[test]
    fn nulls_are_skipped() {
        let with_null = Fingerprint::compute(&[Cell::I32(1), Cell::Null, Cell::from("x")]);
        let without_null = Fingerprint::compute(&[Cell::I32(1), Cell::from("x")]);

        assert_eq!(with_null, without_null);
    }

    #[test]
    fn new_normalizes_case() {
        assert_eq!(Fingerprint::new("ABC").as_str(), "abc");
    }
}
