use std::collections::HashMap;

use crate::types::Fingerprint;

/// Fingerprints of destination rows mapped to whether the current run reconciled them.
///
/// Held entirely in memory, so its size grows with the destination table.
#[derive(Debug, Default)]
pub struct FingerprintIndex {
    entries: HashMap<Fingerprint, bool>,
}

impl FingerprintIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the content of the index with unreconciled `fingerprints`.
    pub fn rebuild<I>(&mut self, fingerprints: I)
    where
        I: IntoIterator<Item = Fingerprint>,
    {
        self.entries.clear();
        self.entries
            .extend(fingerprints.into_iter().map(|fingerprint| (fingerprint, false)));
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.contains_key(fingerprint)
    }

    /// Marks `fingerprint` as reconciled, returning whether it was present.
    pub fn mark_reconciled(&mut self, fingerprint: &Fingerprint) -> bool {
        match self.entries.get_mut(fingerprint) {
            Some(reconciled) => {
                *reconciled = true;
                true
            }
            None => false,
        }
    }

    /// Adds a fingerprint written during the run, already reconciled.
    pub fn insert_reconciled(&mut self, fingerprint: Fingerprint) {
        self.entries.insert(fingerprint, true);
    }

    /// Returns how many fingerprints were not reconciled by the run.
    pub fn unreconciled(&self) -> usize {
        self.entries.values().filter(|reconciled| !**reconciled).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebuild_replaces_previous_entries() {
        let mut index = FingerprintIndex::new();
        index.rebuild([Fingerprint::new("a"), Fingerprint::new("b")]);
        index.rebuild([Fingerprint::new("c")]);

        assert_eq!(index.len(), 1);
        assert!(index.contains(&Fingerprint::new("c")));
        assert!(!index.contains(&Fingerprint::new("a")));
    }

    #[test]
    fn reconciliation_is_tracked() {
        let mut index = FingerprintIndex::new();
        index.rebuild([Fingerprint::new("a"), Fingerprint::new("b")]);

        assert!(index.mark_reconciled(&Fingerprint::new("a")));
        assert!(!index.mark_reconciled(&Fingerprint::new("z")));
        assert_eq!(index.unreconciled(), 1);

        index.insert_reconciled(Fingerprint::new("z"));
        assert_eq!(index.len(), 3);
        assert_eq!(index.unreconciled(), 1);
    }
}
