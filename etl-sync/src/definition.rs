//! Pairing of an extractor, an optional transform and a loader.

use std::fmt;
use std::sync::Arc;

use crate::error::EtlResult;
use crate::extractor::Extractor;
use crate::loader::Loader;
use crate::types::Record;

/// Output of a transform for a single extracted record.
#[derive(Debug, Clone, PartialEq)]
pub enum Transformed {
    /// The record is dropped.
    Skip,
    One(Record),
    /// The record expands into several records, loaded in order.
    Many(Vec<Record>),
}

impl Transformed {
    /// Returns the records to load, in order.
    pub fn into_records(self) -> Vec<Record> {
        match self {
            Transformed::Skip => Vec::new(),
            Transformed::One(record) => vec![record],
            Transformed::Many(records) => records,
        }
    }
}

impl From<Record> for Transformed {
    fn from(record: Record) -> Self {
        Transformed::One(record)
    }
}

impl From<Option<Record>> for Transformed {
    fn from(record: Option<Record>) -> Self {
        match record {
            Some(record) => Transformed::One(record),
            None => Transformed::Skip,
        }
    }
}

impl From<Vec<Record>> for Transformed {
    fn from(records: Vec<Record>) -> Self {
        Transformed::Many(records)
    }
}

/// Per record transform of a definition.
pub type Transform = Arc<dyn Fn(Record) -> EtlResult<Transformed> + Send + Sync>;

/// A named ETL job: where records come from, how they are reshaped and where they go.
pub struct EtlDefinition<E, L> {
    name: String,
    extractor: E,
    loader: L,
    transform: Option<Transform>,
}

impl<E, L> EtlDefinition<E, L>
where
    E: Extractor,
    L: Loader,
{
    /// Creates a definition forwarding every extracted record unchanged.
    pub fn new(name: impl Into<String>, extractor: E, loader: L) -> Self {
        Self {
            name: name.into(),
            extractor,
            loader,
            transform: None,
        }
    }

    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Record) -> EtlResult<Transformed> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn loader_mut(&mut self) -> &mut L {
        &mut self.loader
    }

    /// Applies the transform of the definition to `record`.
    pub fn transform(&self, record: Record) -> EtlResult<Transformed> {
        match &self.transform {
            Some(transform) => transform(record),
            None => Ok(Transformed::One(record)),
        }
    }

    /// Splits the definition into the parts a run uses concurrently.
    pub(crate) fn parts_mut(&mut self) -> (&E, &mut L, Option<&Transform>) {
        (&self.extractor, &mut self.loader, self.transform.as_ref())
    }
}

impl<E, L> fmt::Debug for EtlDefinition<E, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EtlDefinition")
            .field("name", &self.name)
            .field("transform", &self.transform.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Cell;

    #[test]
    fn transformed_flattens_in_order() {
        let first = Record::from_pairs([("id", Cell::I32(1))]);
        let second = Record::from_pairs([("id", Cell::I32(2))]);

        assert!(Transformed::Skip.into_records().is_empty());
        assert_eq!(
            Transformed::from(first.clone()).into_records(),
            vec![first.clone()]
        );
        assert_eq!(
            Transformed::from(vec![first.clone(), second.clone()]).into_records(),
            vec![first, second]
        );
        assert_eq!(Transformed::from(None::<Record>), Transformed::Skip);
    }
}
