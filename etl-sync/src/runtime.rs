//! Counters and last issued statements reported while a run is in progress.

use serde::Serialize;

/// Runtime snapshot of an extractor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractorRuntimeInfo {
    /// Rows fetched from the source so far.
    pub extracted_rows: u64,
    /// Text of the last page query sent to the source.
    pub current_query: Option<String>,
}

/// Runtime snapshot of a loader.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoaderRuntimeInfo {
    pub insert_query: Option<String>,
    pub update_query: Option<String>,
    pub insert_count: u64,
    pub update_count: u64,
    pub delete_count: u64,
    pub skip_count: u64,
    /// Number of destination fingerprints loaded by the last prepare.
    pub index_count: u64,
}

/// Merged snapshot of both sides of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuntimeInfo {
    pub extractor: ExtractorRuntimeInfo,
    pub loader: LoaderRuntimeInfo,
}

impl RuntimeInfo {
    pub fn new(extractor: ExtractorRuntimeInfo, loader: LoaderRuntimeInfo) -> Self {
        Self { extractor, loader }
    }

    /// Renders the one line progress summary printed by the runner.
    pub fn summary(&self) -> String {
        format!(
            "Extracted: {} Inserted: {} Updated: {} Skipped: {} Indexed: {}",
            self.extractor.extracted_rows,
            self.loader.insert_count,
            self.loader.update_count,
            self.loader.skip_count,
            self.loader.index_count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_lists_all_counters() {
        let info = RuntimeInfo::new(
            ExtractorRuntimeInfo {
                extracted_rows: 5,
                current_query: None,
            },
            LoaderRuntimeInfo {
                insert_count: 2,
                update_count: 1,
                skip_count: 2,
                index_count: 7,
                ..Default::default()
            },
        );

        assert_eq!(
            info.summary(),
            "Extracted: 5 Inserted: 2 Updated: 1 Skipped: 2 Indexed: 7"
        );
    }

    #[test]
    fn serializes_as_nested_object() {
        let value = serde_json::to_value(RuntimeInfo::default()).unwrap();

        assert_eq!(value["extractor"]["extracted_rows"], 0);
        assert_eq!(value["loader"]["delete_count"], 0);
        assert!(value["loader"]["insert_query"].is_null());
    }
}
