//! Drives a definition from its extractor through its transform into its loader.

use std::fmt;
use std::pin::pin;

use futures::TryStreamExt;
use tracing::{debug, info};

use crate::bail;
use crate::definition::EtlDefinition;
use crate::error::{ErrorKind, EtlResult};
use crate::extractor::Extractor;
use crate::loader::Loader;
use crate::runtime::RuntimeInfo;

/// Number of extracted records between two progress reports when none is configured.
pub const DEFAULT_PROGRESS_EVERY: u64 = 10;

/// Callback receiving a runtime snapshot and the number of extracted records so far.
pub type ProgressCallback = Box<dyn FnMut(&RuntimeInfo, u64) + Send>;

struct Progress {
    every: u64,
    callback: ProgressCallback,
}

/// Runs definitions sequentially.
///
/// A run prepares the loader, optionally reads the incremental watermark from it, then streams
/// every extracted record through the transform into the loader before calling
/// [`Loader::cleanup`]. The first error stops the run and is returned as is; writes of batches
/// committed before it stay in place.
#[derive(Default)]
pub struct EtlExecutor {
    progress: Option<Progress>,
}

impl EtlExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports progress to `callback` once every `every` extracted records.
    ///
    /// Reports follow the load of the 1st, `every + 1`-th, `2 * every + 1`-th... record and carry
    /// the count of records extracted so far.
    pub fn with_progress_callback<F>(mut self, every: u64, callback: F) -> EtlResult<Self>
    where
        F: FnMut(&RuntimeInfo, u64) + Send + 'static,
    {
        if every == 0 {
            bail!(
                ErrorKind::ConfigError,
                "Progress callback interval must be positive"
            );
        }

        self.progress = Some(Progress {
            every,
            callback: Box::new(callback),
        });

        Ok(self)
    }

    /// Executes `definition`, restricting extraction to rows at or past the destination
    /// watermark when `incremental` is set.
    pub async fn execute<E, L>(
        &mut self,
        definition: &mut EtlDefinition<E, L>,
        incremental: bool,
    ) -> EtlResult<RuntimeInfo>
    where
        E: Extractor,
        L: Loader,
    {
        let name = definition.name().to_string();
        info!(definition = %name, incremental, "starting etl run");

        let (extractor, loader, transform) = definition.parts_mut();

        loader.prepare().await?;

        let watermark = if incremental {
            let watermark = loader.incremental_last_value().await?;
            debug!(definition = %name, ?watermark, "resolved incremental watermark");
            watermark
        } else {
            None
        };

        let mut records = pin!(extractor.extract(watermark));
        let mut iteration: u64 = 0;

        while let Some(record) = records.try_next().await? {
            let extractor_info = extractor.runtime_info();

            let outputs = match transform {
                Some(transform) => {
                    let identity = record.identity(extractor.unique_columns());
                    let mut outputs = transform(record)?.into_records();
                    for output in &mut outputs {
                        // A copy with another identity is a different row.
                        if output.identity(extractor.unique_columns()) != identity {
                            output.set_fingerprint(None);
                        }
                    }
                    outputs
                }
                None => vec![record],
            };

            for output in outputs {
                loader.load(output).await?;
            }

            if let Some(progress) = self.progress.as_mut() {
                if iteration % progress.every == 0 {
                    let snapshot = RuntimeInfo::new(extractor_info, loader.runtime_info());
                    (progress.callback)(&snapshot, iteration + 1);
                }
            }

            iteration += 1;
        }

        loader.cleanup().await?;

        let runtime_info = RuntimeInfo::new(extractor.runtime_info(), loader.runtime_info());
        info!(
            definition = %name,
            extracted = runtime_info.extractor.extracted_rows,
            inserted = runtime_info.loader.insert_count,
            updated = runtime_info.loader.update_count,
            skipped = runtime_info.loader.skip_count,
            "finished etl run"
        );

        Ok(runtime_info)
    }
}

impl fmt::Debug for EtlExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EtlExecutor")
            .field("progress_every", &self.progress.as_ref().map(|p| p.every))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_progress_interval_is_rejected() {
        let err = EtlExecutor::new()
            .with_progress_callback(0, |_, _| {})
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }
}
