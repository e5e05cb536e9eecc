//! Source loading with permanent-failure suppression
//!
//! URLs that answered with a non-success status are memoized per manifest
//! name and never fetched again; connectivity losses stay retryable.

use crate::config::UrlFormatter;
use crate::fetch::FetchSource;
use crate::processors::ProcessorPipeline;
use mosaic_types::{Manifest, PipelineError, SourceUnit};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{error, warn};

/// What a load attempt produced: the (possibly absent) source unit and
/// the classified failure, if any
pub struct LoadOutcome {
    pub unit: SourceUnit,
    pub error: Option<PipelineError>,
}

/// Fetches raw source text for manifests
pub struct SourceLoader {
    fetcher: Arc<dyn FetchSource>,
    format_url: UrlFormatter,
    processors: Arc<ProcessorPipeline>,
    dead: Mutex<HashSet<String>>,
}

impl SourceLoader {
    pub fn new(
        fetcher: Arc<dyn FetchSource>,
        format_url: UrlFormatter,
        processors: Arc<ProcessorPipeline>,
    ) -> Self {
        Self {
            fetcher,
            format_url,
            processors,
            dead: Mutex::new(HashSet::new()),
        }
    }

    /// Load the source text for a manifest.
    ///
    /// Names previously classified as permanently unloadable
    /// short-circuit to an absent-source unit without touching the
    /// network and without producing a fresh error (the cached one, if
    /// any, stays authoritative). Otherwise the result, success or
    /// failure, is routed through the source-preprocessor chain.
    pub async fn load(&self, manifest: &Manifest) -> LoadOutcome {
        let name = manifest.name.clone();

        if self.is_dead(&name) {
            warn!(
                bundle = name.as_str(),
                "source already known to be unloadable, skipping fetch"
            );
            return LoadOutcome {
                unit: SourceUnit::absent(manifest.clone()),
                error: None,
            };
        }

        let url = (self.format_url)(manifest);

        let (source, error) = match self.fetcher.fetch(&url).await {
            Ok(text) => (Some(text), None),
            Err(err) => {
                error!(
                    bundle = name.as_str(),
                    url = url.as_str(),
                    error = %err,
                    "cant load source for manifest"
                );
                let classified = if err.is_transient() {
                    PipelineError::ConnectionLost {
                        name: name.clone(),
                        message: err.to_string(),
                    }
                } else {
                    self.mark_dead(&name);
                    PipelineError::Load {
                        name: name.clone(),
                        message: err.to_string(),
                    }
                };
                (None, Some(classified))
            }
        };

        let unit = SourceUnit {
            manifest: manifest.clone(),
            source,
        };
        let unit = self.processors.run_source_preprocessors(unit).await;

        LoadOutcome { unit, error }
    }

    fn is_dead(&self, name: &str) -> bool {
        self.dead
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(name)
    }

    fn mark_dead(&self, name: &str) {
        self.dead
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string());
    }
}
