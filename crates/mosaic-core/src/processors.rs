//! Predicate-keyed lifecycle hooks run around every bundle
//!
//! Three phases: manifest preprocessors (before the source fetch), source
//! preprocessors (after the fetch, may rewrite the payload), and
//! postprocessors (after compile and start). Hooks are optional
//! enrichment; a failing hook is logged and swallowed so it can never
//! break loading.

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use mosaic_types::{CompiledUnit, Manifest, SourceUnit};
use std::future::Future;
use std::sync::{Arc, RwLock};
use tracing::{error, warn};

type ManifestMatcher = Arc<dyn Fn(&Manifest) -> bool + Send + Sync>;
type SourceMatcher = Arc<dyn Fn(&SourceUnit) -> bool + Send + Sync>;

type ManifestProcessor = Arc<dyn Fn(Manifest) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;
type SourceProcessor =
    Arc<dyn Fn(SourceUnit) -> BoxFuture<'static, anyhow::Result<SourceUnit>> + Send + Sync>;
type Postprocessor =
    Arc<dyn Fn(CompiledUnit) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Registry of lifecycle hooks, each gated by a matcher predicate
#[derive(Default)]
pub struct ProcessorPipeline {
    preprocessors: RwLock<Vec<(ManifestMatcher, ManifestProcessor)>>,
    source_preprocessors: RwLock<Vec<(SourceMatcher, SourceProcessor)>>,
    postprocessors: RwLock<Vec<(ManifestMatcher, Postprocessor)>>,
}

impl ProcessorPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hook run before a matching manifest's source is fetched
    pub fn register_preprocessor<M, F, Fut>(&self, matcher: M, processor: F)
    where
        M: Fn(&Manifest) -> bool + Send + Sync + 'static,
        F: Fn(Manifest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let mut preprocessors = self.preprocessors.write().unwrap_or_else(|e| e.into_inner());
        preprocessors.push((
            Arc::new(matcher),
            Arc::new(move |manifest| processor(manifest).boxed()),
        ));
    }

    /// Hook that may rewrite a matching source unit before compilation.
    /// Handlers chain left to right; each output feeds the next.
    pub fn register_source_preprocessor<M, F, Fut>(&self, matcher: M, processor: F)
    where
        M: Fn(&SourceUnit) -> bool + Send + Sync + 'static,
        F: Fn(SourceUnit) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<SourceUnit>> + Send + 'static,
    {
        let mut source_preprocessors = self
            .source_preprocessors
            .write()
            .unwrap_or_else(|e| e.into_inner());
        source_preprocessors.push((
            Arc::new(matcher),
            Arc::new(move |unit| processor(unit).boxed()),
        ));
    }

    /// Hook run after a matching bundle is compiled and started
    pub fn register_postprocessor<M, F, Fut>(&self, matcher: M, processor: F)
    where
        M: Fn(&Manifest) -> bool + Send + Sync + 'static,
        F: Fn(CompiledUnit) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let mut postprocessors = self.postprocessors.write().unwrap_or_else(|e| e.into_inner());
        postprocessors.push((
            Arc::new(matcher),
            Arc::new(move |unit| processor(unit).boxed()),
        ));
    }

    /// Run every matching preprocessor concurrently, awaited jointly
    pub async fn run_preprocessors(&self, manifest: &Manifest) {
        let selected: Vec<ManifestProcessor> = {
            let preprocessors = self.preprocessors.read().unwrap_or_else(|e| e.into_inner());
            preprocessors
                .iter()
                .filter(|(matcher, _)| matcher(manifest))
                .map(|(_, processor)| processor.clone())
                .collect()
        };

        let pending: Vec<_> = selected
            .iter()
            .map(|processor| processor(manifest.clone()))
            .collect();
        for result in join_all(pending).await {
            if let Err(err) = result {
                warn!(bundle = manifest.name.as_str(), error = %err, "manifest preprocessor failed");
            }
        }
    }

    /// Run matching source preprocessors as a left-to-right reduction.
    /// A failing handler is logged and its input passes through intact.
    pub async fn run_source_preprocessors(&self, unit: SourceUnit) -> SourceUnit {
        let selected: Vec<SourceProcessor> = {
            let source_preprocessors = self
                .source_preprocessors
                .read()
                .unwrap_or_else(|e| e.into_inner());
            source_preprocessors
                .iter()
                .filter(|(matcher, _)| matcher(&unit))
                .map(|(_, processor)| processor.clone())
                .collect()
        };

        let mut current = unit;
        for processor in selected {
            match processor(current.clone()).await {
                Ok(next) => current = next,
                Err(err) => {
                    warn!(
                        bundle = current.manifest.name.as_str(),
                        error = %err,
                        "source preprocessor failed, keeping the previous payload"
                    );
                }
            }
        }
        current
    }

    /// Run every matching postprocessor concurrently, awaited jointly.
    /// Skipped entirely when the unit carries no compiled module.
    pub async fn run_postprocessors(&self, unit: &CompiledUnit) {
        if !unit.is_compiled() {
            warn!(
                bundle = unit.manifest.name.as_str(),
                "cant run postprocessors, no compilation result"
            );
            return;
        }

        let selected: Vec<Postprocessor> = {
            let postprocessors = self.postprocessors.read().unwrap_or_else(|e| e.into_inner());
            postprocessors
                .iter()
                .filter(|(matcher, _)| matcher(&unit.manifest))
                .map(|(_, processor)| processor.clone())
                .collect()
        };

        let pending: Vec<_> = selected
            .iter()
            .map(|processor| processor(unit.clone()))
            .collect();
        for result in join_all(pending).await {
            if let Err(err) = result {
                error!(bundle = unit.manifest.name.as_str(), error = %err, "postprocessor failed");
            }
        }
    }
}
