//! Opportunistic loading of LAZY bundles during host idle time
//!
//! The host's idle-detection source (for example "the network has been
//! quiet for a few seconds") calls [`LazyScheduler::drain`] repeatedly;
//! each call moves a bounded batch from the queue into detached
//! source-load tasks. Only the source is warmed, compilation still
//! happens on first real request.

use crate::loader::SourceLoader;
use mosaic_registry::ManifestStore;
use mosaic_types::{LoadStrategy, Manifest};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

pub const DEFAULT_LAZY_LOADER_LIMIT: usize = 2;

/// Drains the LAZY cohort in bounded batches
pub struct LazyScheduler {
    loader: Arc<SourceLoader>,
    limit: usize,
    queue: Mutex<VecDeque<Manifest>>,
    initialized: AtomicBool,
}

impl LazyScheduler {
    pub fn new(loader: Arc<SourceLoader>, limit: usize) -> Self {
        Self {
            loader,
            limit,
            queue: Mutex::new(VecDeque::new()),
            initialized: AtomicBool::new(false),
        }
    }

    /// Capture the LAZY cohort from the store. Idempotent; only the
    /// first call snapshots the queue.
    pub fn init(&self, store: &ManifestStore) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return;
        }

        let lazy = store.filter(|manifest| manifest.load_strategy == LoadStrategy::Lazy);
        debug!(queued = lazy.len(), "captured lazy bundle queue");
        *self.queue.lock().unwrap_or_else(|e| e.into_inner()) = lazy.into();
    }

    /// Pop up to the configured batch size and start loading each source
    /// in a detached task. Returns whether more work remains.
    ///
    /// Before initialization the answer is an optimistic `true`: the
    /// caller simply does not know yet and should ask again later.
    pub fn drain(&self) -> bool {
        if !self.initialized.load(Ordering::SeqCst) {
            return true;
        }

        let mut batch = Vec::with_capacity(self.limit);
        let has_more = {
            let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
            if queue.is_empty() {
                return false;
            }

            let mut has_more = true;
            for _ in 0..self.limit {
                match queue.pop_front() {
                    Some(manifest) => batch.push(manifest),
                    None => {
                        has_more = false;
                        break;
                    }
                }
            }
            has_more
        };

        for manifest in batch {
            let loader = self.loader.clone();
            tokio::spawn(async move {
                let _ = loader.load(&manifest).await;
            });
        }

        has_more
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchSource;
    use crate::processors::ProcessorPipeline;
    use async_trait::async_trait;
    use mosaic_types::FetchError;
    use std::sync::atomic::AtomicUsize;

    struct CountingFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FetchSource for CountingFetcher {
        async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("source".into())
        }
    }

    fn scheduler_with(manifests: Vec<Manifest>, limit: usize) -> (LazyScheduler, Arc<CountingFetcher>) {
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
        });
        let loader = Arc::new(SourceLoader::new(
            fetcher.clone(),
            Arc::new(|m: &Manifest| m.file_name.clone()),
            Arc::new(ProcessorPipeline::new()),
        ));
        let store = ManifestStore::new();
        store.register_all(manifests);

        let scheduler = LazyScheduler::new(loader, limit);
        scheduler.init(&store);
        (scheduler, fetcher)
    }

    fn lazy_manifest(name: &str) -> Manifest {
        Manifest::new(name, LoadStrategy::Lazy, format!("{name}.js"))
    }

    #[tokio::test]
    async fn uninitialized_scheduler_is_optimistic() {
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
        });
        let loader = Arc::new(SourceLoader::new(
            fetcher,
            Arc::new(|m: &Manifest| m.file_name.clone()),
            Arc::new(ProcessorPipeline::new()),
        ));

        let scheduler = LazyScheduler::new(loader, 2);
        assert!(scheduler.drain());
    }

    #[tokio::test]
    async fn drains_in_batches_until_complete() {
        let manifests = (0..5).map(|i| lazy_manifest(&format!("lazy{i}"))).collect();
        let (scheduler, _fetcher) = scheduler_with(manifests, 2);

        assert!(scheduler.drain()); // 5 -> 3
        assert!(scheduler.drain()); // 3 -> 1
        assert!(!scheduler.drain()); // 1 -> 0, queue ran dry mid-batch
        assert!(!scheduler.drain()); // already complete
    }

    #[tokio::test]
    async fn drain_only_touches_sources() {
        let (scheduler, fetcher) = scheduler_with(vec![lazy_manifest("lazy0")], 2);

        scheduler.drain();
        tokio::task::yield_now().await;

        // at most one fetch per queued manifest, nothing compiled
        assert!(fetcher.calls.load(Ordering::SeqCst) <= 1);
    }

    #[tokio::test]
    async fn init_snapshots_only_once() {
        let (scheduler, _fetcher) = scheduler_with(vec![lazy_manifest("lazy0")], 2);

        let refill = ManifestStore::new();
        refill.register_all(vec![lazy_manifest("late")]);
        scheduler.init(&refill);

        assert!(!scheduler.drain()); // only the original single entry
    }
}
