//! The orchestration state machine
//!
//! Owns the compiled-bundle task cache and the per-bundle error cache,
//! and sequences preprocessing, source load, compile, start, dependency
//! harvest, and postprocessing for every bundle. Concurrent requests for
//! the same name share one in-flight pipeline; block dependencies are
//! fully started before their dependent begins; prefetch and preload are
//! detached, best-effort tasks whose failures never reach the caller.

use crate::compiler::Compiler;
use crate::loader::{LoadOutcome, SourceLoader};
use crate::processors::ProcessorPipeline;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{join_all, BoxFuture, Shared};
use futures::FutureExt;
use mosaic_registry::{
    DependencyRegistry, ImportResolver, ManifestStore, RegistryError, ResolvedBundle,
};
use mosaic_types::{
    BundleExports, CompiledUnit, ErrorKind, Manifest, PipelineError, PrefetchSpec,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

type SharedPipeline = Shared<BoxFuture<'static, CompiledUnit>>;

/// The orchestrator: owns the caches and runs the bundle lifecycle
pub struct BundleCore {
    inner: Arc<CoreInner>,
}

struct CoreInner {
    store: Arc<ManifestStore>,
    dependencies: Arc<DependencyRegistry>,
    processors: Arc<ProcessorPipeline>,
    loader: Arc<SourceLoader>,
    compiler: Arc<Compiler>,
    tasks: DashMap<String, SharedPipeline>,
    errors: DashMap<String, PipelineError>,
    retry_compile_errors: bool,
}

impl BundleCore {
    pub fn new(
        store: Arc<ManifestStore>,
        dependencies: Arc<DependencyRegistry>,
        processors: Arc<ProcessorPipeline>,
        loader: Arc<SourceLoader>,
        compiler: Arc<Compiler>,
        retry_compile_errors: bool,
    ) -> Self {
        Self {
            inner: Arc::new(CoreInner {
                store,
                dependencies,
                processors,
                loader,
                compiler,
                tasks: DashMap::new(),
                errors: DashMap::new(),
                retry_compile_errors,
            }),
        }
    }

    /// Load, compile, and start a bundle.
    ///
    /// Infallible by design: failures resolve into an absent-module unit
    /// and a classified entry in the error cache.
    pub async fn load_and_compile(&self, manifest: &Manifest) -> CompiledUnit {
        CoreInner::load_and_compile(self.inner.clone(), manifest.clone()).await
    }

    /// Fire the pipeline for every manifest concurrently.
    ///
    /// Bulk operations never surface a rejection; per-name outcomes land
    /// in the caches as usual.
    pub async fn bulk_load(&self, manifests: Vec<Manifest>) {
        let pending: Vec<_> = manifests
            .into_iter()
            .map(|manifest| CoreInner::load_and_compile(self.inner.clone(), manifest))
            .collect();

        let results = join_all(pending).await;
        let absent = results.iter().filter(|unit| !unit.is_compiled()).count();
        if absent > 0 {
            warn!(
                absent,
                total = results.len(),
                "bulk load finished with absent bundles, see the error cache"
            );
        }
    }

    /// Seed the cache with an already-compiled bundle, for local
    /// development or statically linked bundles.
    ///
    /// Runs the same start/harvest sequence as a normal load and fans it
    /// out to any declared sub-modules whose compiled handles are
    /// provided, keyed by raw sub-module name.
    pub fn manually_register(
        &self,
        manifest: &Manifest,
        exports: Arc<BundleExports>,
        children: HashMap<String, Arc<BundleExports>>,
    ) -> Result<(), RegistryError> {
        if self.inner.tasks.contains_key(&manifest.name) {
            return Err(RegistryError::DuplicateManifest(manifest.name.clone()));
        }

        let added = self.inner.store.register(manifest);
        let mut entries = added.into_iter();
        if let Some(root) = entries.next() {
            self.inner.seed(root, exports);
        }

        for entry in entries {
            let raw_name = entry.name.rsplit('.').next().unwrap_or(entry.name.as_str());
            match children.get(raw_name) {
                Some(handle) => self.inner.seed(entry.clone(), handle.clone()),
                None => debug!(
                    module = entry.name.as_str(),
                    "no compiled handle provided for sub-module, it will load normally"
                ),
            }
        }

        Ok(())
    }

    /// The last classified failure for a bundle name, if any
    pub fn loading_error(&self, name: &str) -> Option<PipelineError> {
        self.inner.errors.get(name).map(|entry| entry.clone())
    }

    /// Whether a bundle's pipeline has completed with a compiled module
    pub fn is_loaded(&self, name: &str) -> bool {
        self.inner
            .tasks
            .get(name)
            .and_then(|task| task.peek().map(CompiledUnit::is_compiled))
            .unwrap_or(false)
    }
}

impl CoreInner {
    fn load_and_compile(inner: Arc<Self>, manifest: Manifest) -> BoxFuture<'static, CompiledUnit> {
        async move {
            CoreInner::spawn_prefetch(&inner, &manifest);
            CoreInner::spawn_preloads(&inner, &manifest);
            CoreInner::await_block_modules(&inner, &manifest).await;
            CoreInner::ensure_task(&inner, &manifest).await
        }
        .boxed()
    }

    /// Detach the prefetch call declared on the manifest, if any.
    ///
    /// The target bundle is ensured through the shared task cache and the
    /// named child export is invoked once it is up. Advisory only; every
    /// failure ends in a diagnostic.
    fn spawn_prefetch(inner: &Arc<Self>, manifest: &Manifest) {
        let Some(PrefetchSpec {
            service_name,
            fn_name,
        }) = manifest.prefetch_fn.clone()
        else {
            return;
        };

        let target = format!("{service_name}.{fn_name}");
        let Some(resolved) = inner.store.resolve(&target) else {
            debug!(target = target.as_str(), "prefetch target has no manifest");
            return;
        };

        let ResolvedBundle::Child {
            manifest: sibling,
            child,
        } = resolved
        else {
            debug!(
                target = target.as_str(),
                "prefetch target resolves to a whole module, nothing to call; \
                 use preloadModules to only warm a bundle"
            );
            return;
        };

        let inner = inner.clone();
        tokio::spawn(async move {
            let unit = CoreInner::ensure_task(&inner, &sibling).await;
            let Some(module) = unit.module else {
                debug!(target = target.as_str(), "prefetch skipped, no compiled module");
                return;
            };

            match module.child(&child) {
                Some(callable) => {
                    if let Err(err) = callable() {
                        error!(target = target.as_str(), error = %err, "cant complete prefetch call");
                    }
                }
                None => debug!(
                    target = target.as_str(),
                    "prefetch target does not export the named function"
                ),
            }
        });
    }

    /// Detach a full pipeline run for every preload entry; results are
    /// discarded, failures stay in the error cache
    fn spawn_preloads(inner: &Arc<Self>, manifest: &Manifest) {
        let Some(preload) = &manifest.preload_modules else {
            return;
        };

        for name in preload {
            match inner.store.resolve(name) {
                Some(resolved) => {
                    tokio::spawn(CoreInner::load_and_compile(
                        inner.clone(),
                        resolved.into_manifest(),
                    ));
                }
                None => debug!(module = name.as_str(), "preload target has no manifest"),
            }
        }
    }

    /// Await full completion of every block dependency, each subject to
    /// the same pipeline recursively
    async fn await_block_modules(inner: &Arc<Self>, manifest: &Manifest) {
        let Some(block) = &manifest.block_modules else {
            return;
        };
        if block.is_empty() {
            return;
        }

        let mut pending = Vec::with_capacity(block.len());
        for name in block {
            match inner.store.resolve(name) {
                Some(resolved) => pending.push(CoreInner::load_and_compile(
                    inner.clone(),
                    resolved.into_manifest(),
                )),
                None => debug!(module = name.as_str(), "block dependency has no manifest"),
            }
        }

        join_all(pending).await;
    }

    /// Share the in-flight task for a name, re-attempting only when the
    /// cached outcome carries a retry-eligible error
    async fn ensure_task(inner: &Arc<Self>, manifest: &Manifest) -> CompiledUnit {
        let name = manifest.name.clone();

        let task = match inner.tasks.entry(name.clone()) {
            Entry::Occupied(mut entry) => {
                if inner.should_retry(&name) {
                    if inner.retry_compile_errors {
                        inner.compiler.forget(&name);
                    }
                    let task = CoreInner::new_task(inner, manifest);
                    let _ = entry.insert(task.clone());
                    task
                } else {
                    entry.get().clone()
                }
            }
            Entry::Vacant(entry) => {
                let task = CoreInner::new_task(inner, manifest);
                entry.insert(task.clone());
                task
            }
        };

        task.await
    }

    /// Compile errors are sticky for the process lifetime unless the
    /// retry policy says otherwise; load and network errors always
    /// re-attempt (the loader throttles permanently dead URLs itself)
    fn should_retry(&self, name: &str) -> bool {
        match self.errors.get(name) {
            Some(error) => error.kind() != ErrorKind::Compile || self.retry_compile_errors,
            None => false,
        }
    }

    fn new_task(inner: &Arc<Self>, manifest: &Manifest) -> SharedPipeline {
        let inner = inner.clone();
        let manifest = manifest.clone();
        async move { inner.run_pipeline(manifest).await }.boxed().shared()
    }

    async fn run_pipeline(&self, manifest: Manifest) -> CompiledUnit {
        let name = manifest.name.clone();
        debug!(bundle = name.as_str(), "starting bundle pipeline");

        // 1. Manifest preprocessors
        self.processors.run_preprocessors(&manifest).await;

        // 2. Source load, including the source-preprocessor chain
        let LoadOutcome { unit, error } = self.loader.load(&manifest).await;
        match error {
            Some(error) => {
                self.errors.insert(name.clone(), error);
            }
            None if unit.has_source() => {
                self.errors.remove(&name);
            }
            None => {}
        }

        // 3. Compile against the injected dependency surface
        let imports = ImportResolver::new(self.dependencies.clone(), manifest.clone());
        let outcome = self.compiler.compile(unit, imports).await;

        // 4. Start and harvest before recording the compile outcome
        self.start_bundle(&outcome.unit);
        match outcome.error {
            Some(error) => {
                self.errors.insert(name.clone(), error);
            }
            None if outcome.unit.is_compiled() => {
                self.errors.remove(&name);
            }
            None => {}
        }

        // 5. Postprocessors
        self.processors.run_postprocessors(&outcome.unit).await;

        outcome.unit
    }

    /// Invoke `start()` in a protected call and install whatever the
    /// bundle exposes for future compiles
    fn start_bundle(&self, compiled: &CompiledUnit) {
        let Some(module) = &compiled.module else {
            return;
        };
        let name = compiled.manifest.name.as_str();

        if let Some(Err(err)) = module.invoke_start() {
            error!(bundle = name, error = %err, "cant execute start() in bundle");
        }

        if let Some(harvested) = module.module_dependencies() {
            for (dependency_name, value) in harvested {
                if let Err(err) = self.dependencies.install(dependency_name, value, true) {
                    error!(bundle = name, error = %err, "cant install harvested dependency");
                }
            }
        }

        if let Some(resolver) = module.unknown_resolver() {
            if let Err(err) = self.dependencies.install_unknown_resolver(resolver) {
                error!(
                    bundle = name,
                    error = %err,
                    "bundle produced an unusable unknown-dependency resolver"
                );
            }
        }
    }

    /// Seed the cache with a resolved unit and run start/harvest on it
    fn seed(&self, manifest: Manifest, exports: Arc<BundleExports>) {
        let compiled = CompiledUnit::new(manifest.clone(), exports);
        self.start_bundle(&compiled);

        let ready: SharedPipeline = futures::future::ready(compiled).boxed().shared();
        // drive the shared future to completion so cache queries see it
        let _ = ready.clone().now_or_never();
        self.tasks.insert(manifest.name.clone(), ready);
        self.errors.remove(&manifest.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{CompileBundle, FactoryCompiler};
    use crate::fetch::FetchSource;
    use async_trait::async_trait;
    use mosaic_types::{CompileError, FetchError, LoadStrategy};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted fetcher: responds per URL and call index, counts calls
    struct TestFetcher {
        calls: Mutex<HashMap<String, usize>>,
        respond: Box<dyn Fn(&str, usize) -> Result<String, FetchError> + Send + Sync>,
    }

    impl TestFetcher {
        fn new(
            respond: impl Fn(&str, usize) -> Result<String, FetchError> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(HashMap::new()),
                respond: Box::new(respond),
            })
        }

        fn ok() -> Arc<Self> {
            Self::new(|_, _| Ok("source".into()))
        }

        fn calls(&self, url: &str) -> usize {
            self.calls
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .get(url)
                .copied()
                .unwrap_or(0)
        }
    }

    #[async_trait]
    impl FetchSource for TestFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            let index = {
                let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
                let entry = calls.entry(url.to_string()).or_insert(0);
                let index = *entry;
                *entry += 1;
                index
            };
            (self.respond)(url, index)
        }
    }

    struct Harness {
        core: BundleCore,
        store: Arc<ManifestStore>,
        registry: Arc<DependencyRegistry>,
        factories: Arc<FactoryCompiler>,
        fetcher: Arc<TestFetcher>,
    }

    fn harness(fetcher: Arc<TestFetcher>) -> Harness {
        harness_with_policy(fetcher, false)
    }

    fn harness_with_policy(fetcher: Arc<TestFetcher>, retry_compile_errors: bool) -> Harness {
        let store = Arc::new(ManifestStore::new());
        let registry = Arc::new(DependencyRegistry::new());
        let processors = Arc::new(ProcessorPipeline::new());
        let loader = Arc::new(SourceLoader::new(
            fetcher.clone(),
            Arc::new(|m: &Manifest| m.file_name.clone()),
            processors.clone(),
        ));
        let factories = Arc::new(FactoryCompiler::new());
        let compile_fn: Arc<dyn CompileBundle> = factories.clone();
        let core = BundleCore::new(
            store.clone(),
            registry.clone(),
            processors,
            loader,
            Arc::new(Compiler::new(compile_fn)),
            retry_compile_errors,
        );

        Harness {
            core,
            store,
            registry,
            factories,
            fetcher,
        }
    }

    fn manifest(name: &str) -> Manifest {
        Manifest::new(name, LoadStrategy::OnDemand, format!("{name}.js"))
    }

    async fn settle() {
        for _ in 0..32 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_pipeline() {
        let harness = harness(TestFetcher::ok());
        let compiles = Arc::new(AtomicUsize::new(0));

        let probe = compiles.clone();
        harness.factories.register("svc", move |_| {
            probe.fetch_add(1, Ordering::SeqCst);
            Ok(BundleExports::empty())
        });

        let m = manifest("svc");
        let (first, second) = tokio::join!(
            harness.core.load_and_compile(&m),
            harness.core.load_and_compile(&m)
        );

        assert!(first.is_compiled());
        assert!(second.is_compiled());
        assert_eq!(harness.fetcher.calls("svc.js"), 1);
        assert_eq!(compiles.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn block_modules_start_before_dependent_compiles() {
        let harness = harness(TestFetcher::ok());
        let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        for name in ["a", "b"] {
            let events = events.clone();
            harness.store.register(&manifest(name));
            harness.factories.register(name, move |_| {
                let events = events.clone();
                Ok(BundleExports::builder()
                    .on_start(move || {
                        events
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .push(format!("start:{name}"));
                        Ok(())
                    })
                    .build())
            });
        }

        let probe = events.clone();
        harness.factories.register("m", move |_| {
            probe
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push("compile:m".into());
            Ok(BundleExports::empty())
        });

        let mut m = manifest("m");
        m.block_modules = Some(vec!["a".into(), "b".into()]);

        let unit = harness.core.load_and_compile(&m).await;
        assert!(unit.is_compiled());

        let events = events.lock().unwrap_or_else(|e| e.into_inner());
        let position = |event: &str| {
            events
                .iter()
                .position(|e| e == event)
                .unwrap_or_else(|| panic!("missing event {event} in {events:?}"))
        };
        assert!(position("start:a") < position("compile:m"));
        assert!(position("start:b") < position("compile:m"));
    }

    #[tokio::test]
    async fn permanent_load_error_suppresses_refetching() {
        let fetcher = TestFetcher::new(|_, _| Err(FetchError::Status(404)));
        let harness = harness(fetcher.clone());
        let m = manifest("svc");

        let unit = harness.core.load_and_compile(&m).await;
        assert!(!unit.is_compiled());
        assert_eq!(
            harness.core.loading_error("svc").map(|e| e.kind()),
            Some(ErrorKind::Load)
        );

        // a load error is retry-eligible, but the loader already knows
        // the URL is dead and never touches the network again
        harness.core.load_and_compile(&m).await;
        assert_eq!(fetcher.calls("svc.js"), 1);
        assert_eq!(
            harness.core.loading_error("svc").map(|e| e.kind()),
            Some(ErrorKind::Load)
        );
    }

    #[tokio::test]
    async fn connection_loss_retries_and_clears_on_success() {
        let fetcher = TestFetcher::new(|_, index| {
            if index == 0 {
                Err(FetchError::ConnectionLost("offline".into()))
            } else {
                Ok("source".into())
            }
        });
        let harness = harness(fetcher.clone());
        harness.factories.register("svc", |_| Ok(BundleExports::empty()));
        let m = manifest("svc");

        let unit = harness.core.load_and_compile(&m).await;
        assert!(!unit.is_compiled());
        assert_eq!(
            harness.core.loading_error("svc").map(|e| e.kind()),
            Some(ErrorKind::ConnectionLost)
        );

        let unit = harness.core.load_and_compile(&m).await;
        assert!(unit.is_compiled());
        assert_eq!(fetcher.calls("svc.js"), 2);
        assert!(harness.core.loading_error("svc").is_none());
    }

    #[tokio::test]
    async fn compile_errors_are_sticky() {
        let harness = harness(TestFetcher::ok());
        let compiles = Arc::new(AtomicUsize::new(0));

        let probe = compiles.clone();
        harness.factories.register("svc", move |_| {
            probe.fetch_add(1, Ordering::SeqCst);
            Err(CompileError("broken bundle".into()))
        });

        let m = manifest("svc");
        harness.core.load_and_compile(&m).await;
        assert_eq!(
            harness.core.loading_error("svc").map(|e| e.kind()),
            Some(ErrorKind::Compile)
        );

        // the cached task is reused wholesale, nothing is re-attempted
        harness.core.load_and_compile(&m).await;
        assert_eq!(compiles.load(Ordering::SeqCst), 1);
        assert_eq!(harness.fetcher.calls("svc.js"), 1);
    }

    #[tokio::test]
    async fn retry_policy_makes_compile_errors_retryable() {
        let fetcher = TestFetcher::ok();
        let harness = harness_with_policy(fetcher, true);
        let compiles = Arc::new(AtomicUsize::new(0));

        let probe = compiles.clone();
        harness.factories.register("svc", move |_| {
            let attempt = probe.fetch_add(1, Ordering::SeqCst);
            if attempt == 0 {
                Err(CompileError("broken on first deploy".into()))
            } else {
                Ok(BundleExports::empty())
            }
        });

        let m = manifest("svc");
        let unit = harness.core.load_and_compile(&m).await;
        assert!(!unit.is_compiled());

        let unit = harness.core.load_and_compile(&m).await;
        assert!(unit.is_compiled());
        assert_eq!(compiles.load(Ordering::SeqCst), 2);
        assert!(harness.core.loading_error("svc").is_none());
    }

    #[tokio::test]
    async fn harvested_dependencies_feed_later_compiles() {
        let harness = harness(TestFetcher::ok());

        harness.factories.register("provider", |_| {
            Ok(BundleExports::builder()
                .module_dependencies(|| {
                    let mut deps: HashMap<String, mosaic_types::Dependency> = HashMap::new();
                    deps.insert("shared-state".into(), Arc::new("state".to_string()));
                    deps
                })
                .unknown_resolver(|| {
                    Some(Arc::new(|name: &str, _: Option<&Manifest>| {
                        name.starts_with("dyn-")
                            .then(|| Arc::new(name.to_string()) as mosaic_types::Dependency)
                    }) as mosaic_types::DependencyResolver)
                })
                .build())
        });

        harness.factories.register("consumer", |imports| {
            imports
                .require("shared-state")
                .map_err(|err| CompileError(err.to_string()))?;
            imports
                .require("dyn-router")
                .map_err(|err| CompileError(err.to_string()))?;
            Ok(BundleExports::empty())
        });

        harness.core.load_and_compile(&manifest("provider")).await;
        let unit = harness.core.load_and_compile(&manifest("consumer")).await;
        assert!(unit.is_compiled());
        assert!(harness.registry.contains("shared-state"));
    }

    #[tokio::test]
    async fn bulk_load_isolates_per_bundle_failures() {
        let fetcher = TestFetcher::new(|url, _| {
            if url == "broken.js" {
                Err(FetchError::Status(500))
            } else {
                Ok("source".into())
            }
        });
        let harness = harness(fetcher);
        harness.factories.register("healthy", |_| Ok(BundleExports::empty()));

        harness
            .core
            .bulk_load(vec![manifest("broken"), manifest("healthy")])
            .await;

        assert!(harness.core.is_loaded("healthy"));
        assert!(!harness.core.is_loaded("broken"));
        assert_eq!(
            harness.core.loading_error("broken").map(|e| e.kind()),
            Some(ErrorKind::Load)
        );
    }

    #[tokio::test]
    async fn prefetch_invokes_the_sibling_export() {
        let harness = harness(TestFetcher::ok());
        let warmed = Arc::new(AtomicUsize::new(0));

        harness.store.register(&manifest("catalog"));
        let probe = warmed.clone();
        harness.factories.register("catalog", move |_| {
            let probe = probe.clone();
            Ok(BundleExports::builder()
                .child("warmCache", move || {
                    probe.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .build())
        });
        harness.factories.register("checkout", |_| Ok(BundleExports::empty()));

        let mut m = manifest("checkout");
        m.prefetch_fn = Some(PrefetchSpec {
            service_name: "catalog".into(),
            fn_name: "warmCache".into(),
        });

        harness.core.load_and_compile(&m).await;
        settle().await;

        assert_eq!(warmed.load(Ordering::SeqCst), 1);
        assert!(harness.core.is_loaded("catalog"));
    }

    #[tokio::test]
    async fn prefetch_of_a_whole_module_is_a_no_op() {
        let harness = harness(TestFetcher::ok());

        // "svc.mod" is a registered manifest, so the target resolves as
        // MODULE and there is nothing to call
        harness.store.register(&manifest("svc.mod"));
        harness.factories.register("checkout", |_| Ok(BundleExports::empty()));

        let mut m = manifest("checkout");
        m.prefetch_fn = Some(PrefetchSpec {
            service_name: "svc".into(),
            fn_name: "mod".into(),
        });

        harness.core.load_and_compile(&m).await;
        settle().await;

        assert_eq!(harness.fetcher.calls("svc.mod.js"), 0);
    }

    #[tokio::test]
    async fn preloads_are_detached_and_discarded() {
        let harness = harness(TestFetcher::ok());
        harness.store.register(&manifest("aux"));
        harness.factories.register("aux", |_| Ok(BundleExports::empty()));
        harness.factories.register("main", |_| Ok(BundleExports::empty()));

        let mut m = manifest("main");
        m.preload_modules = Some(vec!["aux".into(), "ghost".into()]);

        let unit = harness.core.load_and_compile(&m).await;
        assert!(unit.is_compiled());
        settle().await;

        assert!(harness.core.is_loaded("aux"));
    }

    #[tokio::test]
    async fn manual_registration_seeds_the_cache() {
        let harness = harness(TestFetcher::new(|_, _| {
            panic!("manually registered bundles must not hit the network")
        }));
        let started = Arc::new(AtomicUsize::new(0));

        let probe = started.clone();
        let exports = BundleExports::builder()
            .on_start(move || {
                probe.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build();

        let m = manifest("local");
        harness
            .core
            .manually_register(&m, Arc::new(exports), HashMap::new())
            .unwrap();

        assert!(harness.core.is_loaded("local"));
        assert_eq!(started.load(Ordering::SeqCst), 1);

        let unit = harness.core.load_and_compile(&m).await;
        assert!(unit.is_compiled());

        let err = harness
            .core
            .manually_register(&m, Arc::new(BundleExports::empty()), HashMap::new())
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateManifest(name) if name == "local"));
    }
}
