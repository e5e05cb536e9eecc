//! The embedding surface host applications talk to
//!
//! A [`ModuleHost`] is wired once from a validated configuration. `init`
//! pulls the root manifest and gates on the blocking cohort, `start`
//! hands control to the host application and then warms the immediate
//! cohort, and everything else is on-demand.

use crate::compiler::Compiler;
use crate::config::{HostConfig, ManifestFlattener, ValidatedConfig};
use crate::core::BundleCore;
use crate::fetch::FetchSource;
use crate::lazy::LazyScheduler;
use crate::loader::SourceLoader;
use crate::processors::ProcessorPipeline;
use mosaic_registry::{DependencyRegistry, ManifestStore, RegistryError};
use mosaic_types::{BundleExports, CompiledUnit, FetchError, LoadStrategy, Manifest, PipelineError};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Failures surfaced by [`ModuleHost::init`]
#[derive(Debug, Error)]
pub enum InitError {
    #[error("cant fetch root manifest: {0}")]
    ManifestFetch(#[source] FetchError),

    #[error("cant parse root manifest: {0}")]
    ManifestParse(#[source] serde_json::Error),
}

/// Orchestration facade over the manifest store, dependency registry,
/// processor pipeline, loader, compiler, lazy scheduler, and core
pub struct ModuleHost {
    root_manifest_url: String,
    flattener: ManifestFlattener,
    fetcher: Arc<dyn FetchSource>,
    store: Arc<ManifestStore>,
    dependencies: Arc<DependencyRegistry>,
    processors: Arc<ProcessorPipeline>,
    lazy: Arc<LazyScheduler>,
    core: BundleCore,
}

impl std::fmt::Debug for ModuleHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleHost")
            .field("root_manifest_url", &self.root_manifest_url)
            .finish()
    }
}

impl ModuleHost {
    /// Build a host from configuration. Fails loudly before anything
    /// runs when required options are missing.
    pub fn new(config: HostConfig) -> Result<Self, crate::config::ConfigError> {
        let ValidatedConfig {
            root_manifest_url,
            manifest_flattener,
            url_formatter,
            dependencies,
            unknown_dependency_resolver,
            fetcher,
            compiler,
            lazy_loader_limit,
            retry_compile_errors,
        } = config.validate()?;

        let store = Arc::new(ManifestStore::new());
        let registry = Arc::new(DependencyRegistry::with_dependencies(dependencies));
        if let Some(resolver) = unknown_dependency_resolver {
            // configured resolver is first in the fallback chain
            let _ = registry.install_unknown_resolver(Some(resolver));
        }

        let processors = Arc::new(ProcessorPipeline::new());
        let loader = Arc::new(SourceLoader::new(
            fetcher.clone(),
            url_formatter,
            processors.clone(),
        ));
        let lazy = Arc::new(LazyScheduler::new(loader.clone(), lazy_loader_limit));
        let core = BundleCore::new(
            store.clone(),
            registry.clone(),
            processors.clone(),
            loader,
            Arc::new(Compiler::new(compiler)),
            retry_compile_errors,
        );

        Ok(Self {
            root_manifest_url,
            flattener: manifest_flattener,
            fetcher,
            store,
            dependencies: registry,
            processors,
            lazy,
            core,
        })
    }

    /// Fetch and register the manifest tree, then load the blocking
    /// cohort to completion. Disabled manifests are dropped.
    pub async fn init(&self) -> Result<(), InitError> {
        self.init_filtered(Manifest::is_enabled).await
    }

    /// Like [`ModuleHost::init`], with a caller-supplied filter over the
    /// flattened manifest list
    pub async fn init_filtered(
        &self,
        filter: impl Fn(&Manifest) -> bool,
    ) -> Result<(), InitError> {
        let text = self
            .fetcher
            .fetch(&self.root_manifest_url)
            .await
            .map_err(InitError::ManifestFetch)?;
        let document: serde_json::Value =
            serde_json::from_str(&text).map_err(InitError::ManifestParse)?;

        let manifests = (self.flattener)(document);
        self.store
            .register_all(manifests.into_iter().filter(|m| filter(m)));
        self.lazy.init(&self.store);

        let blocking = self
            .store
            .filter(|m| m.load_strategy == LoadStrategy::Block);
        info!(count = blocking.len(), "loading blocking bundles");
        self.core.bulk_load(blocking).await;

        Ok(())
    }

    /// Run the host application's startup closure, then begin loading
    /// the immediate cohort
    pub async fn start<F, Fut>(&self, runner: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        runner().await;

        let immediate = self
            .store
            .filter(|m| m.load_strategy == LoadStrategy::Immediate);
        info!(count = immediate.len(), "loading immediate bundles");
        self.core.bulk_load(immediate).await;
    }

    /// On-demand load by dotted name.
    ///
    /// Requesting an undeclared name is a programming error and reported
    /// synchronously; a declared bundle that fails to load resolves into
    /// an absent-module unit instead.
    pub async fn load(&self, name: &str) -> Result<CompiledUnit, RegistryError> {
        let resolved = self
            .store
            .resolve(name)
            .ok_or_else(|| RegistryError::UnknownModule(name.to_string()))?;

        Ok(self.core.load_and_compile(resolved.manifest()).await)
    }

    /// Helper for interface code that needs to know whether a bundle is
    /// already up
    pub fn is_loaded(&self, name: &str) -> bool {
        self.core.is_loaded(name)
    }

    /// The last classified failure for a bundle name, if any
    pub fn loading_error(&self, name: &str) -> Option<PipelineError> {
        self.core.loading_error(name)
    }

    /// Select manifests without direct access to the list
    pub fn filter(&self, predicate: impl Fn(&Manifest) -> bool) -> Vec<Manifest> {
        self.store.filter(predicate)
    }

    /// Register an already-compiled bundle, for local development or
    /// statically linked code
    pub fn manually_register(
        &self,
        manifest: &Manifest,
        exports: Arc<BundleExports>,
        children: HashMap<String, Arc<BundleExports>>,
    ) -> Result<(), RegistryError> {
        if self.store.contains(&manifest.name) && self.core.is_loaded(&manifest.name) {
            warn!(
                bundle = manifest.name.as_str(),
                "manually registering over an already loaded bundle"
            );
        }
        self.core.manually_register(manifest, exports, children)
    }

    /// Move one batch of LAZY bundles into loading. Returns whether more
    /// remain; wire this to an external idle-detection source.
    pub fn drain_lazy(&self) -> bool {
        self.lazy.drain()
    }

    /// The dependency registry, for runtime installs
    pub fn dependencies(&self) -> &Arc<DependencyRegistry> {
        &self.dependencies
    }

    /// The processor pipeline, for hook registration
    pub fn processors(&self) -> &Arc<ProcessorPipeline> {
        &self.processors
    }
}
