//! The compile step and its pluggable execution seam
//!
//! Executing independently deployed code is environment-specific, so it
//! stays behind the narrow [`CompileBundle`] trait: a source unit plus a
//! dependency-resolution capability in, an export surface out. The
//! default implementation resolves bundles through a registry of factory
//! functions keyed by manifest name.

use async_trait::async_trait;
use dashmap::DashMap;
use mosaic_registry::ImportResolver;
use mosaic_types::{BundleExports, CompileError, CompiledUnit, PipelineError, SourceUnit};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::error;

/// Executes a bundle's source against an injected dependency surface
#[async_trait]
pub trait CompileBundle: Send + Sync {
    async fn compile(
        &self,
        unit: &SourceUnit,
        imports: ImportResolver,
    ) -> Result<BundleExports, CompileError>;
}

/// A registered bundle: takes the typed dependency-resolution capability,
/// returns the typed export surface
pub type BundleFactory =
    Arc<dyn Fn(ImportResolver) -> Result<BundleExports, CompileError> + Send + Sync>;

/// Default compile step: a registry of factory functions keyed by
/// manifest name
#[derive(Default)]
pub struct FactoryCompiler {
    factories: DashMap<String, BundleFactory>,
}

impl FactoryCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the factory for a bundle name
    pub fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(ImportResolver) -> Result<BundleExports, CompileError> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }
}

#[async_trait]
impl CompileBundle for FactoryCompiler {
    async fn compile(
        &self,
        unit: &SourceUnit,
        imports: ImportResolver,
    ) -> Result<BundleExports, CompileError> {
        let name = unit.manifest.name.as_str();
        let Some(factory) = self.factories.get(name).map(|f| f.clone()) else {
            return Err(CompileError(format!(
                "no factory registered for bundle \"{name}\""
            )));
        };

        factory(imports)
    }
}

/// What a compile attempt produced: the (possibly absent) compiled unit
/// and the classified failure, if any
pub struct CompileOutcome {
    pub unit: CompiledUnit,
    pub error: Option<PipelineError>,
}

/// Wraps the pluggable compile step with short-circuits and failure
/// memoization
pub struct Compiler {
    compile_fn: Arc<dyn CompileBundle>,
    failed: Mutex<HashSet<String>>,
}

impl Compiler {
    pub fn new(compile_fn: Arc<dyn CompileBundle>) -> Self {
        Self {
            compile_fn,
            failed: Mutex::new(HashSet::new()),
        }
    }

    /// Compile a source unit.
    ///
    /// An absent source short-circuits to an absent module without
    /// touching the compile step. A name whose previous attempt failed
    /// does the same, with a diagnostic and no fresh error. An actual
    /// failure memoizes the name and classifies as a compile error.
    pub async fn compile(&self, unit: SourceUnit, imports: ImportResolver) -> CompileOutcome {
        let manifest = unit.manifest.clone();
        let name = manifest.name.clone();

        if !unit.has_source() {
            return CompileOutcome {
                unit: CompiledUnit::absent(manifest),
                error: None,
            };
        }

        if self.has_failed(&name) {
            error!(
                bundle = name.as_str(),
                "source already known to be uncompilable, skipping compile"
            );
            return CompileOutcome {
                unit: CompiledUnit::absent(manifest),
                error: None,
            };
        }

        match self.compile_fn.compile(&unit, imports).await {
            Ok(exports) => CompileOutcome {
                unit: CompiledUnit::new(manifest, Arc::new(exports)),
                error: None,
            },
            Err(err) => {
                error!(bundle = name.as_str(), error = %err, "cant compile bundle");
                self.mark_failed(&name);
                CompileOutcome {
                    unit: CompiledUnit::absent(manifest),
                    error: Some(PipelineError::Compile {
                        name,
                        message: err.to_string(),
                    }),
                }
            }
        }
    }

    /// Drop a name from the failure memo so the next attempt really
    /// compiles again; used by the retry policy after redeploys
    pub fn forget(&self, name: &str) {
        self.failed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name);
    }

    fn has_failed(&self, name: &str) -> bool {
        self.failed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(name)
    }

    fn mark_failed(&self, name: &str) {
        self.failed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string());
    }
}
