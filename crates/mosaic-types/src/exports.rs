//! The export surface a compiled bundle exposes to the orchestrator
//!
//! The surface is duck-typed in spirit: every member is optional and
//! checked for presence rather than dispatched virtually. Bundles build
//! it through [`BundleExports::builder`].

use crate::error::ExportError;
use crate::manifest::Manifest;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// A trusted, type-erased service object injected into bundles
pub type Dependency = Arc<dyn Any + Send + Sync>;

/// Fallback resolver consulted when a named dependency is not found in
/// the primary registry
pub type DependencyResolver =
    Arc<dyn Fn(&str, Option<&Manifest>) -> Option<Dependency> + Send + Sync>;

/// A named callable export, the target of prefetch calls
pub type ExportFn = Arc<dyn Fn() -> Result<(), ExportError> + Send + Sync>;

type StartFn = Box<dyn Fn() -> Result<(), ExportError> + Send + Sync>;
type DependenciesFn = Box<dyn Fn() -> HashMap<String, Dependency> + Send + Sync>;
type ResolverFn = Box<dyn Fn() -> Option<DependencyResolver> + Send + Sync>;

/// Capability record produced by compiling a bundle
///
/// Well-known optional members: `start` (invoked once after compile),
/// `module_dependencies` (a name-to-object map merged into the
/// dependency registry), `unknown_resolver` (a fallback resolver
/// appended to the chain). Absence of any member is not an error.
#[derive(Default)]
pub struct BundleExports {
    start: Option<StartFn>,
    module_dependencies: Option<DependenciesFn>,
    unknown_resolver: Option<ResolverFn>,
    children: HashMap<String, ExportFn>,
}

impl BundleExports {
    pub fn builder() -> BundleExportsBuilder {
        BundleExportsBuilder::default()
    }

    /// An export surface with no capabilities at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// Invoke `start` if the bundle exposes it
    pub fn invoke_start(&self) -> Option<Result<(), ExportError>> {
        self.start.as_ref().map(|start| start())
    }

    /// Dependencies the bundle contributes to the registry, if any
    pub fn module_dependencies(&self) -> Option<HashMap<String, Dependency>> {
        self.module_dependencies.as_ref().map(|deps| deps())
    }

    /// Fallback resolver the bundle contributes, if it exposes the
    /// capability. The outer `Option` is capability presence; the inner
    /// value is whatever the bundle actually produced.
    pub fn unknown_resolver(&self) -> Option<Option<DependencyResolver>> {
        self.unknown_resolver.as_ref().map(|resolver| resolver())
    }

    /// Look up a named callable export
    pub fn child(&self, name: &str) -> Option<ExportFn> {
        self.children.get(name).cloned()
    }

    pub fn child_names(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(|name| name.as_str())
    }
}

impl std::fmt::Debug for BundleExports {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleExports")
            .field("start", &self.start.is_some())
            .field("module_dependencies", &self.module_dependencies.is_some())
            .field("unknown_resolver", &self.unknown_resolver.is_some())
            .field("children", &self.children.len())
            .finish()
    }
}

/// Builder for [`BundleExports`]
#[derive(Default)]
pub struct BundleExportsBuilder {
    exports: BundleExports,
}

impl BundleExportsBuilder {
    /// Expose a `start` hook, invoked once after compilation
    pub fn on_start<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Result<(), ExportError> + Send + Sync + 'static,
    {
        self.exports.start = Some(Box::new(f));
        self
    }

    /// Expose dependencies to install into the registry after start
    pub fn module_dependencies<F>(mut self, f: F) -> Self
    where
        F: Fn() -> HashMap<String, Dependency> + Send + Sync + 'static,
    {
        self.exports.module_dependencies = Some(Box::new(f));
        self
    }

    /// Expose a fallback dependency resolver
    pub fn unknown_resolver<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Option<DependencyResolver> + Send + Sync + 'static,
    {
        self.exports.unknown_resolver = Some(Box::new(f));
        self
    }

    /// Expose a named callable export
    pub fn child<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Result<(), ExportError> + Send + Sync + 'static,
    {
        self.exports.children.insert(name.into(), Arc::new(f));
        self
    }

    pub fn build(self) -> BundleExports {
        self.exports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn absent_capabilities_are_not_errors() {
        let exports = BundleExports::empty();
        assert!(exports.invoke_start().is_none());
        assert!(exports.module_dependencies().is_none());
        assert!(exports.unknown_resolver().is_none());
        assert!(exports.child("anything").is_none());
    }

    #[test]
    fn builder_wires_capabilities() {
        let started = Arc::new(AtomicUsize::new(0));
        let started_probe = started.clone();

        let exports = BundleExports::builder()
            .on_start(move || {
                started_probe.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .module_dependencies(|| {
                let mut deps: HashMap<String, Dependency> = HashMap::new();
                deps.insert("analytics".into(), Arc::new("tracker".to_string()));
                deps
            })
            .child("warmCache", || Ok(()))
            .build();

        assert_eq!(exports.invoke_start(), Some(Ok(())));
        assert_eq!(started.load(Ordering::SeqCst), 1);

        let deps = exports.module_dependencies().unwrap();
        let tracker = deps["analytics"].clone().downcast::<String>().unwrap();
        assert_eq!(*tracker, "tracker");

        let child = exports.child("warmCache").unwrap();
        assert!(child().is_ok());
    }
}
