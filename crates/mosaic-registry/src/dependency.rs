//! Dependency registry and the import capability handed to bundles
//!
//! Executed bundles never see the registry directly; they receive an
//! [`ImportResolver`] bound to their own manifest, so fallback resolvers
//! can tell which bundle is asking.

use crate::error::{RegistryError, Result};
use dashmap::DashMap;
use mosaic_types::{Dependency, DependencyResolver, Manifest};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Name-to-object map of dependencies available to executed bundles,
/// plus an ordered chain of fallback resolvers
#[derive(Default)]
pub struct DependencyRegistry {
    dependencies: DashMap<String, Dependency>,
    resolvers: RwLock<Vec<DependencyResolver>>,
}

impl DependencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the registry from a configured dependency map
    pub fn with_dependencies(dependencies: HashMap<String, Dependency>) -> Self {
        let registry = Self::new();
        for (name, value) in dependencies {
            registry.dependencies.insert(name, value);
        }
        registry
    }

    /// Install a dependency under a name.
    ///
    /// Fails with [`RegistryError::DuplicateDependency`] when the name is
    /// taken and `force` is false. `force` is reserved for the core's
    /// post-compile harvest; host code should not collide silently.
    pub fn install(&self, name: impl Into<String>, value: Dependency, force: bool) -> Result<()> {
        let name = name.into();

        if force {
            debug!(dependency = name.as_str(), "forced dependency install, reserved for the core");
        } else if self.dependencies.contains_key(&name) {
            return Err(RegistryError::DuplicateDependency(name));
        }

        self.dependencies.insert(name, value);
        Ok(())
    }

    /// Append a fallback resolver to the chain.
    ///
    /// Fails with [`RegistryError::InvalidResolver`] when the bundle
    /// claimed the capability but produced nothing callable.
    pub fn install_unknown_resolver(&self, resolver: Option<DependencyResolver>) -> Result<()> {
        let resolver = resolver.ok_or(RegistryError::InvalidResolver)?;
        let mut resolvers = self.resolvers.write().unwrap_or_else(|e| e.into_inner());
        resolvers.push(resolver);
        Ok(())
    }

    /// Resolve a named dependency for a requesting manifest.
    ///
    /// Exact match wins; otherwise each fallback resolver is consulted in
    /// registration order and the first hit is returned.
    pub fn resolve(&self, manifest: Option<&Manifest>, name: &str) -> Result<Dependency> {
        if let Some(dependency) = self.dependencies.get(name) {
            return Ok(dependency.clone());
        }

        let resolvers = self.resolvers.read().unwrap_or_else(|e| e.into_inner());
        for resolver in resolvers.iter() {
            if let Some(dependency) = resolver(name, manifest) {
                return Ok(dependency);
            }
        }

        Err(RegistryError::UnresolvedDependency(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.dependencies.contains_key(name)
    }
}

/// The dependency-resolution capability injected into a compiling bundle,
/// bound to the manifest being compiled
#[derive(Clone)]
pub struct ImportResolver {
    registry: Arc<DependencyRegistry>,
    manifest: Manifest,
}

impl ImportResolver {
    pub fn new(registry: Arc<DependencyRegistry>, manifest: Manifest) -> Self {
        Self { registry, manifest }
    }

    /// Resolve a dependency by name on behalf of the bound manifest
    pub fn require(&self, name: &str) -> Result<Dependency> {
        self.registry.resolve(Some(&self.manifest), name)
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }
}
