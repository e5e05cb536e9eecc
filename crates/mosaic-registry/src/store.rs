//! Manifest store and dotted-name resolution
//!
//! Root manifests are flattened one level on registration: a manifest
//! carrying sub-modules becomes its own entry (modules stripped) plus one
//! `root.child` entry per sub-module with inherited fields merged in.
//! Resolution walks the flattened list: an exact match is a MODULE, a
//! dotted miss is addressed as a CHILD of a module (`svc.child`) or of a
//! module-of-a-module (`svc.mod.fn`).

use dashmap::DashMap;
use mosaic_types::Manifest;
use std::sync::RwLock;
use tracing::error;

/// Outcome of resolving a dotted bundle name
#[derive(Debug, Clone)]
pub enum ResolvedBundle {
    /// The name addressed a registered manifest directly
    Module { manifest: Manifest },

    /// The name addressed a callable child of a registered manifest
    Child { manifest: Manifest, child: String },
}

impl ResolvedBundle {
    /// The manifest backing the resolution, whichever kind it is
    pub fn manifest(&self) -> &Manifest {
        match self {
            ResolvedBundle::Module { manifest } => manifest,
            ResolvedBundle::Child { manifest, .. } => manifest,
        }
    }

    pub fn into_manifest(self) -> Manifest {
        match self {
            ResolvedBundle::Module { manifest } => manifest,
            ResolvedBundle::Child { manifest, .. } => manifest,
        }
    }

    pub fn is_module(&self) -> bool {
        matches!(self, ResolvedBundle::Module { .. })
    }
}

/// Flat list of registered bundle manifests
///
/// Registration order is preserved for cohort selection; name lookups go
/// through a concurrent index. The first registration of a name wins.
pub struct ManifestStore {
    entries: RwLock<Vec<Manifest>>,
    by_name: DashMap<String, Manifest>,
}

impl ManifestStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            by_name: DashMap::new(),
        }
    }

    /// Register a manifest, flattening one level of sub-modules.
    ///
    /// Returns the entries actually added, root first.
    pub fn register(&self, manifest: &Manifest) -> Vec<Manifest> {
        let flattened = manifest.flatten();

        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        for entry in &flattened {
            entries.push(entry.clone());
            self.by_name
                .entry(entry.name.clone())
                .or_insert_with(|| entry.clone());
        }

        flattened
    }

    pub fn register_all(&self, manifests: impl IntoIterator<Item = Manifest>) {
        for manifest in manifests {
            self.register(&manifest);
        }
    }

    /// Exact-name lookup
    pub fn get(&self, name: &str) -> Option<Manifest> {
        self.by_name.get(name).map(|entry| entry.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Resolve a dotted name to a manifest and a search-result kind.
    ///
    /// Exact matches win and resolve as MODULE. Otherwise one dot
    /// addresses a child of a module and two dots address a child nested
    /// inside a module-of-a-module; only one level of child addressing is
    /// supported beyond the module name. Misses are reported, not thrown.
    pub fn resolve(&self, name: &str) -> Option<ResolvedBundle> {
        if let Some(manifest) = self.get(name) {
            return Some(ResolvedBundle::Module { manifest });
        }

        if !name.contains('.') {
            error!(module = name, "no manifest for module in the registered list");
            return None;
        }

        let parts: Vec<&str> = name.split('.').collect();

        if parts.len() == 2 {
            let Some(manifest) = self.get(parts[0]) else {
                error!(
                    searched = name,
                    parent = parts[0],
                    "looks like a child of a service, but the parent manifest is missing"
                );
                return None;
            };

            return Some(ResolvedBundle::Child {
                manifest,
                child: parts[1].to_string(),
            });
        }

        let module_name = format!("{}.{}", parts[0], parts[1]);
        let Some(manifest) = self.get(&module_name) else {
            error!(
                searched = name,
                module = module_name.as_str(),
                "no manifest for module in the registered list"
            );
            return None;
        };

        Some(ResolvedBundle::Child {
            manifest,
            child: parts[2].to_string(),
        })
    }

    /// All manifests matching the predicate, in registration order
    pub fn filter(&self, predicate: impl Fn(&Manifest) -> bool) -> Vec<Manifest> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .filter(|manifest| predicate(manifest))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ManifestStore {
    fn default() -> Self {
        Self::new()
    }
}
