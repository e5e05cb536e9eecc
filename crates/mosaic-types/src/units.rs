//! Per-attempt pairings of a manifest with its pipeline artifacts
//!
//! Failures resolve into absent markers rather than rejections; callers
//! check for absence and consult the error cache for the cause.

use crate::exports::BundleExports;
use crate::manifest::Manifest;
use std::sync::Arc;

/// A manifest paired with its fetched source text, or an absent-source
/// marker when loading failed
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub manifest: Manifest,
    pub source: Option<String>,
}

impl SourceUnit {
    pub fn new(manifest: Manifest, source: String) -> Self {
        Self {
            manifest,
            source: Some(source),
        }
    }

    /// Marker for a failed or suppressed load
    pub fn absent(manifest: Manifest) -> Self {
        Self {
            manifest,
            source: None,
        }
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }
}

/// A manifest paired with its compiled export surface, or an
/// absent-module marker when compilation failed
#[derive(Clone)]
pub struct CompiledUnit {
    pub manifest: Manifest,
    pub module: Option<Arc<BundleExports>>,
}

impl CompiledUnit {
    pub fn new(manifest: Manifest, module: Arc<BundleExports>) -> Self {
        Self {
            manifest,
            module: Some(module),
        }
    }

    /// Marker for a failed or suppressed compile
    pub fn absent(manifest: Manifest) -> Self {
        Self {
            manifest,
            module: None,
        }
    }

    pub fn is_compiled(&self) -> bool {
        self.module.is_some()
    }
}

impl std::fmt::Debug for CompiledUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledUnit")
            .field("manifest", &self.manifest.name)
            .field("compiled", &self.module.is_some())
            .finish()
    }
}
