//! Mosaic Registry - Manifest store and dependency registry
//!
//! Two registries back the orchestration core:
//!
//! - **ManifestStore**: owns the flat list of bundle manifests (root
//!   bundles plus their sub-modules flattened into addressable siblings)
//!   and resolves dotted names to a manifest plus a search-result kind
//! - **DependencyRegistry**: holds the name-to-object map of dependencies
//!   available to executed bundles, plus an ordered chain of fallback
//!   resolvers
//!
//! Registry misuse (duplicate installs, invalid resolvers, undeclared
//! names) is reported synchronously; these are host programming errors,
//! not runtime conditions.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod dependency;
pub mod error;
pub mod store;

// Re-exports
pub use dependency::{DependencyRegistry, ImportResolver};
pub use error::{RegistryError, Result};
pub use store::{ManifestStore, ResolvedBundle};
