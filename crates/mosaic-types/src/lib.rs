//! Mosaic Types - Core types for micro-frontend bundle orchestration
//!
//! Mosaic loads independently built, independently deployed code units
//! ("bundles") described by a manifest tree, executes them against an
//! injected dependency surface, and tracks their lifecycle.
//!
//! ## Key Concepts
//!
//! - **Manifest**: Declarative metadata for a bundle (name, load strategy,
//!   source location, relations to other bundles)
//! - **SourceUnit**: A manifest paired with its fetched source text, or an
//!   absent-source marker when loading failed
//! - **CompiledUnit**: A manifest paired with its compiled export surface,
//!   or an absent-module marker when compilation failed
//! - **BundleExports**: The duck-typed surface a compiled bundle exposes,
//!   modeled as a capability record with optional members
//! - **PipelineError**: The failure taxonomy cached per bundle name

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod exports;
pub mod manifest;
pub mod units;

// Re-export main types
pub use error::{CompileError, ErrorKind, ExportError, FetchError, PipelineError};
pub use exports::{
    BundleExports, BundleExportsBuilder, Dependency, DependencyResolver, ExportFn,
};
pub use manifest::{LoadStrategy, Manifest, PrefetchSpec};
pub use units::{CompiledUnit, SourceUnit};
