//! Mosaic Core - Bundle resolution and the load/compile/start pipeline
//!
//! Orchestrates independently deployed bundles: resolves their manifests,
//! fetches source on demand, executes it against an injected dependency
//! surface, tracks lifecycle and failures, and schedules opportunistic
//! loading during host idle time.
//!
//! ## Architectural Boundaries
//!
//! - `mosaic-core` owns: pipeline sequencing, caching, retry suppression,
//!   scheduling
//! - `mosaic-registry` owns: the manifest list and the dependency surface
//! - The embedding application owns: the fetch transport, the manifest
//!   wire shape (via the flattener), URL formatting, and the actual
//!   execution of bundle code (via [`CompileBundle`])
//!
//! ## Usage
//!
//! ```no_run
//! use mosaic_core::{CompileBundle, FactoryCompiler, HostConfig, ModuleHost};
//! use mosaic_types::BundleExports;
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let factories = Arc::new(FactoryCompiler::new());
//! factories.register("checkout", |_imports| Ok(BundleExports::empty()));
//! let compiler: Arc<dyn CompileBundle> = factories;
//!
//! let host = ModuleHost::new(HostConfig {
//!     root_manifest_url: Some("https://cdn.example/manifest.json".into()),
//!     manifest_flattener: Some(Arc::new(|document| {
//!         serde_json::from_value(document).unwrap_or_default()
//!     })),
//!     url_formatter: Some(Arc::new(|m| {
//!         format!("https://cdn.example/bundles/{}", m.file_name)
//!     })),
//!     dependencies: Some(HashMap::new()),
//!     compiler: Some(compiler),
//!     ..HostConfig::default()
//! })?;
//!
//! host.init().await?;
//! host.start(|| async {}).await;
//!
//! let checkout = host.load("checkout").await?;
//! assert!(checkout.is_compiled());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod compiler;
pub mod config;
pub mod core;
pub mod fetch;
pub mod host;
pub mod lazy;
pub mod loader;
pub mod processors;

// Re-exports
pub use compiler::{BundleFactory, CompileBundle, CompileOutcome, Compiler, FactoryCompiler};
pub use config::{ConfigError, HostConfig, ManifestFlattener, UrlFormatter, ValidatedConfig};
pub use core::BundleCore;
pub use fetch::{FetchSource, HttpFetcher};
pub use host::{InitError, ModuleHost};
pub use lazy::{LazyScheduler, DEFAULT_LAZY_LOADER_LIMIT};
pub use loader::{LoadOutcome, SourceLoader};
pub use processors::ProcessorPipeline;
