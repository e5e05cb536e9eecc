//! Host configuration and the startup check
//!
//! Configuration is assembled once by the embedding application and
//! validated before anything runs. The check reports every missing
//! required option at once rather than failing on the first.

use crate::compiler::{CompileBundle, FactoryCompiler};
use crate::fetch::{FetchSource, HttpFetcher};
use crate::lazy::DEFAULT_LAZY_LOADER_LIMIT;
use mosaic_types::{Dependency, DependencyResolver, Manifest};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Formats the source URL for a manifest
pub type UrlFormatter = Arc<dyn Fn(&Manifest) -> String + Send + Sync>;

/// Transforms the fetched root-manifest document into a flat sequence of
/// manifests; the wire shape beyond that is the host's business
pub type ManifestFlattener = Arc<dyn Fn(serde_json::Value) -> Vec<Manifest> + Send + Sync>;

/// Recognized configuration options
///
/// Required: `root_manifest_url`, `manifest_flattener`, `url_formatter`,
/// `dependencies`. Everything else falls back to a default.
#[derive(Clone, Default)]
pub struct HostConfig {
    pub root_manifest_url: Option<String>,
    pub manifest_flattener: Option<ManifestFlattener>,
    pub url_formatter: Option<UrlFormatter>,
    pub dependencies: Option<HashMap<String, Dependency>>,
    pub unknown_dependency_resolver: Option<DependencyResolver>,

    /// Override for the fetch primitive
    pub fetcher: Option<Arc<dyn FetchSource>>,

    /// Override for the compile step
    pub compiler: Option<Arc<dyn CompileBundle>>,

    /// Batch size for the lazy scheduler, default 2
    pub lazy_loader_limit: Option<usize>,

    /// Whether a cached compile failure is re-attempted on the next
    /// request (for example after a bundle redeploy), default off
    pub retry_compile_errors: Option<bool>,
}

impl HostConfig {
    /// Merge later settings into this configuration.
    ///
    /// `dependencies` cannot be overridden after they are set; a partial
    /// update carrying them is ignored with a diagnostic.
    pub fn update(&mut self, update: HostConfig) {
        if update.dependencies.is_some() && self.dependencies.is_some() {
            warn!("config update cannot override dependencies, ignoring them");
        } else if let Some(dependencies) = update.dependencies {
            self.dependencies = Some(dependencies);
        }

        if let Some(url) = update.root_manifest_url {
            self.root_manifest_url = Some(url);
        }
        if let Some(flattener) = update.manifest_flattener {
            self.manifest_flattener = Some(flattener);
        }
        if let Some(formatter) = update.url_formatter {
            self.url_formatter = Some(formatter);
        }
        if let Some(resolver) = update.unknown_dependency_resolver {
            self.unknown_dependency_resolver = Some(resolver);
        }
        if let Some(fetcher) = update.fetcher {
            self.fetcher = Some(fetcher);
        }
        if let Some(compiler) = update.compiler {
            self.compiler = Some(compiler);
        }
        if let Some(limit) = update.lazy_loader_limit {
            self.lazy_loader_limit = Some(limit);
        }
        if let Some(retry) = update.retry_compile_errors {
            self.retry_compile_errors = Some(retry);
        }
    }

    /// Startup check: either every required option is present, or every
    /// missing one is reported
    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        let mut missing = Vec::new();
        if self.root_manifest_url.is_none() {
            missing.push("rootManifestUrl".to_string());
        }
        if self.manifest_flattener.is_none() {
            missing.push("manifestFlattener".to_string());
        }
        if self.url_formatter.is_none() {
            missing.push("urlFormatter".to_string());
        }
        if self.dependencies.is_none() {
            missing.push("dependencies".to_string());
        }

        let (
            Some(root_manifest_url),
            Some(manifest_flattener),
            Some(url_formatter),
            Some(dependencies),
        ) = (
            self.root_manifest_url,
            self.manifest_flattener,
            self.url_formatter,
            self.dependencies,
        )
        else {
            return Err(ConfigError::Incomplete(missing));
        };

        Ok(ValidatedConfig {
            root_manifest_url,
            manifest_flattener,
            url_formatter,
            dependencies,
            unknown_dependency_resolver: self.unknown_dependency_resolver,
            fetcher: self.fetcher.unwrap_or_else(|| Arc::new(HttpFetcher::new())),
            compiler: self
                .compiler
                .unwrap_or_else(|| Arc::new(FactoryCompiler::new())),
            lazy_loader_limit: self.lazy_loader_limit.unwrap_or(DEFAULT_LAZY_LOADER_LIMIT),
            retry_compile_errors: self.retry_compile_errors.unwrap_or(false),
        })
    }
}

/// Configuration with every required option present and defaults applied
#[derive(Clone)]
pub struct ValidatedConfig {
    pub root_manifest_url: String,
    pub manifest_flattener: ManifestFlattener,
    pub url_formatter: UrlFormatter,
    pub dependencies: HashMap<String, Dependency>,
    pub unknown_dependency_resolver: Option<DependencyResolver>,
    pub fetcher: Arc<dyn FetchSource>,
    pub compiler: Arc<dyn CompileBundle>,
    pub lazy_loader_limit: usize,
    pub retry_compile_errors: bool,
}

impl std::fmt::Debug for ValidatedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatedConfig")
            .field("root_manifest_url", &self.root_manifest_url)
            .field("dependencies", &self.dependencies)
            .field(
                "unknown_dependency_resolver",
                &self.unknown_dependency_resolver.is_some(),
            )
            .field("lazy_loader_limit", &self.lazy_loader_limit)
            .field("retry_compile_errors", &self.retry_compile_errors)
            .finish()
    }
}

/// Configuration errors, raised loudly at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration is incomplete, missing: {}", .0.join(", "))]
    Incomplete(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_config() -> HostConfig {
        HostConfig {
            root_manifest_url: Some("https://cdn.example/manifest.json".into()),
            manifest_flattener: Some(Arc::new(|_| Vec::new())),
            url_formatter: Some(Arc::new(|m| format!("https://cdn.example/{}", m.file_name))),
            dependencies: Some(HashMap::new()),
            ..HostConfig::default()
        }
    }

    #[test]
    fn reports_every_missing_option_at_once() {
        let err = HostConfig::default().validate().unwrap_err();
        let ConfigError::Incomplete(missing) = err;
        assert_eq!(
            missing,
            vec![
                "rootManifestUrl",
                "manifestFlattener",
                "urlFormatter",
                "dependencies"
            ]
        );
    }

    #[test]
    fn complete_config_validates_with_defaults() {
        let validated = complete_config().validate().unwrap();
        assert_eq!(validated.lazy_loader_limit, DEFAULT_LAZY_LOADER_LIMIT);
        assert!(!validated.retry_compile_errors);
    }

    #[test]
    fn update_merges_but_never_replaces_dependencies() {
        let mut config = complete_config();
        let mut seeded = HashMap::new();
        seeded.insert(
            "router".to_string(),
            Arc::new("original".to_string()) as Dependency,
        );
        config.dependencies = Some(seeded);

        let mut replacement = HashMap::new();
        replacement.insert(
            "router".to_string(),
            Arc::new("replacement".to_string()) as Dependency,
        );
        config.update(HostConfig {
            root_manifest_url: Some("https://cdn.example/v2.json".into()),
            dependencies: Some(replacement),
            lazy_loader_limit: Some(4),
            ..HostConfig::default()
        });

        assert_eq!(
            config.root_manifest_url.as_deref(),
            Some("https://cdn.example/v2.json")
        );
        assert_eq!(config.lazy_loader_limit, Some(4));

        let deps = config.dependencies.unwrap();
        let kept = deps["router"].clone().downcast::<String>().unwrap();
        assert_eq!(*kept, "original");
    }
}
