//! Bundle manifests and load strategies
//!
//! A manifest declares a loadable unit. Root manifests may carry nested
//! sub-module manifests which are flattened into addressable siblings
//! (`parent.child`) at registration time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// When a bundle is loaded relative to host application startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStrategy {
    /// Must finish loading before the host application starts
    Block,

    /// Starts loading right after the host application starts
    #[serde(rename = "immediately")]
    Immediate,

    /// Loaded only when explicitly requested
    OnDemand,

    /// Loaded opportunistically when the host signals idle capacity
    Lazy,
}

/// Pointer to a function exported by a sibling bundle, invoked unawaited
/// once that bundle is loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrefetchSpec {
    /// Name of the bundle exporting the function
    pub service_name: String,

    /// Name of the exported function to call
    #[serde(rename = "fn")]
    pub fn_name: String,
}

/// Declarative metadata for a loadable bundle
///
/// Manifests are immutable once registered. Host applications may carry
/// additional fields; they ride along in `extra` and participate in
/// inheritance like any declared field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Unique name within the flattened list; dots address children
    pub name: String,

    /// Load strategy, never inherited by sub-modules
    pub load_strategy: LoadStrategy,

    /// Source location token handed to the URL formatter
    pub file_name: String,

    /// Tri-state so inheritance can tell "unset" from "declared";
    /// see [`Manifest::is_enabled`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Nested sub-module manifests, flattened at registration time.
    /// Nesting is one level deep by contract of the manifest shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modules: Option<BTreeMap<String, Manifest>>,

    /// Documentation-only list of callable exports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub childs: Option<Vec<String>>,

    /// Names that must be fully loaded, compiled, and started before
    /// this bundle begins its own pipeline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_modules: Option<Vec<String>>,

    /// Names to start loading when this bundle is requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preload_modules: Option<Vec<String>>,

    /// Sibling function to invoke, unawaited, when this bundle is requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefetch_fn: Option<PrefetchSpec>,

    /// Host-defined fields
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Manifest {
    /// Create a minimal manifest; mostly useful for tests and manual
    /// registration of statically linked bundles
    pub fn new(
        name: impl Into<String>,
        load_strategy: LoadStrategy,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            load_strategy,
            file_name: file_name.into(),
            enabled: None,
            modules: None,
            childs: None,
            block_modules: None,
            preload_modules: None,
            prefetch_fn: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Manifests are enabled unless explicitly disabled
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// Copy of this manifest with the `modules` field stripped
    pub fn without_modules(&self) -> Manifest {
        Manifest {
            modules: None,
            ..self.clone()
        }
    }

    /// Merge a sub-module manifest with fields inherited from this root.
    ///
    /// The sub-module wins on conflict. `name`, `load_strategy`,
    /// `file_name`, and `childs` are never inherited; the result is
    /// renamed to `root.child`.
    pub fn merge_into_child(&self, child: &Manifest) -> Manifest {
        let mut extra = self.extra.clone();
        for (key, value) in &child.extra {
            extra.insert(key.clone(), value.clone());
        }

        Manifest {
            name: format!("{}.{}", self.name, child.name),
            load_strategy: child.load_strategy,
            file_name: child.file_name.clone(),
            enabled: child.enabled.or(self.enabled),
            modules: None,
            childs: child.childs.clone(),
            block_modules: child.block_modules.clone().or_else(|| self.block_modules.clone()),
            preload_modules: child
                .preload_modules
                .clone()
                .or_else(|| self.preload_modules.clone()),
            prefetch_fn: child.prefetch_fn.clone().or_else(|| self.prefetch_fn.clone()),
            extra,
        }
    }

    /// Flatten one level of sub-modules into addressable siblings.
    ///
    /// Returns the root entry (modules stripped) first, then one merged
    /// entry per sub-module.
    pub fn flatten(&self) -> Vec<Manifest> {
        let root = self.without_modules();

        let Some(modules) = &self.modules else {
            return vec![root];
        };

        let mut entries = Vec::with_capacity(modules.len() + 1);
        let children: Vec<Manifest> = modules
            .values()
            .map(|child| root.merge_into_child(child))
            .collect();
        entries.push(root);
        entries.extend(children);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_wire_manifest() {
        let manifest: Manifest = serde_json::from_value(json!({
            "name": "checkout",
            "loadStrategy": "immediately",
            "fileName": "checkout.bundle.js",
            "blockModules": ["session"],
            "prefetchFn": { "serviceName": "catalog", "fn": "warmCache" },
            "team": "payments"
        }))
        .unwrap();

        assert_eq!(manifest.name, "checkout");
        assert_eq!(manifest.load_strategy, LoadStrategy::Immediate);
        assert_eq!(manifest.block_modules, Some(vec!["session".to_string()]));
        assert_eq!(manifest.extra["team"], json!("payments"));
        assert!(manifest.is_enabled());
        let prefetch = manifest.prefetch_fn.unwrap();
        assert_eq!(prefetch.service_name, "catalog");
        assert_eq!(prefetch.fn_name, "warmCache");
    }

    #[test]
    fn parses_all_strategies() {
        for (wire, expected) in [
            ("block", LoadStrategy::Block),
            ("immediately", LoadStrategy::Immediate),
            ("on_demand", LoadStrategy::OnDemand),
            ("lazy", LoadStrategy::Lazy),
        ] {
            let parsed: LoadStrategy = serde_json::from_value(json!(wire)).unwrap();
            assert_eq!(parsed, expected);
        }
    }

    #[test]
    fn flattens_one_level_of_modules() {
        let manifest: Manifest = serde_json::from_value(json!({
            "name": "svc",
            "loadStrategy": "on_demand",
            "fileName": "svc.js",
            "enabled": false,
            "modules": {
                "a": { "name": "a", "loadStrategy": "lazy", "fileName": "a.js" }
            }
        }))
        .unwrap();

        let entries = manifest.flatten();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "svc");
        assert!(entries[0].modules.is_none());
        assert_eq!(entries[1].name, "svc.a");
        assert_eq!(entries[1].file_name, "a.js");
        assert_eq!(entries[1].load_strategy, LoadStrategy::Lazy);
        // inherited from the root
        assert!(!entries[1].is_enabled());
    }

    #[test]
    fn child_fields_win_over_inherited() {
        let root: Manifest = serde_json::from_value(json!({
            "name": "svc",
            "loadStrategy": "block",
            "fileName": "svc.js",
            "blockModules": ["auth"],
            "team": "platform"
        }))
        .unwrap();
        let child: Manifest = serde_json::from_value(json!({
            "name": "widget",
            "loadStrategy": "lazy",
            "fileName": "widget.js",
            "blockModules": ["billing"],
            "team": "storefront"
        }))
        .unwrap();

        let merged = root.merge_into_child(&child);
        assert_eq!(merged.name, "svc.widget");
        assert_eq!(merged.load_strategy, LoadStrategy::Lazy);
        assert_eq!(merged.block_modules, Some(vec!["billing".to_string()]));
        assert_eq!(merged.extra["team"], serde_json::json!("storefront"));
    }

    #[test]
    fn childs_list_is_not_inherited() {
        let mut root = Manifest::new("svc", LoadStrategy::Block, "svc.js");
        root.childs = Some(vec!["openDialog".to_string()]);
        let child = Manifest::new("widget", LoadStrategy::Lazy, "widget.js");

        let merged = root.merge_into_child(&child);
        assert_eq!(merged.childs, None);
    }
}
