//! The deployable module-graph archive.

use std::collections::BTreeMap;

use module_cache::RemoteModule;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const ARTIFACT_FORMAT: &str = "applet-graph/v1";

/// Source text returned by a loader, under the specifier it really lives at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceModule {
    pub specifier: String,
    pub headers: BTreeMap<String, String>,
    pub content: String,
}

impl SourceModule {
    pub fn typescript(specifier: impl Into<String>, content: impl Into<String>) -> Self {
        SourceModule {
            specifier: specifier.into(),
            headers: BTreeMap::from([(
                "content-type".to_string(),
                "text/typescript".to_string(),
            )]),
            content: content.into(),
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(String::as_str)
    }
}

impl From<RemoteModule> for SourceModule {
    fn from(module: RemoteModule) -> Self {
        SourceModule {
            specifier: module.specifier,
            headers: module.headers,
            content: module.content,
        }
    }
}

/// One record in the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum GraphModule {
    Module {
        specifier: String,
        headers: BTreeMap<String, String>,
        content: String,
    },
    /// `specifier` was requested but the module lives at `target`
    Redirect { specifier: String, target: String },
    /// Provided by the runtime (`node:`, `jsr:`, `data:`); not bundled
    External { specifier: String },
}

impl GraphModule {
    pub fn specifier(&self) -> &str {
        match self {
            GraphModule::Module { specifier, .. }
            | GraphModule::Redirect { specifier, .. }
            | GraphModule::External { specifier } => specifier,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GraphModule::Module { .. } => "module",
            GraphModule::Redirect { .. } => "redirect",
            GraphModule::External { .. } => "external",
        }
    }
}

impl From<SourceModule> for GraphModule {
    fn from(module: SourceModule) -> Self {
        GraphModule::Module {
            specifier: module.specifier,
            headers: module.headers,
            content: module.content,
        }
    }
}

/// Everything the runtime needs to rebuild and run the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleArtifact {
    pub format: String,
    /// Entry points in seed order: framework entry first, then app scripts
    pub roots: Vec<String>,
    /// Sorted by specifier
    pub modules: Vec<GraphModule>,
}

impl BundleArtifact {
    pub fn new(roots: Vec<String>, mut modules: Vec<GraphModule>) -> Self {
        modules.sort_by(|a, b| a.specifier().cmp(b.specifier()));
        BundleArtifact {
            format: ARTIFACT_FORMAT.to_string(),
            roots,
            modules,
        }
    }

    pub fn module(&self, specifier: &str) -> Option<&GraphModule> {
        self.modules
            .binary_search_by(|m| m.specifier().cmp(specifier))
            .ok()
            .map(|i| &self.modules[i])
    }

    /// Source of the module at `specifier`, following one redirect.
    pub fn content(&self, specifier: &str) -> Option<&str> {
        match self.module(specifier)? {
            GraphModule::Module { content, .. } => Some(content),
            GraphModule::Redirect { target, .. } => match self.module(target)? {
                GraphModule::Module { content, .. } => Some(content),
                _ => None,
            },
            GraphModule::External { .. } => None,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
