//! Applet data model as supplied by the persistence layer.

use serde::{Deserialize, Serialize};

use crate::hasher::script_hash;

/// A single source file belonging to an applet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    pub id: String,
    pub filename: String,
    pub code: String,
    pub order: i32,
    /// Content hash; recomputed whenever `code` or `filename` changes
    pub hash: String,
}

impl Script {
    pub fn new(
        app_id: &str,
        id: impl Into<String>,
        filename: impl Into<String>,
        code: impl Into<String>,
        order: i32,
    ) -> Self {
        let filename = filename.into();
        let code = code.into();
        Script {
            id: id.into(),
            hash: script_hash(app_id, &filename, &code),
            filename,
            code,
            order,
        }
    }

    pub fn set_code(&mut self, app_id: &str, code: impl Into<String>) {
        self.code = code.into();
        self.hash = script_hash(app_id, &self.filename, &self.code);
    }

    pub fn rename(&mut self, app_id: &str, filename: impl Into<String>) {
        self.filename = filename.into();
        self.hash = script_hash(app_id, &self.filename, &self.code);
    }

    /// Only TypeScript sources take part in a bundle.
    pub fn is_bundled(&self) -> bool {
        self.filename.ends_with(".ts") || self.filename.ends_with(".tsx")
    }
}

/// Read-only app aggregate handed to the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
    pub id: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets_hash: Option<String>,
    pub scripts: Vec<Script>,
}

impl App {
    /// Bundled scripts in editor order.
    pub fn bundled_scripts(&self) -> Vec<&Script> {
        let mut scripts: Vec<&Script> = self.scripts.iter().filter(|s| s.is_bundled()).collect();
        scripts.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.filename.cmp(&b.filename)));
        scripts
    }
}
