//! Content hashing and version ids.
//!
//! A version id is the first seven hex characters of the app hash. Prefix
//! collisions are an accepted risk; nothing here detects them.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::digest::compute_digest;
use crate::error::Result;
use crate::model::App;

/// Framework version that is left out of the app hash.
pub const UNVERSIONED_FRAMEWORK: &str = "0.0.0";

const VERSION_LEN: usize = 7;

/// Full hash plus its short version id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppVersion {
    pub hash: String,
    pub version: String,
}

/// Code with trailing whitespace removed from every line and from the end.
fn trim_trailing_whitespace(code: &str) -> String {
    code.lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}

/// Hash of one script's identity and content.
pub fn script_hash(app_id: &str, filename: &str, code: &str) -> String {
    let value = json!({
        "appId": app_id,
        "filename": filename,
        "code": trim_trailing_whitespace(code),
    });
    // string-only values always serialize
    compute_digest(&value).unwrap_or_default()
}

/// Hash of an app: independent of script order.
pub fn app_hash(app: &App, framework_version: &str) -> Result<String> {
    let mut scripts: Vec<(&str, &str)> = app
        .scripts
        .iter()
        .map(|s| (s.filename.as_str(), s.hash.as_str()))
        .collect();
    scripts.sort();
    let scripts: Vec<_> = scripts
        .into_iter()
        .map(|(filename, hash)| json!({"filename": filename, "hash": hash}))
        .collect();

    let mut value = json!({
        "id": app.id,
        "slug": app.slug,
        "scriptsJson": serde_json::to_string(&scripts)?,
    });
    if framework_version != UNVERSIONED_FRAMEWORK {
        value["frameworkVersion"] = json!(framework_version);
    }
    if let Some(secrets_hash) = &app.secrets_hash {
        value["secretsHash"] = json!(secrets_hash);
    }
    compute_digest(&value)
}

pub fn app_hash_and_version(app: &App, framework_version: &str) -> Result<AppVersion> {
    let hash = app_hash(app, framework_version)?;
    let version = hash[..VERSION_LEN.min(hash.len())].to_string();
    Ok(AppVersion { hash, version })
}

/// Short version id for a hash, if there is one.
pub fn version_from_hash(hash: Option<&str>) -> Option<String> {
    hash.map(|h| h.chars().take(VERSION_LEN).collect())
}

/// `<scheme>://<slug>/v<version>/`
pub fn deployment_url(scheme: &str, slug: &str, version: &str) -> String {
    format!("{scheme}://{slug}/v{version}/")
}
