//! Publish-time schema validation.

use std::collections::BTreeMap;

use applet_schema::{analyze_script, ScriptSchema};
use tracing::warn;

use crate::error::Result;
use crate::model::App;

/// Strictly extract every bundled script's schema, keyed by filename.
///
/// Fails on the first script whose exports are malformed; the live-preview
/// path in the builder stays lenient instead.
pub fn validate_app(app: &App) -> Result<BTreeMap<String, ScriptSchema>> {
    let mut schemas = BTreeMap::new();
    for script in app.bundled_scripts() {
        let schema = analyze_script(&script.code, true).map_err(|err| {
            warn!(script = %script.filename, error = %err, "script failed validation");
            err
        })?;
        schemas.insert(script.filename.clone(), schema);
    }
    Ok(schemas)
}
