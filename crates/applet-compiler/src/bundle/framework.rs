//! Framework namespace: generated modules and static framework sources.

use std::collections::BTreeMap;
use std::path::{Component, Path};

use applet_schema::ScriptSchema;
use serde::Serialize;

use super::load::LoadFailure;
use crate::error::Result;

pub const FRAMEWORK_ROOT: &str = "file:///framework/";
pub const GENERATED_SCRIPTS: &str = "_generated/scripts.ts";
pub const GENERATED_BOOT: &str = "_generated/boot.ts";

/// Descriptor the runtime reads at call time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootInfo {
    pub app: BootApp,
    pub scripts: Vec<BootScript>,
    pub entrypoint: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootApp {
    pub id: String,
    pub slug: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootScript {
    pub filename: String,
    pub specifier: String,
    #[serde(flatten)]
    pub schema: ScriptSchema,
}

/// `_generated/scripts.ts`: every app script's namespace keyed by filename.
pub fn scripts_index(scripts: &[(String, String)]) -> String {
    let mut out = String::new();
    for (i, (_, specifier)) in scripts.iter().enumerate() {
        out.push_str(&format!(
            "import * as script{i} from {};\n",
            serde_json::Value::from(specifier.as_str())
        ));
    }
    out.push_str("\nexport default {\n");
    for (i, (filename, _)) in scripts.iter().enumerate() {
        out.push_str(&format!(
            "  {}: script{i},\n",
            serde_json::Value::from(filename.as_str())
        ));
    }
    out.push_str("};\n");
    out
}

/// `_generated/boot.ts`
pub fn boot_module(info: &BootInfo) -> Result<String> {
    Ok(format!(
        "export default {};\n",
        serde_json::to_string_pretty(info)?
    ))
}

pub fn content_type(path: &str) -> &'static str {
    match path.rsplit('.').next() {
        Some("ts" | "mts") => "text/typescript",
        Some("tsx") => "text/tsx",
        Some("jsx") => "text/jsx",
        Some("json") => "application/json",
        Some("css") => "text/css",
        _ => "application/javascript",
    }
}

/// Read `relative` under `dir`, refusing anything that leaves it.
pub async fn read_static(dir: &Path, relative: &str) -> std::result::Result<String, LoadFailure> {
    let rel = Path::new(relative);
    let escapes = relative.is_empty()
        || rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(LoadFailure::Message(
            "path escapes the framework directory".to_string(),
        ));
    }
    Ok(tokio::fs::read_to_string(dir.join(rel)).await?)
}

pub fn headers_for(path: &str) -> BTreeMap<String, String> {
    BTreeMap::from([("content-type".to_string(), content_type(path).to_string())])
}

#[cfg(test)]
mod tests {
    use super::*;
    use applet_schema::{InputParam, ParsedNode, PrimitiveKind};

    #[test]
    fn index_keys_scripts_by_filename() {
        let index = scripts_index(&[
            ("main.tsx".into(), "file:///src/main.tsx".into()),
            ("lib/util.ts".into(), "file:///src/lib/util.ts".into()),
        ]);
        assert_eq!(
            index,
            "import * as script0 from \"file:///src/main.tsx\";\n\
             import * as script1 from \"file:///src/lib/util.ts\";\n\
             \nexport default {\n  \"main.tsx\": script0,\n  \"lib/util.ts\": script1,\n};\n"
        );
    }

    #[test]
    fn boot_module_is_a_default_export() {
        let info = BootInfo {
            app: BootApp {
                id: "a".into(),
                slug: "demo".into(),
                version: "abc1234".into(),
            },
            scripts: vec![BootScript {
                filename: "main.ts".into(),
                specifier: "file:///src/main.ts".into(),
                schema: ScriptSchema {
                    handler: Some(vec![InputParam::new(
                        "q",
                        ParsedNode::primitive(PrimitiveKind::String),
                        false,
                    )]),
                    actions: None,
                },
            }],
            entrypoint: "file:///framework/main.tsx".into(),
        };
        let module = boot_module(&info).unwrap();
        let json = module
            .strip_prefix("export default ")
            .and_then(|s| s.strip_suffix(";\n"))
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(json).unwrap();
        assert_eq!(value["app"]["version"], "abc1234");
        assert_eq!(value["scripts"][0]["handler"][0]["key"], "q");
        assert_eq!(value["scripts"][0]["actions"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn static_reads_refuse_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_static(dir.path(), "../secret.ts").await.unwrap_err();
        assert!(matches!(err, LoadFailure::Message(_)));
        let err = read_static(dir.path(), "/etc/passwd").await.unwrap_err();
        assert!(matches!(err, LoadFailure::Message(_)));
    }

    #[tokio::test]
    async fn missing_static_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_static(dir.path(), "nope.ts").await.unwrap_err();
        assert!(matches!(err, LoadFailure::NotFound));
    }
}
