//! Source transforms applied to app scripts and framework files.

use std::sync::OnceLock;

use applet_schema::lexer::{tokenize, TokenKind};
use regex::{Captures, Regex};

/// Directive marking a script as a browser module.
pub const CLIENT_DIRECTIVE: &str = "use client";

pub const DOM_REFERENCE: &str = r#"/// <reference lib="dom" />"#;

/// Placeholders substituted in framework sources. Nothing else is.
pub const ENV_PLACEHOLDERS: [&str; 2] = ["APPLET_RPC_HOST", "APPLET_HMAC_SECRET"];

fn cached(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

fn forbidden_chars() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&RE, r"[^A-Za-z0-9._\-/]")
}

fn jsx_pragma() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&RE, r"@jsxImportSource\s+(\S+)")
}

fn env_placeholder() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&RE, r"process\.env\.(APPLET_RPC_HOST|APPLET_HMAC_SECRET)\b")
}

/// Filename safe to embed in a URL path: forbidden characters and
/// `.`/`..`/empty segments are dropped.
pub fn sanitize_filename(filename: &str) -> String {
    let cleaned = match forbidden_chars() {
        Some(re) => re.replace_all(filename, "").into_owned(),
        None => filename.to_string(),
    };
    cleaned
        .split('/')
        .filter(|seg| !seg.is_empty() && *seg != "." && *seg != "..")
        .collect::<Vec<_>>()
        .join("/")
}

/// Whether the first statement is the client directive.
pub fn has_client_directive(source: &str) -> bool {
    let Ok(tokens) = tokenize(source) else {
        return false;
    };
    let Some(first) = tokens.first().filter(|t| t.kind == TokenKind::Str) else {
        return false;
    };
    let Some(value) = first.string_value() else {
        return false;
    };
    let is_use_directive = value
        .strip_prefix("use")
        .is_some_and(|rest| rest.starts_with(char::is_whitespace));
    is_use_directive && value == CLIENT_DIRECTIVE
}

/// `@jsxImportSource` named by a pragma comment, if any.
pub fn jsx_import_source(source: &str) -> Option<&str> {
    jsx_pragma()?
        .captures(source)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim_end_matches("*/"))
}

/// Type name for an action's input: `doThing` → `DoThingActionInput`.
fn action_type_name(action: &str) -> String {
    let mut name = String::new();
    for part in action.split(|c: char| !c.is_ascii_alphanumeric()) {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            name.push(first.to_ascii_uppercase());
            name.extend(chars);
        }
    }
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    format!("{name}ActionInput")
}

fn metadata(name: &str, path: &str) -> String {
    serde_json::json!({ "name": name, "path": path }).to_string()
}

/// Statements attaching `{name, path}` metadata to the handler and each
/// action, plus type re-exports of their inputs.
///
/// `handler` and `actions` are the local bindings behind those exports.
pub fn metadata_footer(
    path: &str,
    handler: Option<&str>,
    actions: Option<&str>,
    action_names: &[&str],
) -> String {
    let mut out = String::new();
    if let Some(local) = handler {
        out.push_str(&format!(
            "\nObject.assign({local}, {{ metadata: {} }});\n",
            metadata("handler", path)
        ));
        out.push_str(&format!(
            "export type HandlerInput = Parameters<typeof {local}>[0];\n"
        ));
    }
    if let Some(local) = actions {
        for action in action_names {
            let key = serde_json::Value::from(*action).to_string();
            out.push_str(&format!(
                "\nObject.assign({local}[{key}], {{ metadata: {} }});\n",
                metadata(action, path)
            ));
            out.push_str(&format!(
                "export type {} = Parameters<(typeof {local})[{key}]>[0];\n",
                action_type_name(action)
            ));
        }
    }
    out
}

/// TSX compatibility: `.ts` specifiers become `.tsx` and the content gets a
/// default JSX pragma unless it names its own.
pub fn tsx_shim(specifier: &str, content: String, default_source: &str) -> (String, String) {
    let specifier = match specifier.strip_suffix(".ts") {
        Some(stem) => format!("{stem}.tsx"),
        None => specifier.to_string(),
    };
    if jsx_import_source(&content).is_some() {
        return (specifier, content);
    }
    (
        specifier,
        format!("/** @jsxImportSource {default_source} */\n{content}"),
    )
}

/// Replace allow-listed `process.env.*` placeholders with string literals.
/// Placeholders without a configured value are left as written.
pub fn substitute_env(content: &str, rpc_host: Option<&str>, hmac_secret: Option<&str>) -> String {
    let Some(re) = env_placeholder() else {
        return content.to_string();
    };
    re.replace_all(content, |caps: &Captures| {
        let value = match &caps[1] {
            "APPLET_RPC_HOST" => rpc_host,
            "APPLET_HMAC_SECRET" => hmac_secret,
            _ => None,
        };
        match value {
            Some(v) => serde_json::Value::from(v).to_string(),
            None => caps[0].to_string(),
        }
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_drops_forbidden_characters_and_traversal() {
        assert_eq!(sanitize_filename("my file (1).ts"), "myfile1.ts");
        assert_eq!(sanitize_filename("../../etc/passwd"), "etc/passwd");
        assert_eq!(sanitize_filename("lib//./util.ts"), "lib/util.ts");
    }

    #[test]
    fn client_directive_must_be_first_statement() {
        assert!(has_client_directive("\"use client\";\nexport {}"));
        assert!(has_client_directive("// c\n'use client'\n"));
        assert!(!has_client_directive("\"use strict\";"));
        assert!(!has_client_directive("import x from 'y';\n\"use client\";"));
        assert!(!has_client_directive("\"use  client\";"));
    }

    #[test]
    fn footer_attaches_metadata_and_exports_types() {
        let footer = metadata_footer("main.tsx", Some("run"), Some("actions"), &["doThing"]);
        assert!(footer.contains(
            r#"Object.assign(run, { metadata: {"name":"handler","path":"main.tsx"} });"#
        ));
        assert!(footer.contains("export type HandlerInput = Parameters<typeof run>[0];"));
        assert!(footer.contains(
            r#"Object.assign(actions["doThing"], { metadata: {"name":"doThing","path":"main.tsx"} });"#
        ));
        assert!(footer
            .contains(r#"export type DoThingActionInput = Parameters<(typeof actions)["doThing"]>[0];"#));
    }

    #[test]
    fn action_type_names_are_identifiers() {
        assert_eq!(action_type_name("send-email"), "SendEmailActionInput");
        assert_eq!(action_type_name("2fa"), "_2faActionInput");
    }

    #[test]
    fn tsx_shim_renames_and_adds_pragma() {
        let (spec, content) = tsx_shim("file:///src/a.ts", "export {}".into(), "https://esm.sh/react");
        assert_eq!(spec, "file:///src/a.tsx");
        assert_eq!(content, "/** @jsxImportSource https://esm.sh/react */\nexport {}");

        let own = "/** @jsxImportSource https://esm.sh/preact */\nexport {}".to_string();
        let (spec, content) = tsx_shim("file:///src/b.tsx", own.clone(), "https://esm.sh/react");
        assert_eq!(spec, "file:///src/b.tsx");
        assert_eq!(content, own);
    }

    #[test]
    fn env_substitution_is_allow_listed() {
        let src = "const a = process.env.APPLET_RPC_HOST;\nconst b = process.env.APPLET_HMAC_SECRET;\nconst c = process.env.HOME;\nconst d = process.env.APPLET_RPC_HOSTNAME;";
        let out = substitute_env(src, Some("rpc.example.com"), None);
        assert_eq!(
            out,
            "const a = \"rpc.example.com\";\nconst b = process.env.APPLET_HMAC_SECRET;\nconst c = process.env.HOME;\nconst d = process.env.APPLET_RPC_HOSTNAME;"
        );
    }
}
