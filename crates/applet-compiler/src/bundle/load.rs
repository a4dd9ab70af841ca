//! Specifier classification and the per-namespace loaders.
//!
//! Classification is an ordered table of predicates; the first match wins.
//! An app script served from the platform host is therefore always treated
//! as an app file, never as a remote import.

use std::collections::HashMap;
use std::sync::Arc;

use applet_schema::ast::Module;
use applet_schema::{analyze_module, parse_module, ScriptSchema, ACTIONS_EXPORT, HANDLER_EXPORT};
use module_cache::{ModuleFetcher, RemoteModuleCache};
use reqwest::Url;
use tracing::warn;

use super::artifact::SourceModule;
use super::framework::{
    self, BootApp, BootInfo, BootScript, FRAMEWORK_ROOT, GENERATED_BOOT, GENERATED_SCRIPTS,
};
use super::transform::{
    has_client_directive, metadata_footer, sanitize_filename, substitute_env, tsx_shim,
    DOM_REFERENCE,
};
use crate::config::BuildConfig;
use crate::error::{BuildError, Result};
use crate::model::App;
use crate::rewrite::ImportRewriter;

/// Where a specifier is loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecifierClass {
    /// `node:`, `jsr:`, `data:`: provided by the runtime
    External,
    /// The app's own scripts
    App,
    /// Framework sources and generated modules
    Framework,
    /// Another app's script on the platform host
    PlatformRemote,
    /// Any other http(s) URL, served through the module cache
    Remote,
}

/// The namespaces one build resolves against.
#[derive(Debug, Clone)]
pub struct Namespaces {
    pub app_root: Url,
    pub framework_root: Url,
    pub platform_host: String,
}

type Predicate = fn(&Namespaces, &Url) -> bool;

fn is_external(_: &Namespaces, url: &Url) -> bool {
    matches!(url.scheme(), "node" | "jsr" | "data")
}

fn is_app(ns: &Namespaces, url: &Url) -> bool {
    url.as_str().starts_with(ns.app_root.as_str())
}

fn is_framework(ns: &Namespaces, url: &Url) -> bool {
    url.as_str().starts_with(ns.framework_root.as_str())
}

fn is_platform_remote(ns: &Namespaces, url: &Url) -> bool {
    url.scheme() == "https" && url.host_str() == Some(ns.platform_host.as_str())
}

fn is_remote(_: &Namespaces, url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// Checked top to bottom.
const CLASSIFIERS: [(SpecifierClass, Predicate); 5] = [
    (SpecifierClass::External, is_external),
    (SpecifierClass::App, is_app),
    (SpecifierClass::Framework, is_framework),
    (SpecifierClass::PlatformRemote, is_platform_remote),
    (SpecifierClass::Remote, is_remote),
];

impl Namespaces {
    /// App scripts live under `base_url` (default `file:///src/`).
    pub fn new(base_url: Option<&str>, platform_host: &str) -> Result<Self> {
        let mut base = base_url.unwrap_or("file:///src/").to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let app_root = Url::parse(&base)
            .map_err(|e| BuildError::Config(format!("invalid base URL {base}: {e}")))?;
        let framework_root = Url::parse(FRAMEWORK_ROOT)
            .map_err(|e| BuildError::Config(format!("invalid framework root: {e}")))?;
        Ok(Namespaces {
            app_root,
            framework_root,
            platform_host: platform_host.to_string(),
        })
    }

    pub fn classify(&self, url: &Url) -> Option<SpecifierClass> {
        CLASSIFIERS
            .iter()
            .find(|(_, matches)| matches(self, url))
            .map(|(class, _)| *class)
    }

    pub fn script_url(&self, filename: &str) -> Result<Url> {
        self.app_root
            .join(filename)
            .map_err(|e| BuildError::load(filename, format!("invalid script filename: {e}")))
    }

    pub fn framework_url(&self, path: &str) -> Result<Url> {
        self.framework_root
            .join(path)
            .map_err(|e| BuildError::load(path, format!("invalid framework path: {e}")))
    }
}

/// Why a loader failed. Missing files never reveal their path.
#[derive(Debug)]
pub enum LoadFailure {
    NotFound,
    Message(String),
}

impl LoadFailure {
    pub fn into_error(self, specifier: &str) -> BuildError {
        match self {
            LoadFailure::NotFound => BuildError::load(specifier, "File not found"),
            LoadFailure::Message(message) => BuildError::load(specifier, message),
        }
    }
}

impl From<std::io::Error> for LoadFailure {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => LoadFailure::NotFound,
            kind => LoadFailure::Message(format!("I/O error: {kind}")),
        }
    }
}

/// A bundled script with its extracted schema.
#[derive(Debug, Clone)]
pub struct PreparedScript {
    pub filename: String,
    pub code: String,
    pub schema: ScriptSchema,
    /// Local binding behind the `handler` export
    pub handler_local: Option<String>,
    /// Local binding behind the `actions` export
    pub actions_local: Option<String>,
}

fn local_binding(module: &Module, export: &str) -> Option<String> {
    let local = if module.binding(export).is_some() {
        export
    } else {
        module.exported_local(export)?
    };
    module.binding(local).map(|_| local.to_string())
}

impl PreparedScript {
    /// Schema extraction here is lenient: a script that cannot be analyzed
    /// still bundles, without metadata.
    pub fn new(filename: String, code: &str) -> Self {
        let (schema, handler_local, actions_local) = match parse_module(code) {
            Ok(module) => {
                let schema = analyze_module(&module, false).unwrap_or_else(|err| {
                    warn!(script = %filename, error = %err, "schema extraction failed");
                    ScriptSchema::default()
                });
                let handler_local = schema
                    .handler
                    .as_ref()
                    .and_then(|_| local_binding(&module, HANDLER_EXPORT));
                let actions_local = schema
                    .actions
                    .as_ref()
                    .and_then(|_| local_binding(&module, ACTIONS_EXPORT));
                (schema, handler_local, actions_local)
            }
            Err(err) => {
                warn!(script = %filename, error = %err, "script does not parse; bundling without metadata");
                (ScriptSchema::default(), None, None)
            }
        };
        PreparedScript {
            filename,
            code: code.to_string(),
            schema,
            handler_local,
            actions_local,
        }
    }

    pub fn footer(&self) -> String {
        let action_names: Vec<&str> = self
            .schema
            .actions
            .as_ref()
            .map(|a| a.keys().map(String::as_str).collect())
            .unwrap_or_default();
        metadata_footer(
            &self.filename,
            self.handler_local.as_deref(),
            self.actions_local.as_deref(),
            &action_names,
        )
    }
}

/// Outcome of loading one specifier.
#[derive(Debug)]
pub enum Loaded {
    Source(SourceModule),
    External,
}

/// Everything one build needs to load specifiers. Shared by all load tasks.
pub struct BuildContext {
    pub config: Arc<BuildConfig>,
    pub rewriter: ImportRewriter,
    pub cache: RemoteModuleCache,
    pub fetcher: Arc<dyn ModuleFetcher>,
    pub target: String,
    pub namespaces: Namespaces,
    pub roots: Vec<String>,
    scripts: HashMap<String, PreparedScript>,
    scripts_index: String,
    boot_module: String,
}

impl BuildContext {
    pub fn new(
        config: Arc<BuildConfig>,
        cache: RemoteModuleCache,
        fetcher: Arc<dyn ModuleFetcher>,
        target: &str,
        app: &App,
        version: &str,
        base_url: Option<&str>,
    ) -> Result<Self> {
        let namespaces = Namespaces::new(base_url, &config.platform_host)?;
        let entry = namespaces.framework_url(&config.framework_entry)?;

        let mut scripts = HashMap::new();
        let mut index_entries = Vec::new();
        let mut boot_scripts = Vec::new();
        let mut roots = vec![entry.to_string()];
        let mut sources: HashMap<String, &str> = HashMap::new();
        for script in app.bundled_scripts() {
            let filename = sanitize_filename(&script.filename);
            if let Some(first) = sources.insert(filename.clone(), &script.filename) {
                return Err(BuildError::ScriptCollision {
                    first: first.to_string(),
                    second: script.filename.clone(),
                    filename,
                });
            }
            let url = namespaces.script_url(&filename)?.to_string();
            let prepared = PreparedScript::new(filename.clone(), &script.code);

            roots.push(url.clone());
            index_entries.push((filename.clone(), url.clone()));
            boot_scripts.push(BootScript {
                filename: filename.clone(),
                specifier: url,
                schema: prepared.schema.clone(),
            });
            scripts.insert(filename, prepared);
        }

        let boot = BootInfo {
            app: BootApp {
                id: app.id.clone(),
                slug: app.slug.clone(),
                version: version.to_string(),
            },
            scripts: boot_scripts,
            entrypoint: entry.to_string(),
        };

        Ok(BuildContext {
            rewriter: ImportRewriter::from_config(&config),
            config,
            cache,
            fetcher,
            target: target.to_string(),
            namespaces,
            roots,
            scripts,
            scripts_index: framework::scripts_index(&index_entries),
            boot_module: framework::boot_module(&boot)?,
        })
    }

    pub async fn load(&self, url: &Url) -> Result<Loaded> {
        let specifier = url.as_str();
        let class = self.namespaces.classify(url).ok_or_else(|| {
            BuildError::load(specifier, "unsupported module specifier")
        })?;
        let loaded = match class {
            SpecifierClass::External => return Ok(Loaded::External),
            SpecifierClass::App => self.load_app(url),
            SpecifierClass::Framework => self.load_framework(url).await,
            SpecifierClass::PlatformRemote => self.load_platform(url).await,
            SpecifierClass::Remote => self.load_remote(url).await,
        };
        loaded
            .map(Loaded::Source)
            .map_err(|failure| failure.into_error(specifier))
    }

    fn load_app(&self, url: &Url) -> std::result::Result<SourceModule, LoadFailure> {
        let relative = url
            .as_str()
            .strip_prefix(self.namespaces.app_root.as_str())
            .unwrap_or_default();
        let script = self
            .scripts
            .get(relative)
            .or_else(|| {
                let stem = relative.strip_suffix(".tsx")?;
                self.scripts.get(&format!("{stem}.ts"))
            })
            .ok_or(LoadFailure::NotFound)?;
        let script_url = self
            .namespaces
            .script_url(&script.filename)
            .map_err(|e| LoadFailure::Message(e.to_string()))?;

        let mut code = self
            .rewriter
            .rewrite_source(&script.code, &script_url)
            .map_err(|e| LoadFailure::Message(format!("syntax error: {e}")))?;
        if has_client_directive(&script.code) {
            code = format!("{DOM_REFERENCE}\n{code}");
        }
        code.push_str(&script.footer());

        let (specifier, content) =
            tsx_shim(script_url.as_str(), code, &self.config.jsx_import_source);
        Ok(SourceModule::typescript(specifier, content))
    }

    async fn load_framework(&self, url: &Url) -> std::result::Result<SourceModule, LoadFailure> {
        let path = url
            .as_str()
            .strip_prefix(self.namespaces.framework_root.as_str())
            .unwrap_or_default();
        let content = match path {
            GENERATED_SCRIPTS => self.scripts_index.clone(),
            GENERATED_BOOT => self.boot_module.clone(),
            _ => {
                let raw = framework::read_static(&self.config.framework_dir, path).await?;
                substitute_env(
                    &raw,
                    self.config.rpc_host.as_deref(),
                    self.config.hmac_secret.as_deref(),
                )
            }
        };
        Ok(SourceModule {
            specifier: url.to_string(),
            headers: framework::headers_for(path),
            content,
        })
    }

    async fn load_platform(&self, url: &Url) -> std::result::Result<SourceModule, LoadFailure> {
        let timeout = self.config.network_timeout;
        let fetched = tokio::time::timeout(timeout, self.fetcher.fetch(url.as_str()))
            .await
            .map_err(|_| LoadFailure::Message(format!("timed out after {timeout:?}")))?
            .map_err(|e| LoadFailure::Message(e.to_string()))?;

        let final_url = Url::parse(&fetched.specifier)
            .map_err(|e| LoadFailure::Message(format!("invalid redirect target: {e}")))?;
        let code = self
            .rewriter
            .rewrite_source(&fetched.content, &final_url)
            .map_err(|e| LoadFailure::Message(format!("syntax error: {e}")))?;

        let (specifier, content) =
            tsx_shim(final_url.as_str(), code, &self.config.jsx_import_source);
        let mut module = SourceModule::typescript(specifier, content);
        for (name, value) in fetched.headers {
            module.headers.entry(name).or_insert(value);
        }
        Ok(module)
    }

    async fn load_remote(&self, url: &Url) -> std::result::Result<SourceModule, LoadFailure> {
        let timeout = self.config.network_timeout;
        let module = tokio::time::timeout(
            timeout,
            self.cache
                .load(url.as_str(), &self.target, self.fetcher.as_ref()),
        )
        .await
        .map_err(|_| LoadFailure::Message(format!("timed out after {timeout:?}")))?
        .map_err(|e| LoadFailure::Message(e.to_string()))?;
        let mut source = SourceModule::from(module);
        // `age` differs between a fresh fetch and every cache hit
        source.headers.remove("age");
        Ok(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn classification_follows_table_order() {
        let ns = Namespaces::new(None, "applet.run").unwrap();
        assert_eq!(ns.classify(&url("node:fs")), Some(SpecifierClass::External));
        assert_eq!(ns.classify(&url("jsr:@std/path")), Some(SpecifierClass::External));
        assert_eq!(
            ns.classify(&url("data:text/javascript,export{}")),
            Some(SpecifierClass::External)
        );
        assert_eq!(ns.classify(&url("file:///src/main.ts")), Some(SpecifierClass::App));
        assert_eq!(
            ns.classify(&url("file:///framework/main.tsx")),
            Some(SpecifierClass::Framework)
        );
        assert_eq!(
            ns.classify(&url("https://applet.run/acme/app/src/x.ts")),
            Some(SpecifierClass::PlatformRemote)
        );
        assert_eq!(
            ns.classify(&url("https://esm.sh/react")),
            Some(SpecifierClass::Remote)
        );
        assert_eq!(ns.classify(&url("file:///etc/passwd")), None);
    }

    #[test]
    fn app_namespace_wins_over_platform_host() {
        let ns = Namespaces::new(Some("https://applet.run/acme/demo/src"), "applet.run").unwrap();
        assert_eq!(
            ns.classify(&url("https://applet.run/acme/demo/src/main.tsx")),
            Some(SpecifierClass::App)
        );
        assert_eq!(
            ns.classify(&url("https://applet.run/acme/other/src/main.tsx")),
            Some(SpecifierClass::PlatformRemote)
        );
    }

    #[test]
    fn not_found_is_redacted() {
        let io = std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "/srv/framework/secret/path.ts: No such file",
        );
        let err = LoadFailure::from(io).into_error("file:///framework/x.ts");
        let message = err.to_string();
        assert!(message.ends_with("File not found"));
        assert!(!message.contains("/srv"));
    }

    #[test]
    fn prepared_script_finds_export_list_locals() {
        let script = PreparedScript::new(
            "main.ts".into(),
            "function run(i: { a: string }) {}\nexport { run as handler };",
        );
        assert_eq!(script.handler_local.as_deref(), Some("run"));
        assert!(script.footer().contains("Object.assign(run,"));
    }

    #[test]
    fn unparsable_script_has_no_metadata() {
        let script = PreparedScript::new("bad.ts".into(), "export function handler( {");
        assert_eq!(script.schema, ScriptSchema::default());
        assert_eq!(script.footer(), "");
    }
}
