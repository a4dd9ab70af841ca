//! Bundle Builder: resolves an app's module graph into a [`BundleArtifact`].
//!
//! Resolution starts from the framework entry point and every bundled app
//! script, then follows each loaded module's imports. Loads run concurrently,
//! bounded by a semaphore; the first failure aborts the build and no partial
//! artifact is produced.

pub mod artifact;
pub mod framework;
pub mod load;
pub mod transform;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use applet_schema::scan_imports;
use module_cache::{ModuleFetcher, RemoteModuleCache};
use reqwest::Url;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;

pub use artifact::{BundleArtifact, GraphModule, SourceModule, ARTIFACT_FORMAT};
pub use load::{BuildContext, LoadFailure, Loaded, Namespaces, SpecifierClass};

use crate::config::BuildConfig;
use crate::error::{BuildError, Result};
use crate::metrics::METRICS;
use crate::model::App;
use crate::obs::{self, BuildSpan};
use crate::rewrite::has_scheme;
use transform::jsx_import_source;

/// Builds artifacts for any number of apps. Cheap to clone; the cache and
/// fetcher handles are shared.
#[derive(Clone)]
pub struct BundleBuilder {
    config: Arc<BuildConfig>,
    cache: RemoteModuleCache,
    fetcher: Arc<dyn ModuleFetcher>,
}

impl BundleBuilder {
    pub fn new(config: BuildConfig, cache: RemoteModuleCache, fetcher: Arc<dyn ModuleFetcher>) -> Self {
        BundleBuilder {
            config: Arc::new(config),
            cache,
            fetcher,
        }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Build the artifact for `app` at `version`.
    ///
    /// `base_url` overrides where app scripts are addressed (default
    /// `file:///src/`).
    pub async fn build(
        &self,
        target: &str,
        app: &App,
        version: &str,
        base_url: Option<&str>,
    ) -> Result<BundleArtifact> {
        let started = Instant::now();
        let result = self
            .resolve_graph(target, app, version, base_url)
            .instrument(BuildSpan::span(&app.slug, version))
            .await;

        match &result {
            Ok(artifact) => {
                METRICS.inc_builds();
                METRICS.add_modules(artifact.modules.len() as u64);
                obs::emit_build_finished(
                    &app.id,
                    artifact.modules.len(),
                    started.elapsed().as_millis() as u64,
                );
            }
            Err(err) => obs::emit_build_failed(&app.id, err),
        }
        result
    }

    async fn resolve_graph(
        &self,
        target: &str,
        app: &App,
        version: &str,
        base_url: Option<&str>,
    ) -> Result<BundleArtifact> {
        let ctx = Arc::new(BuildContext::new(
            Arc::clone(&self.config),
            self.cache.clone(),
            Arc::clone(&self.fetcher),
            target,
            app,
            version,
            base_url,
        )?);
        obs::emit_build_started(&app.id, version, ctx.roots.len());

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_loads.max(1)));
        let mut tasks = JoinSet::new();
        let mut seen = HashSet::new();
        let mut modules = Vec::new();

        for root in &ctx.roots {
            let url = Url::parse(root)
                .map_err(|e| BuildError::load(root.as_str(), format!("invalid root: {e}")))?;
            if seen.insert(url.to_string()) {
                spawn_load(&mut tasks, &ctx, &semaphore, url);
            }
        }

        // Dropping `tasks` on an early return aborts every pending load.
        while let Some(joined) = tasks.join_next().await {
            let (requested, loaded) = joined??;
            let source = match loaded {
                Loaded::External => {
                    obs::emit_module_loaded(requested.as_str(), "external");
                    modules.push(GraphModule::External {
                        specifier: requested.to_string(),
                    });
                    continue;
                }
                Loaded::Source(source) => source,
            };

            let base = if source.specifier != requested.as_str() {
                modules.push(GraphModule::Redirect {
                    specifier: requested.to_string(),
                    target: source.specifier.clone(),
                });
                if !seen.insert(source.specifier.clone()) {
                    continue;
                }
                Url::parse(&source.specifier).map_err(|e| {
                    BuildError::load(requested.as_str(), format!("invalid redirect target: {e}"))
                })?
            } else {
                requested
            };

            for dep in dependencies(&source, &base)? {
                if seen.insert(dep.to_string()) {
                    spawn_load(&mut tasks, &ctx, &semaphore, dep);
                }
            }
            obs::emit_module_loaded(&source.specifier, "module");
            modules.push(source.into());
        }

        Ok(BundleArtifact::new(ctx.roots.clone(), modules))
    }
}

fn spawn_load(
    tasks: &mut JoinSet<Result<(Url, Loaded)>>,
    ctx: &Arc<BuildContext>,
    semaphore: &Arc<Semaphore>,
    url: Url,
) {
    let ctx = Arc::clone(ctx);
    let semaphore = Arc::clone(semaphore);
    tasks.spawn(
        async move {
            let _permit = semaphore.acquire_owned().await.ok();
            let loaded = ctx.load(&url).await?;
            Ok((url, loaded))
        }
        .in_current_span(),
    );
}

fn is_script(module: &SourceModule) -> bool {
    let by_type = match module.content_type() {
        Some(ct) => !(ct.contains("json") || ct.starts_with("text/css")),
        None => true,
    };
    let path = module.specifier.split(['?', '#']).next().unwrap_or_default();
    by_type && !(path.ends_with(".json") || path.ends_with(".css"))
}

/// Resolve an import found inside an already-rewritten module.
pub fn resolve_dependency(specifier: &str, base: &Url) -> Result<Url> {
    let resolved = if has_scheme(specifier) {
        Url::parse(specifier)
    } else if specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier.starts_with('/')
    {
        base.join(specifier)
    } else {
        return Err(BuildError::load(
            specifier,
            format!("bare specifier imported from {base}"),
        ));
    };
    resolved.map_err(|e| BuildError::load(specifier, format!("invalid specifier: {e}")))
}

/// Every module `module` imports, plus the JSX runtime its pragma names.
fn dependencies(module: &SourceModule, base: &Url) -> Result<Vec<Url>> {
    if !is_script(module) {
        return Ok(Vec::new());
    }
    let imports = scan_imports(&module.content)
        .map_err(|e| BuildError::load(module.specifier.as_str(), format!("syntax error: {e}")))?;
    let mut deps = imports
        .iter()
        .map(|import| resolve_dependency(&import.specifier, base))
        .collect::<Result<Vec<_>>>()?;
    if let Some(source) = jsx_import_source(&module.content) {
        deps.push(resolve_dependency(&format!("{source}/jsx-runtime"), base)?);
    }
    Ok(deps)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://esm.sh/react@18.3.1").unwrap()
    }

    #[test]
    fn dependencies_resolve_against_the_module() {
        assert_eq!(
            resolve_dependency("/stable/react.mjs", &base()).unwrap().as_str(),
            "https://esm.sh/stable/react.mjs"
        );
        assert_eq!(
            resolve_dependency("node:process", &base()).unwrap().as_str(),
            "node:process"
        );
        let err = resolve_dependency("lodash", &base()).unwrap_err();
        assert!(matches!(err, BuildError::Load { .. }));
    }

    #[test]
    fn jsx_pragma_adds_runtime_dependency() {
        let module = SourceModule::typescript(
            "file:///src/a.tsx",
            "/** @jsxImportSource https://esm.sh/react@18.3.1 */\nimport \"./b.tsx\";",
        );
        let deps = dependencies(&module, &Url::parse(&module.specifier).unwrap()).unwrap();
        let deps: Vec<&str> = deps.iter().map(Url::as_str).collect();
        assert_eq!(
            deps,
            vec!["file:///src/b.tsx", "https://esm.sh/react@18.3.1/jsx-runtime"]
        );
    }

    #[test]
    fn data_modules_are_not_scanned() {
        let mut module = SourceModule::typescript("https://x.test/data.json", "{\"import\": 1}");
        module
            .headers
            .insert("content-type".into(), "application/json".into());
        assert!(dependencies(&module, &Url::parse(&module.specifier).unwrap())
            .unwrap()
            .is_empty());
    }
}
