//! End-to-end builds against an on-disk framework, an in-memory module
//! cache and a scripted fetcher.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use applet_compiler::{App, BuildConfig, BuildError, BundleArtifact, BundleBuilder, GraphModule, Script};
use async_trait::async_trait;
use module_cache::{FetchError, MemoryKvStore, ModuleFetcher, RemoteModule, RemoteModuleCache};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ScriptedFetcher {
    modules: HashMap<String, String>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    fn with(mut self, specifier: &str, content: &str) -> Self {
        self.modules.insert(specifier.into(), content.into());
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModuleFetcher for ScriptedFetcher {
    async fn fetch(&self, specifier: &str) -> Result<RemoteModule, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let content = self
            .modules
            .get(specifier)
            .ok_or_else(|| FetchError::Status {
                specifier: specifier.to_string(),
                status: 404,
            })?;
        Ok(RemoteModule {
            specifier: specifier.to_string(),
            headers: [(
                "content-type".to_string(),
                "application/javascript".to_string(),
            )]
            .into(),
            content: content.clone(),
        })
    }
}

fn cdn() -> ScriptedFetcher {
    ScriptedFetcher::default()
        .with("https://esm.sh/zod", "export * from \"/zod@3.23.8/index.mjs\";")
        .with("https://esm.sh/zod@3.23.8/index.mjs", "export const z = {};")
        .with(
            "https://esm.sh/react@18.3.1/jsx-runtime",
            "export const jsx = () => null;",
        )
}

fn write_framework(dir: &Path) {
    std::fs::write(
        dir.join("main.tsx"),
        "import scripts from \"./_generated/scripts.ts\";\n\
         import boot from \"./_generated/boot.ts\";\n\
         import { serve } from \"./server.ts\";\n\
         const rpc = process.env.APPLET_RPC_HOST;\n\
         serve(scripts, boot, rpc);\n",
    )
    .unwrap();
    std::fs::write(dir.join("server.ts"), "export const serve = (..._a: unknown[]) => {};\n")
        .unwrap();
}

fn demo_app(main: &str) -> App {
    App {
        id: "app-1".into(),
        slug: "demo".into(),
        secrets_hash: None,
        scripts: vec![
            Script::new("app-1", "s1", "main.ts", main, 0),
            Script::new("app-1", "s2", "util.ts", "export const helper = (s: string) => s;\n", 1),
            Script::new("app-1", "s3", "notes.md", "# not bundled\n", 2),
        ],
    }
}

const MAIN: &str = "import { z } from \"npm:zod\";\n\
import { helper } from \"./util.ts\";\n\
import fs from \"node:fs\";\n\
export function handler({ q }: { q: string }) {\n  return helper(q);\n}\n";

fn builder(dir: &Path, fetcher: Arc<ScriptedFetcher>, store: Arc<MemoryKvStore>) -> BundleBuilder {
    let config = BuildConfig::default()
        .with_framework_dir(dir)
        .with_rpc_host("rpc.example.test")
        .with_max_concurrent_loads(2);
    BundleBuilder::new(config, RemoteModuleCache::new(store), fetcher)
}

async fn build(builder: &BundleBuilder, app: &App) -> Result<BundleArtifact, BuildError> {
    builder.build("browser", app, "abc1234", None).await
}

// ---------------------------------------------------------------------------
// Graph shape
// ---------------------------------------------------------------------------

#[tokio::test]
async fn build_resolves_the_whole_graph() {
    let dir = tempfile::tempdir().unwrap();
    write_framework(dir.path());
    let fetcher = Arc::new(cdn());
    let b = builder(dir.path(), fetcher.clone(), Arc::new(MemoryKvStore::new()));

    let artifact = build(&b, &demo_app(MAIN)).await.unwrap();

    assert_eq!(
        artifact.roots,
        vec![
            "file:///framework/main.tsx",
            "file:///src/main.ts",
            "file:///src/util.ts",
        ]
    );
    let specifiers: Vec<(&str, &str)> = artifact
        .modules
        .iter()
        .map(|m| (m.specifier(), m.kind()))
        .collect();
    assert_eq!(
        specifiers,
        vec![
            ("file:///framework/_generated/boot.ts", "module"),
            ("file:///framework/_generated/scripts.ts", "module"),
            ("file:///framework/main.tsx", "module"),
            ("file:///framework/server.ts", "module"),
            ("file:///src/main.ts", "redirect"),
            ("file:///src/main.tsx", "module"),
            ("file:///src/util.ts", "redirect"),
            ("file:///src/util.tsx", "module"),
            ("https://esm.sh/react@18.3.1/jsx-runtime", "module"),
            ("https://esm.sh/zod", "module"),
            ("https://esm.sh/zod@3.23.8/index.mjs", "module"),
            ("node:fs", "external"),
        ]
    );
    assert_eq!(fetcher.calls(), 3);
}

#[tokio::test]
async fn app_scripts_are_rewritten_and_annotated() {
    let dir = tempfile::tempdir().unwrap();
    write_framework(dir.path());
    let b = builder(dir.path(), Arc::new(cdn()), Arc::new(MemoryKvStore::new()));

    let artifact = build(&b, &demo_app(MAIN)).await.unwrap();
    let main = artifact.content("file:///src/main.ts").unwrap();

    assert!(main.starts_with("/** @jsxImportSource https://esm.sh/react@18.3.1 */\n"));
    assert!(main.contains("from \"https://esm.sh/zod\""));
    assert!(main.contains("from \"file:///src/util.ts\""));
    assert!(main.contains(
        r#"Object.assign(handler, { metadata: {"name":"handler","path":"main.ts"} });"#
    ));
    assert!(main.contains("export type HandlerInput = Parameters<typeof handler>[0];"));

    let Some(GraphModule::Module { headers, .. }) = artifact.module("file:///src/main.tsx") else {
        panic!("main.tsx missing");
    };
    assert_eq!(headers["content-type"], "text/typescript");
}

#[tokio::test]
async fn framework_files_get_env_and_generated_modules() {
    let dir = tempfile::tempdir().unwrap();
    write_framework(dir.path());
    let b = builder(dir.path(), Arc::new(cdn()), Arc::new(MemoryKvStore::new()));

    let artifact = build(&b, &demo_app(MAIN)).await.unwrap();

    let entry = artifact.content("file:///framework/main.tsx").unwrap();
    assert!(entry.contains("const rpc = \"rpc.example.test\";"));

    let index = artifact
        .content("file:///framework/_generated/scripts.ts")
        .unwrap();
    assert!(index.contains("import * as script0 from \"file:///src/main.ts\";"));
    assert!(index.contains("\"util.ts\": script1,"));

    let boot = artifact.content("file:///framework/_generated/boot.ts").unwrap();
    let json = boot
        .strip_prefix("export default ")
        .and_then(|s| s.strip_suffix(";\n"))
        .unwrap();
    let boot: serde_json::Value = serde_json::from_str(json).unwrap();
    assert_eq!(boot["app"]["version"], "abc1234");
    assert_eq!(boot["entrypoint"], "file:///framework/main.tsx");
    assert_eq!(boot["scripts"][0]["handler"][0]["key"], "q");
}

#[tokio::test]
async fn platform_imports_are_fetched_and_shimmed() {
    let dir = tempfile::tempdir().unwrap();
    write_framework(dir.path());
    let fetcher = cdn()
        .with(
            "https://applet.run/acme/tools/src/lib.ts",
            "import { dep } from \"./dep.ts\";\nexport const lib = dep;\n",
        )
        .with("https://applet.run/acme/tools/src/dep.ts", "export const dep = 1;\n");
    let b = builder(dir.path(), Arc::new(fetcher), Arc::new(MemoryKvStore::new()));

    let app = demo_app("import { lib } from \"/acme/tools/src/lib.ts\";\nexport const x = lib;\n");
    let artifact = build(&b, &app).await.unwrap();

    assert_eq!(
        artifact
            .module("https://applet.run/acme/tools/src/lib.ts")
            .map(GraphModule::kind),
        Some("redirect")
    );
    let lib = artifact
        .content("https://applet.run/acme/tools/src/lib.ts")
        .unwrap();
    assert!(lib.contains("from \"https://applet.run/acme/tools/src/dep.ts\""));
    assert!(artifact
        .module("https://applet.run/acme/tools/src/dep.tsx")
        .is_some());
}

#[tokio::test]
async fn identical_input_builds_identical_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    write_framework(dir.path());
    let fetcher = Arc::new(cdn());
    let b = builder(dir.path(), fetcher.clone(), Arc::new(MemoryKvStore::new()));

    let first = build(&b, &demo_app(MAIN)).await.unwrap();
    let second = build(&b, &demo_app(MAIN)).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.to_bytes().unwrap(), second.to_bytes().unwrap());
    // second build is served from the module cache
    assert_eq!(fetcher.calls(), 3);
}

#[tokio::test]
async fn client_scripts_reference_dom_and_actions_get_metadata() {
    let dir = tempfile::tempdir().unwrap();
    write_framework(dir.path());
    let b = builder(dir.path(), Arc::new(cdn()), Arc::new(MemoryKvStore::new()));

    let app = App {
        id: "app-2".into(),
        slug: "widgets".into(),
        secrets_hash: None,
        scripts: vec![
            Script::new("app-2", "s1", "client.ts", "\"use client\";\nexport const x = 1;\n", 0),
            Script::new(
                "app-2",
                "s2",
                "actions.ts",
                "export const actions = { run: ({ a }: { a: string }) => a };\n",
                1,
            ),
        ],
    };
    let artifact = build(&b, &app).await.unwrap();

    let client = artifact.content("file:///src/client.ts").unwrap();
    assert!(client.contains("/// <reference lib=\"dom\" />\n\"use client\";"));

    let actions = artifact.content("file:///src/actions.ts").unwrap();
    assert!(!actions.contains("<reference lib"));
    assert!(actions.contains(
        r#"Object.assign(actions["run"], { metadata: {"name":"run","path":"actions.ts"} });"#
    ));
    assert!(actions.contains(
        r#"export type RunActionInput = Parameters<(typeof actions)["run"]>[0];"#
    ));

    let boot = artifact.content("file:///framework/_generated/boot.ts").unwrap();
    let json = boot
        .strip_prefix("export default ")
        .and_then(|s| s.strip_suffix(";\n"))
        .unwrap();
    let boot: serde_json::Value = serde_json::from_str(json).unwrap();
    assert_eq!(boot["scripts"][1]["actions"]["run"]["inputs"][0]["key"], "a");
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_app_import_fails_with_its_specifier() {
    let dir = tempfile::tempdir().unwrap();
    write_framework(dir.path());
    let b = builder(dir.path(), Arc::new(cdn()), Arc::new(MemoryKvStore::new()));

    let err = build(&b, &demo_app("import \"./missing.ts\";\n"))
        .await
        .unwrap_err();
    match err {
        BuildError::Load { specifier, message } => {
            assert_eq!(specifier, "file:///src/missing.ts");
            assert_eq!(message, "File not found");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn missing_framework_file_never_leaks_its_path() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("main.tsx"), "import \"./gone.ts\";\n").unwrap();
    let b = builder(dir.path(), Arc::new(cdn()), Arc::new(MemoryKvStore::new()));

    let err = build(&b, &demo_app(MAIN)).await.unwrap_err();
    let message = err.to_string();
    assert_eq!(
        message,
        "failed to load file:///framework/gone.ts: File not found"
    );
    assert!(!message.contains(&*dir.path().to_string_lossy()));
}

#[tokio::test]
async fn remote_fetch_failure_aborts_the_build() {
    let dir = tempfile::tempdir().unwrap();
    write_framework(dir.path());
    let b = builder(
        dir.path(),
        Arc::new(ScriptedFetcher::default()),
        Arc::new(MemoryKvStore::new()),
    );

    let err = build(&b, &demo_app(MAIN)).await.unwrap_err();
    assert!(matches!(err, BuildError::Load { .. }), "{err}");
}

#[tokio::test]
async fn bare_specifier_in_remote_module_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_framework(dir.path());
    let fetcher = cdn().with("https://esm.sh/left-pad", "import x from \"lodash\";\n");
    let b = builder(dir.path(), Arc::new(fetcher), Arc::new(MemoryKvStore::new()));

    let err = build(&b, &demo_app("import pad from \"left-pad\";\n"))
        .await
        .unwrap_err();
    match err {
        BuildError::Load { specifier, .. } => assert_eq!(specifier, "lodash"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn colliding_script_names_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_framework(dir.path());
    let b = builder(dir.path(), Arc::new(cdn()), Arc::new(MemoryKvStore::new()));

    let app = App {
        id: "app-3".into(),
        slug: "clash".into(),
        secrets_hash: None,
        scripts: vec![
            Script::new("app-3", "s1", "a b.ts", "export const a = 1;\n", 0),
            Script::new("app-3", "s2", "ab.ts", "export const b = 2;\n", 1),
        ],
    };
    let err = build(&b, &app).await.unwrap_err();
    match &err {
        BuildError::ScriptCollision { first, second, filename } => {
            assert_eq!(first, "a b.ts");
            assert_eq!(second, "ab.ts");
            assert_eq!(filename, "ab.ts");
        }
        other => panic!("unexpected error: {other}"),
    }
    let message = err.to_string();
    assert!(message.contains("\"a b.ts\"") && message.contains("\"ab.ts\""));
}
