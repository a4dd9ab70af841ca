//! Applet CLI
//!
//! The `applet` command inspects, hashes, builds and publishes applets
//! described by an app JSON file (`{id, slug, secretsHash?, scripts[]}`).
//!
//! ## Commands
//!
//! - `schema`: Print the handler and action input schema of one script
//! - `hash`: Print an app's content hash and version id
//! - `build`: Resolve an app's module graph into an artifact file
//! - `publish`: Build (or reuse) and store a version
//! - `versions`: List stored versions of an app

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use applet_compiler::{
    app_hash_and_version, deployment_url, App, BuildConfig, BundleBuilder, Publisher, METRICS,
};
use applet_store::{FsBlobStore, SurrealHandle, SurrealVersionStore, VersionStore};
use clap::{Parser, Subcommand};
use module_cache::{
    HttpFetcher, KvStore, MemoryKvStore, RemoteModuleCache, RestKvConfig, RestKvStore,
};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "applet")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build and publish applets", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Directory holding the framework sources
    #[arg(long, global = true, env = "APPLET_FRAMEWORK_DIR")]
    framework_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the input schema of a script
    Schema {
        /// TypeScript source file
        file: PathBuf,

        /// Fail on malformed exports instead of skipping them
        #[arg(long)]
        strict: bool,
    },

    /// Print an app's hash and version id
    Hash {
        /// App JSON file
        app: PathBuf,
    },

    /// Build an app's artifact
    Build {
        /// App JSON file
        app: PathBuf,

        /// Execution target the module cache is keyed by
        #[arg(short, long, default_value = "deno")]
        target: String,

        /// Address app scripts under this URL instead of file:///src/
        #[arg(long)]
        base_url: Option<String>,

        /// Artifact output path (default: <slug>-<version>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build or reuse a version and store its artifact
    Publish {
        /// App JSON file
        app: PathBuf,

        #[arg(short, long, default_value = "deno")]
        target: String,

        #[arg(long)]
        base_url: Option<String>,

        /// Blob storage root
        #[arg(long, env = "APPLET_BLOB_DIR", default_value = ".applet/blobs")]
        blob_dir: PathBuf,
    },

    /// List stored versions of an app, newest first
    Versions {
        /// App id
        app_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    applet_compiler::init_tracing(cli.json, level);

    let mut config = BuildConfig::from_env().context("Invalid build configuration")?;
    if let Some(dir) = cli.framework_dir {
        config = config.with_framework_dir(dir);
    }

    let result = match cli.command {
        Commands::Schema { file, strict } => cmd_schema(&file, strict),
        Commands::Hash { app } => cmd_hash(&config, &app),
        Commands::Build {
            app,
            target,
            base_url,
            output,
        } => {
            let builder = builder_from_env(config)?;
            cmd_build(&builder, &app, &target, base_url.as_deref(), output.as_deref()).await
        }
        Commands::Publish {
            app,
            target,
            base_url,
            blob_dir,
        } => {
            let handle = SurrealHandle::setup_from_env()
                .await
                .context("Failed to connect to the version database")?;
            let builder = builder_from_env(config)?;
            cmd_publish(builder, handle, &blob_dir, &app, &target, base_url.as_deref()).await
        }
        Commands::Versions { app_id } => {
            let handle = SurrealHandle::setup_from_env()
                .await
                .context("Failed to connect to the version database")?;
            cmd_versions(handle, &app_id).await
        }
    };

    METRICS.flush();
    result
}

/// Builder wired to the REST module cache when `APPLET_CACHE_URL` is set,
/// else to a process-local one.
fn builder_from_env(config: BuildConfig) -> Result<BundleBuilder> {
    let store: Arc<dyn KvStore> = if std::env::var("APPLET_CACHE_URL").is_ok() {
        Arc::new(RestKvStore::new(RestKvConfig::from_env()).context("Failed to create cache client")?)
    } else {
        Arc::new(MemoryKvStore::new())
    };
    let fetcher = HttpFetcher::new(config.network_timeout).context("Failed to create HTTP client")?;
    Ok(BundleBuilder::new(
        config,
        RemoteModuleCache::new(store),
        Arc::new(fetcher),
    ))
}

fn load_app(path: &Path) -> Result<App> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid app JSON in {:?}", path))
}

/// Print a script's schema as JSON
fn cmd_schema(file: &Path, strict: bool) -> Result<()> {
    let source =
        std::fs::read_to_string(file).with_context(|| format!("Failed to read {:?}", file))?;
    let schema = applet_schema::analyze_script(&source, strict)
        .with_context(|| format!("Schema extraction failed for {:?}", file))?;
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn cmd_hash(config: &BuildConfig, app_path: &Path) -> Result<()> {
    let app = load_app(app_path)?;
    let av = app_hash_and_version(&app, &config.framework_version)?;
    println!("Hash:    {}", av.hash);
    println!("Version: {}", av.version);
    println!("URL:     {}", deployment_url("https", &app.slug, &av.version));
    Ok(())
}

async fn cmd_build(
    builder: &BundleBuilder,
    app_path: &Path,
    target: &str,
    base_url: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let app = load_app(app_path)?;
    let av = app_hash_and_version(&app, &builder.config().framework_version)?;
    let artifact = builder
        .build(target, &app, &av.version, base_url)
        .await
        .with_context(|| format!("Build of {} failed", app.slug))?;

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(format!("{}-{}.json", app.slug, av.version)));
    std::fs::write(&output, artifact.to_bytes()?)
        .with_context(|| format!("Failed to write {:?}", output))?;

    info!(path = %output.display(), modules = artifact.modules.len(), "artifact written");
    println!("Built {} v{} ({} modules)", app.slug, av.version, artifact.modules.len());
    println!("  Artifact: {}", output.display());
    Ok(())
}

async fn cmd_publish(
    builder: BundleBuilder,
    handle: SurrealHandle,
    blob_dir: &Path,
    app_path: &Path,
    target: &str,
    base_url: Option<&str>,
) -> Result<()> {
    let app = load_app(app_path)?;
    let publisher = Publisher::new(
        builder,
        Arc::new(SurrealVersionStore::new(Arc::new(handle))),
        Arc::new(FsBlobStore::new(blob_dir)),
    );

    let outcome = publisher
        .publish(&app, target, base_url)
        .await
        .with_context(|| format!("Publish of {} failed", app.slug))?;
    let reused = outcome.reused;
    let record = outcome
        .finish()
        .await
        .context("Failed to store the artifact")?;

    let verb = if reused { "Reused" } else { "Published" };
    println!("{} {} v{}", verb, app.slug, record.version);
    println!("  Hash:     {}", record.hash);
    println!("  Artifact: {}", record.artifact_digest);
    println!("  URL:      {}", deployment_url("https", &app.slug, &record.version));
    Ok(())
}

async fn cmd_versions(handle: SurrealHandle, app_id: &str) -> Result<()> {
    let store = SurrealVersionStore::new(Arc::new(handle));
    let versions = store.list(app_id).await?;
    if versions.is_empty() {
        println!("No versions found for '{}'", app_id);
        return Ok(());
    }
    for record in versions {
        println!(
            "v{}  {}  {}{}",
            record.version,
            record.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            record.artifact_digest.short(),
            if record.is_published { "  published" } else { "" }
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use applet_compiler::Script;
    use async_trait::async_trait;
    use module_cache::{FetchError, ModuleFetcher, RemoteModule};

    struct Offline;

    #[async_trait]
    impl ModuleFetcher for Offline {
        async fn fetch(&self, specifier: &str) -> std::result::Result<RemoteModule, FetchError> {
            Err(FetchError::Unsupported(specifier.to_string()))
        }
    }

    fn write_app(dir: &Path) -> PathBuf {
        let app = App {
            id: "app-1".into(),
            slug: "demo".into(),
            secrets_hash: None,
            scripts: vec![Script::new(
                "app-1",
                "s1",
                "main.ts",
                "export function handler({ q }: { q: string }) { return q; }\n",
                0,
            )],
        };
        let path = dir.join("app.json");
        std::fs::write(&path, serde_json::to_vec(&app).unwrap()).unwrap();
        path
    }

    fn offline_builder(dir: &Path) -> BundleBuilder {
        std::fs::write(
            dir.join("main.tsx"),
            "import scripts from \"./_generated/scripts.ts\";\nexport default scripts;\n",
        )
        .unwrap();
        let config = BuildConfig {
            jsx_import_source: "data:text/javascript,export{}".to_string(),
            ..BuildConfig::default().with_framework_dir(dir)
        };
        BundleBuilder::new(
            config,
            RemoteModuleCache::new(Arc::new(MemoryKvStore::new())),
            Arc::new(Offline),
        )
    }

    #[test]
    fn cli_parses_publish_flags() {
        let cli = Cli::try_parse_from([
            "applet",
            "--json",
            "publish",
            "app.json",
            "--target",
            "browser",
            "--blob-dir",
            "/tmp/blobs",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Publish {
                target, blob_dir, ..
            } => {
                assert_eq!(target, "browser");
                assert_eq!(blob_dir, PathBuf::from("/tmp/blobs"));
            }
            _ => panic!("expected publish"),
        }
    }

    #[test]
    fn hash_reads_app_json() {
        let dir = tempfile::tempdir().unwrap();
        let app = write_app(dir.path());
        cmd_hash(&BuildConfig::default(), &app).unwrap();
        assert!(cmd_hash(&BuildConfig::default(), &dir.path().join("missing.json")).is_err());
    }

    #[tokio::test]
    async fn build_writes_an_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let app = write_app(dir.path());
        let output = dir.path().join("out.json");

        cmd_build(&offline_builder(dir.path()), &app, "deno", None, Some(&output))
            .await
            .unwrap();

        let artifact =
            applet_compiler::BundleArtifact::from_bytes(&std::fs::read(&output).unwrap()).unwrap();
        assert!(artifact.content("file:///src/main.ts").is_some());
    }

    #[tokio::test]
    async fn publish_then_list_versions() {
        let dir = tempfile::tempdir().unwrap();
        let app = write_app(dir.path());
        let handle = SurrealHandle::setup_db().await.unwrap();

        cmd_publish(
            offline_builder(dir.path()),
            handle.clone(),
            &dir.path().join("blobs"),
            &app,
            "deno",
            None,
        )
        .await
        .unwrap();

        let versions = SurrealVersionStore::new(Arc::new(handle.clone()))
            .list("app-1")
            .await
            .unwrap();
        assert_eq!(versions.len(), 1);
        cmd_versions(handle, "app-1").await.unwrap();
    }
}
