//! Structured events for the build and publish lifecycle.
//!
//! Every event carries an `event` field (`build.started`, `publish.reused`,
//! ...) so JSON log pipelines can filter on it. Module loads are logged at
//! `debug!`; everything else at `info!` or `warn!`.

use tracing::{debug, info, warn};

/// RAII guard that enters a build-scoped span for the duration of a build.
///
/// ```ignore
/// let _span = BuildSpan::enter("demo", "3f2a9c1");
/// // module loads below are tagged with app_slug and version
/// ```
pub struct BuildSpan {
    _span: tracing::span::EnteredSpan,
}

impl BuildSpan {
    pub fn enter(app_slug: &str, version: &str) -> Self {
        Self {
            _span: Self::span(app_slug, version).entered(),
        }
    }

    /// The span itself, for instrumenting futures that may hop threads.
    pub fn span(app_slug: &str, version: &str) -> tracing::Span {
        tracing::info_span!("applet.build", app_slug = %app_slug, version = %version)
    }
}

pub fn emit_build_started(app_id: &str, version: &str, roots: usize) {
    info!(event = "build.started", app_id = %app_id, version = %version, roots = roots);
}

pub fn emit_module_loaded(specifier: &str, kind: &str) {
    debug!(event = "build.module_loaded", specifier = %specifier, kind = %kind);
}

pub fn emit_build_finished(app_id: &str, modules: usize, duration_ms: u64) {
    info!(
        event = "build.finished",
        app_id = %app_id,
        modules = modules,
        duration_ms = duration_ms,
    );
}

pub fn emit_build_failed(app_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "build.failed", app_id = %app_id, error = %error);
}

/// An existing version row with a live artifact was reused.
pub fn emit_publish_reused(app_id: &str, version: &str, digest: &str) {
    info!(event = "publish.reused", app_id = %app_id, version = %version, digest = %digest);
}

pub fn emit_publish_stored(app_id: &str, version: &str, digest: &str, bytes: usize) {
    info!(
        event = "publish.stored",
        app_id = %app_id,
        version = %version,
        digest = %digest,
        bytes = bytes,
    );
}

pub fn emit_blob_write_failed(app_id: &str, digest: &str, error: &dyn std::fmt::Display) {
    warn!(event = "publish.blob_write_failed", app_id = %app_id, digest = %digest, error = %error);
}
