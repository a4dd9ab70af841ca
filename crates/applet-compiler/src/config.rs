//! Build configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BuildError, Result};
use crate::hasher::UNVERSIONED_FRAMEWORK;

/// Settings shared by every build in a process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Directory holding the static framework sources
    pub framework_dir: PathBuf,
    /// Framework entry point, relative to `framework_dir`
    pub framework_entry: String,
    /// Framework release; `0.0.0` means unversioned
    pub framework_version: String,
    /// Host serving other apps' scripts for remote import
    pub platform_host: String,
    /// ESM CDN prefix for bare and `npm:` specifiers
    pub cdn_url: String,
    /// Default `@jsxImportSource` for TSX modules
    pub jsx_import_source: String,
    /// Value for `process.env.APPLET_RPC_HOST` in framework sources
    pub rpc_host: Option<String>,
    /// Value for `process.env.APPLET_HMAC_SECRET` in framework sources;
    /// never serialized
    #[serde(default, skip_serializing)]
    pub hmac_secret: Option<String>,
    /// Upper bound on concurrent module loads per build
    pub max_concurrent_loads: usize,
    /// Bound on every network call made while building
    pub network_timeout: Duration,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            framework_dir: PathBuf::from("framework"),
            framework_entry: "main.tsx".to_string(),
            framework_version: UNVERSIONED_FRAMEWORK.to_string(),
            platform_host: "applet.run".to_string(),
            cdn_url: "https://esm.sh/".to_string(),
            jsx_import_source: "https://esm.sh/react@18.3.1".to_string(),
            rpc_host: None,
            hmac_secret: None,
            max_concurrent_loads: 8,
            network_timeout: Duration::from_secs(30),
        }
    }
}

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    env(name)
        .map(|raw| {
            raw.parse()
                .map_err(|_| BuildError::Config(format!("{name} is not a valid number: {raw}")))
        })
        .transpose()
}

impl BuildConfig {
    /// Defaults overridden by `APPLET_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = BuildConfig {
            framework_dir: env("APPLET_FRAMEWORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.framework_dir),
            framework_entry: env("APPLET_FRAMEWORK_ENTRY").unwrap_or(defaults.framework_entry),
            framework_version: env("APPLET_FRAMEWORK_VERSION")
                .unwrap_or(defaults.framework_version),
            platform_host: env("APPLET_PLATFORM_HOST").unwrap_or(defaults.platform_host),
            cdn_url: env("APPLET_CDN_URL").unwrap_or(defaults.cdn_url),
            jsx_import_source: env("APPLET_JSX_IMPORT_SOURCE")
                .unwrap_or(defaults.jsx_import_source),
            rpc_host: env("APPLET_RPC_HOST"),
            hmac_secret: env("APPLET_HMAC_SECRET"),
            max_concurrent_loads: env_parse("APPLET_BUILD_CONCURRENCY")?
                .unwrap_or(defaults.max_concurrent_loads),
            network_timeout: env_parse::<u64>("APPLET_NETWORK_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.network_timeout),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_loads == 0 {
            return Err(BuildError::Config(
                "max_concurrent_loads must be at least 1".to_string(),
            ));
        }
        if !self.cdn_url.ends_with('/') {
            return Err(BuildError::Config(format!(
                "CDN URL must end with '/': {}",
                self.cdn_url
            )));
        }
        Ok(())
    }

    pub fn with_framework_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.framework_dir = dir.into();
        self
    }

    pub fn with_framework_version(mut self, version: &str) -> Self {
        self.framework_version = version.to_string();
        self
    }

    pub fn with_platform_host(mut self, host: &str) -> Self {
        self.platform_host = host.to_string();
        self
    }

    pub fn with_cdn_url(mut self, url: &str) -> Self {
        self.cdn_url = url.to_string();
        self
    }

    pub fn with_rpc_host(mut self, host: &str) -> Self {
        self.rpc_host = Some(host.to_string());
        self
    }

    pub fn with_hmac_secret(mut self, secret: &str) -> Self {
        self.hmac_secret = Some(secret.to_string());
        self
    }

    pub fn with_max_concurrent_loads(mut self, n: usize) -> Self {
        self.max_concurrent_loads = n;
        self
    }

    pub fn with_network_timeout(mut self, timeout: Duration) -> Self {
        self.network_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BuildConfig::default();
        assert_eq!(config.framework_entry, "main.tsx");
        assert_eq!(config.framework_version, "0.0.0");
        assert_eq!(config.max_concurrent_loads, 8);
        assert_eq!(config.network_timeout, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = BuildConfig::default().with_max_concurrent_loads(0);
        assert!(matches!(config.validate(), Err(BuildError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_cdn_without_trailing_slash() {
        let config = BuildConfig::default().with_cdn_url("https://esm.sh");
        assert!(matches!(config.validate(), Err(BuildError::Config(_))));
    }

    #[test]
    fn test_serialized_config_omits_hmac_secret() {
        let config = BuildConfig::default().with_hmac_secret("s3cr3t");
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("s3cr3t"));
        assert!(!json.contains("hmac_secret"));
    }
}
