//! Remote module fetching

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::cache::RemoteModule;
use crate::error::FetchError;

/// Fetches the source of a remote module.
#[async_trait]
pub trait ModuleFetcher: Send + Sync {
    async fn fetch(&self, specifier: &str) -> Result<RemoteModule, FetchError>;
}

/// `ModuleFetcher` over plain HTTP(S).
///
/// Redirects are followed; the returned module's `specifier` is the final
/// URL so relative imports inside it resolve against where it really lives.
pub struct HttpFetcher {
    http_client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("applet-module-cache/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Http {
                specifier: String::new(),
                message: e.to_string(),
            })?;
        Ok(HttpFetcher {
            http_client,
            timeout,
        })
    }
}

#[async_trait]
impl ModuleFetcher for HttpFetcher {
    async fn fetch(&self, specifier: &str) -> Result<RemoteModule, FetchError> {
        if !(specifier.starts_with("https://") || specifier.starts_with("http://")) {
            return Err(FetchError::Unsupported(specifier.to_string()));
        }

        let http_error = |e: reqwest::Error| FetchError::Http {
            specifier: specifier.to_string(),
            message: e.to_string(),
        };

        let request = async {
            let response = self
                .http_client
                .get(specifier)
                .send()
                .await
                .map_err(http_error)?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    specifier: specifier.to_string(),
                    status: status.as_u16(),
                });
            }

            let final_url = response.url().to_string();
            let headers: BTreeMap<String, String> = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
                })
                .collect();
            let content = response.text().await.map_err(http_error)?;
            Ok(RemoteModule {
                specifier: final_url,
                headers,
                content,
            })
        };

        let module = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| FetchError::Timeout {
                specifier: specifier.to_string(),
                timeout: self.timeout,
            })??;
        debug!(specifier, bytes = module.content.len(), "fetched remote module");
        Ok(module)
    }
}
