// HTTP Fetcher: cancellable GET requests bound to one session's client and headers.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use reqwest::header::HeaderMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{M3u8Error, Result};
use crate::proxy::{ProxyConfig, build_proxy_from_config};
use crate::{DownloadRequest, SessionConfig};

/// Source of raw bytes for playlists, keys and segments.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Fetch the full body behind `url`.
    ///
    /// Returns [`M3u8Error::Cancelled`] once the owning session is cancelled.
    async fn fetch(&self, url: &str) -> Result<Bytes>;
}

/// Builds the fetcher used by one session.
pub trait FetcherFactory: Send + Sync {
    fn create(
        &self,
        request: &DownloadRequest,
        headers: HeaderMap,
        token: CancellationToken,
    ) -> Result<Arc<dyn ResourceFetcher>>;
}

/// Create a reqwest Client honouring the request's TLS and proxy policy
pub fn create_client(
    config: &SessionConfig,
    request: &DownloadRequest,
    headers: HeaderMap,
) -> Result<Client> {
    let mut client_builder = Client::builder()
        .pool_max_idle_per_host(config.download_concurrency)
        .default_headers(headers)
        .danger_accept_invalid_certs(request.insecure)
        .redirect(reqwest::redirect::Policy::limited(10));

    if !config.timeout.is_zero() {
        client_builder = client_builder.timeout(config.timeout);
    }

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    match ProxyConfig::parse(&request.proxy)? {
        Some(proxy_config) => {
            client_builder = client_builder.proxy(build_proxy_from_config(&proxy_config)?);
            info!(proxy_url = %proxy_config.url, "Using explicitly configured proxy for downloads");
        }
        None => {
            client_builder = client_builder.no_proxy();
            debug!("Proxy disabled for downloads");
        }
    }

    if request.insecure {
        info!("TLS certificate verification disabled for this session");
    }

    client_builder.build().map_err(M3u8Error::from)
}

pub struct HttpFetcher {
    http_client: Client,
    token: CancellationToken,
}

impl HttpFetcher {
    pub fn new(http_client: Client, token: CancellationToken) -> Self {
        Self { http_client, token }
    }

    async fn get(&self, url: &str) -> Result<Bytes> {
        let response = self.http_client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(M3u8Error::Status {
                status: response.status(),
                url: url.to_string(),
            });
        }
        let body = response.bytes().await?;
        debug!(url = %url, len = body.len(), "Fetched resource");
        Ok(body)
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(M3u8Error::Cancelled),
            result = self.get(url) => result,
        }
    }
}

/// Default factory: one reqwest client per session.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcherFactory {
    config: SessionConfig,
}

impl HttpFetcherFactory {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }
}

impl FetcherFactory for HttpFetcherFactory {
    fn create(
        &self,
        request: &DownloadRequest,
        headers: HeaderMap,
        token: CancellationToken,
    ) -> Result<Arc<dyn ResourceFetcher>> {
        let client = create_client(&self.config, request, headers)?;
        Ok(Arc::new(HttpFetcher::new(client, token)))
    }
}
