// Live fetch collaborator: plain GETs with a browser-like header set, no retries.

use std::sync::OnceLock;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use tracing::{debug, trace};

use crate::config::FetchConfig;
use crate::error::ResolveError;

/// Raw result of a GET.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl FetchResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}

#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn get(&self, url: &str, headers: &HeaderMap) -> Result<FetchResponse, ResolveError>;
}

/// Headers sent with every media request.
pub fn request_headers(config: &FetchConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&config.user_agent) {
        headers.insert(header::USER_AGENT, value);
    }
    if let Ok(value) = HeaderValue::from_str(&config.referer) {
        headers.insert(header::REFERER, value);
    }
    if let Ok(value) = HeaderValue::from_str(&config.accept) {
        headers.insert(header::ACCEPT, value);
    }
    headers
}

/// Install the process-wide rustls crypto provider once.
pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// [`MediaFetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, ResolveError> {
        install_rustls_provider();
        let client = Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl MediaFetcher for HttpFetcher {
    async fn get(&self, url: &str, headers: &HeaderMap) -> Result<FetchResponse, ResolveError> {
        debug!(url, "Fetching media");
        let response = self
            .client
            .get(url)
            .headers(headers.clone())
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        trace!(url, %status, bytes = body.len(), "Fetch complete");

        Ok(FetchResponse {
            status,
            headers,
            body,
        })
    }
}
