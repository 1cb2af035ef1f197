// src/utils/http.rs

//! HTTP transport: the `Fetcher` seam and its reqwest implementation.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{AppError, Result};

/// A fully shaped outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Egress proxy bound to the session making the request
    pub proxy: Option<String>,
    pub timeout: Duration,
}

impl FetchRequest {
    /// Look up a header value (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Raw response. The body is parsed into a document only after the fetch completes.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    pub url: String,
    pub status: u16,
    pub body: String,
}

/// Performs a single HTTP fetch.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse>;
}

/// reqwest-backed fetcher. Keeps one client per egress proxy.
pub struct HttpFetcher {
    direct: Client,
    proxied: Mutex<HashMap<String, Client>>,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Ok(Self {
            direct: Self::build_client(None)?,
            proxied: Mutex::new(HashMap::new()),
        })
    }

    fn build_client(proxy: Option<&str>) -> Result<Client> {
        let mut builder = Client::builder()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .redirect(reqwest::redirect::Policy::limited(10));
        if let Some(proxy) = proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }
        Ok(builder.build()?)
    }

    fn client_for(&self, proxy: Option<&str>) -> Result<Client> {
        let Some(proxy) = proxy else {
            return Ok(self.direct.clone());
        };
        let mut cache = self
            .proxied
            .lock()
            .map_err(|_| AppError::config("proxy client cache poisoned"))?;
        if let Some(client) = cache.get(proxy) {
            return Ok(client.clone());
        }
        let client = Self::build_client(Some(proxy))?;
        cache.insert(proxy.to_string(), client.clone());
        Ok(client)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        let client = self.client_for(request.proxy.as_deref())?;

        let mut builder = client.get(&request.url).timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| transport_error(&request.url, e))?;
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(&request.url, e))?;

        Ok(FetchResponse { url, status, body })
    }
}

/// Timeouts and connection failures become retryable network failures.
fn transport_error(url: &str, error: reqwest::Error) -> AppError {
    if error.is_timeout() || error.is_connect() || error.is_request() || error.is_body() {
        AppError::network(url, error)
    } else {
        AppError::Http(error)
    }
}
