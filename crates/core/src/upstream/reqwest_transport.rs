//! reqwest-backed transport.

use std::error::Error as _;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Proxy, RequestBuilder};
use tracing::debug;

use crate::config::UpstreamConfig;

use super::{Headers, Transport, TransportError, TransportResponse, TransportSession};

/// Production transport. Each session gets its own client and cookie store.
pub struct ReqwestTransport {
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(config: &UpstreamConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs as u64),
        }
    }
}

impl Transport for ReqwestTransport {
    fn name(&self) -> &str {
        "reqwest"
    }

    fn open_session(
        &self,
        proxy: Option<&str>,
    ) -> Result<Box<dyn TransportSession>, TransportError> {
        let mut builder = Client::builder().cookie_store(true).timeout(self.timeout);

        if let Some(url) = proxy {
            let proxy = Proxy::all(url).map_err(|e| TransportError::Setup(e.to_string()))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::Setup(e.to_string()))?;

        Ok(Box::new(ReqwestSession {
            client,
            proxied: proxy.is_some(),
        }))
    }
}

struct ReqwestSession {
    client: Client,
    proxied: bool,
}

impl ReqwestSession {
    async fn send(&self, request: RequestBuilder) -> Result<TransportResponse, TransportError> {
        let response = request
            .send()
            .await
            .map_err(|e| classify_error(&e, self.proxied))?;

        let status = response.status().as_u16();
        if self.proxied && status == 407 {
            return Err(TransportError::Proxy(
                "407 Proxy Authentication Required".to_string(),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_error(&e, self.proxied))?;

        debug!(status, bytes = body.len(), "Upstream response");
        Ok(TransportResponse { status, body })
    }
}

fn with_headers(mut request: RequestBuilder, headers: &Headers) -> RequestBuilder {
    for (name, value) in headers {
        request = request.header(name.as_str(), value.as_str());
    }
    request
}

#[async_trait]
impl TransportSession for ReqwestSession {
    async fn get(&self, url: &str, headers: &Headers) -> Result<TransportResponse, TransportError> {
        self.send(with_headers(self.client.get(url), headers)).await
    }

    async fn post_json(
        &self,
        url: &str,
        headers: &Headers,
        body: &serde_json::Value,
    ) -> Result<TransportResponse, TransportError> {
        self.send(with_headers(self.client.post(url), headers).json(body))
            .await
    }
}

/// Map a reqwest failure, singling out proxy refusals when a proxy is in use.
fn classify_error(e: &reqwest::Error, proxied: bool) -> TransportError {
    if e.is_timeout() {
        return TransportError::Timeout;
    }

    let mut chain = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }

    if proxied && looks_like_proxy_failure(&chain) {
        TransportError::Proxy(chain)
    } else if e.is_connect() {
        TransportError::Connection(chain)
    } else {
        TransportError::Request(chain)
    }
}

fn looks_like_proxy_failure(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("proxy") || message.contains("tunnel") || message.contains("407")
}
