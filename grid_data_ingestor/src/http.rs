//! Rate-limited HTTP client with fixed-backoff retries.
//!
//! Every adapter goes through [`HttpClient`]. Requests are issued one at a
//! time by the caller; the client adds a shared token bucket so bursts across
//! adapters stay under the configured rate, and retries timeouts, connection
//! failures, 429 and 5xx responses a fixed number of times.

use std::{sync::Arc, time::Duration};

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, RequestBuilder, header::HeaderMap};
use serde::{Serialize, de::DeserializeOwned};
use snafu::ResultExt;
use tracing::{debug, warn};

use crate::{
    config::HttpConfig,
    errors::UpstreamError,
    providers::{ClientBuildSnafu, ProviderInitError},
};

type Limiter = DefaultDirectRateLimiter;

/// Empty query string.
pub const NO_QUERY: &[(&str, &str)] = &[];

/// A fully read response body.
#[derive(Debug, Clone)]
pub struct Payload {
    /// URL that produced the body.
    pub url: String,
    /// `Content-Type` header, if any.
    pub content_type: Option<String>,
    /// Raw body.
    pub body: Vec<u8>,
}

impl Payload {
    /// Body as UTF-8 text; invalid sequences are replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body decoded as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, UpstreamError> {
        serde_json::from_slice(&self.body).map_err(|e| UpstreamError::Decode {
            url: self.url.clone(),
            message: e.to_string(),
        })
    }

    /// Fail unless the `Content-Type` contains `expected`.
    pub fn expect_content_type(&self, expected: &'static str) -> Result<(), UpstreamError> {
        match &self.content_type {
            Some(ct) if ct.contains(expected) => Ok(()),
            other => Err(UpstreamError::ContentType {
                url: self.url.clone(),
                expected,
                found: other.clone().unwrap_or_else(|| "no content type".into()),
            }),
        }
    }
}

/// Shared HTTP client. Cloning is cheap and clones share the rate limiter.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    limiter: Arc<Limiter>,
    max_attempts: u32,
    backoff: Duration,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Build a client from configuration.
    pub fn new(config: &HttpConfig) -> Result<Self, ProviderInitError> {
        Self::with_headers(config, HeaderMap::new())
    }

    /// Build a client that sends `headers` with every request.
    pub fn with_headers(config: &HttpConfig, headers: HeaderMap) -> Result<Self, ProviderInitError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .cookie_store(true)
            .default_headers(headers)
            .build()
            .context(ClientBuildSnafu)?;
        Ok(Self {
            client,
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(
                config.requests_per_second,
            ))),
            max_attempts: config.max_attempts.get(),
            backoff: config.backoff(),
        })
    }

    /// GET `url` with query parameters.
    pub async fn get<Q: Serialize + ?Sized>(
        &self,
        url: &str,
        query: &Q,
    ) -> Result<Payload, UpstreamError> {
        self.send(url, || self.client.get(url).query(query)).await
    }

    /// GET `url` with query parameters and extra headers.
    pub async fn get_with_headers<Q: Serialize + ?Sized>(
        &self,
        url: &str,
        query: &Q,
        headers: &HeaderMap,
    ) -> Result<Payload, UpstreamError> {
        self.send(url, || self.client.get(url).query(query).headers(headers.clone()))
            .await
    }

    /// GET `url` and decode the body as JSON.
    pub async fn get_json<T, Q>(&self, url: &str, query: &Q) -> Result<T, UpstreamError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.get(url, query).await?.json()
    }

    async fn send(
        &self,
        url: &str,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<Payload, UpstreamError> {
        let mut attempt = 1;
        loop {
            self.limiter.until_ready().await;
            debug!(url, attempt, "fetching");
            match self.attempt(url, build()).await {
                Ok(payload) => return Ok(payload),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    warn!(url, attempt, error = %e, backoff_ms = self.backoff.as_millis() as u64, "retrying");
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn attempt(&self, url: &str, request: RequestBuilder) -> Result<Payload, UpstreamError> {
        let request_err = |source| UpstreamError::Request {
            url: url.to_string(),
            source,
        };
        let response = request.send().await.map_err(request_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                url: response.url().to_string(),
                status: status.as_u16(),
            });
        }
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(request_err)?;
        Ok(Payload {
            url: final_url,
            content_type,
            body: body.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::{io::AsyncReadExt, io::AsyncWriteExt, net::TcpListener};

    /// Serves the given raw HTTP responses, one per connection, and counts them.
    async fn serve(responses: Vec<&'static str>) -> (String, tokio::task::JoinHandle<usize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let mut served = 0;
            for response in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = [0u8; 2048];
                let _ = socket.read(&mut buf).await.unwrap();
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
                served += 1;
            }
            served
        });
        (format!("http://{addr}/report.csv"), handle)
    }

    fn fast_config() -> HttpConfig {
        HttpConfig {
            backoff_ms: 1,
            requests_per_second: nonzero_ext::nonzero!(1000u32),
            ..HttpConfig::default()
        }
    }

    const OK: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/csv\r\nContent-Length: 3\r\nConnection: close\r\n\r\na,b";
    const UNAVAILABLE: &str = "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
    const NOT_FOUND: &str = "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

    #[tokio::test]
    async fn retries_server_errors_then_succeeds() {
        let (url, server) = serve(vec![UNAVAILABLE, UNAVAILABLE, OK]).await;
        let client = HttpClient::new(&fast_config()).unwrap();
        let payload = client.get(&url, &[("a", "1")]).await.unwrap();
        assert_eq!(payload.text(), "a,b");
        payload.expect_content_type("text/csv").unwrap();
        assert_eq!(server.await.unwrap(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let (url, server) = serve(vec![UNAVAILABLE, UNAVAILABLE, UNAVAILABLE]).await;
        let client = HttpClient::new(&fast_config()).unwrap();
        let err = client.get(&url, NO_QUERY).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Status { status: 503, .. }));
        assert_eq!(server.await.unwrap(), 3);
    }

    #[tokio::test]
    async fn does_not_retry_not_found() {
        let (url, server) = serve(vec![NOT_FOUND]).await;
        let client = HttpClient::new(&fast_config()).unwrap();
        let err = client.get(&url, NO_QUERY).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(server.await.unwrap(), 1);
    }
}
