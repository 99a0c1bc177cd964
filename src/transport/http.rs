// ABOUTME: reqwest-backed Transport implementation.
// ABOUTME: Performs one HTTP exchange per call and maps reqwest failures.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ExchangeRequest, ExchangeResponse, Transport};
use crate::error::TransportError;

/// Timeout applied to exchanges that do not set their own.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP transport over a shared `reqwest::Client`.
///
/// TLS, redirects and connection pooling are reqwest's business. After
/// [`shutdown`](Transport::shutdown) the client is dropped and every further
/// exchange fails with `TransportError::Closed`.
pub struct HttpTransport {
    http_client: RwLock<Option<reqwest::Client>>,
}

impl HttpTransport {
    /// Create a transport with the default timeout.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a transport whose exchanges time out after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("pacer/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self::from_client(http_client))
    }

    /// Wrap an already configured client.
    pub fn from_client(http_client: reqwest::Client) -> Self {
        Self {
            http_client: RwLock::new(Some(http_client)),
        }
    }

    /// Whether `shutdown` has been called.
    pub async fn is_closed(&self) -> bool {
        self.http_client.read().await.is_none()
    }

    async fn client(&self) -> Result<reqwest::Client, TransportError> {
        self.http_client
            .read()
            .await
            .clone()
            .ok_or(TransportError::Closed)
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport").finish_non_exhaustive()
    }
}

fn classify(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else {
        TransportError::Request(error.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn exchange(&self, request: &ExchangeRequest) -> Result<ExchangeResponse, TransportError> {
        let http_client = self.client().await?;
        let options = &request.options;

        let mut req_builder = http_client
            .request(request.method.clone(), &request.url)
            .headers(options.headers.clone());

        if !options.query.is_empty() {
            req_builder = req_builder.query(&options.query);
        }
        if let Some(json) = &options.json {
            req_builder = req_builder.json(json);
        } else if let Some(body) = &options.body {
            req_builder = req_builder.body(body.clone());
        }
        if let Some(timeout) = options.timeout {
            req_builder = req_builder.timeout(timeout);
        }

        let response = req_builder.send().await.map_err(classify)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(classify)?;

        Ok(ExchangeResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }

    async fn shutdown(&self) -> Result<(), TransportError> {
        // Dropping the client releases its connection pool.
        self.http_client.write().await.take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use reqwest::header::{HeaderName, HeaderValue, RETRY_AFTER};
    use serde_json::{Value, json};
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::transport::{Method, RequestOptions, StatusCode};

    fn get(url: String) -> ExchangeRequest {
        ExchangeRequest::new(Method::GET, url, RequestOptions::new())
    }

    #[tokio::test]
    async fn test_exchange_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [1, 2]})))
            .mount(&server)
            .await;

        let transport = HttpTransport::new().unwrap();
        let response = transport
            .exchange(&get(format!("{}/data", server.uri())))
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.json::<Value>().unwrap(), json!({"items": [1, 2]}));
    }

    #[tokio::test]
    async fn test_error_statuses_are_responses() {
        let server = MockServer::start().await;
        Mock::given(path("/limited"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "2"))
            .mount(&server)
            .await;

        let transport = HttpTransport::new().unwrap();
        let response = transport
            .exchange(&get(format!("{}/limited", server.uri())))
            .await
            .unwrap();

        assert!(response.is_rate_limited());
        assert_eq!(response.headers.get(RETRY_AFTER).unwrap(), "2");
        assert_eq!(response.retry_after(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_forwards_headers_query_and_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/items"))
            .and(query_param("page", "2"))
            .and(header("x-api-key", "secret"))
            .and(body_json(json!({"name": "widget"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1})))
            .mount(&server)
            .await;

        let options = RequestOptions::new()
            .header(
                HeaderName::from_static("x-api-key"),
                HeaderValue::from_static("secret"),
            )
            .query("page", "2")
            .json(json!({"name": "widget"}));
        let request = ExchangeRequest::new(Method::POST, format!("{}/items", server.uri()), options);

        let transport = HttpTransport::new().unwrap();
        let response = transport.exchange(&request).await.unwrap();
        assert_eq!(response.status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_per_request_timeout() {
        let server = MockServer::start().await;
        Mock::given(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let request = ExchangeRequest::new(
            Method::GET,
            format!("{}/slow", server.uri()),
            RequestOptions::new().timeout(Duration::from_millis(50)),
        );

        let transport = HttpTransport::new().unwrap();
        let result = transport.exchange(&request).await;
        assert_eq!(result.unwrap_err(), TransportError::Timeout);
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Bind then drop a listener to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpTransport::new().unwrap();
        let result = transport.exchange(&get(format!("http://{}/", addr))).await;
        assert!(matches!(result, Err(TransportError::Connect(_))));
    }

    #[tokio::test]
    async fn test_shutdown_closes_transport() {
        let server = MockServer::start().await;
        Mock::given(path("/data"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let transport = HttpTransport::new().unwrap();
        assert!(!transport.is_closed().await);

        transport.shutdown().await.unwrap();
        assert!(transport.is_closed().await);
        // Second shutdown is harmless.
        transport.shutdown().await.unwrap();

        let result = transport
            .exchange(&get(format!("{}/data", server.uri())))
            .await;
        assert_eq!(result.unwrap_err(), TransportError::Closed);
    }
}
