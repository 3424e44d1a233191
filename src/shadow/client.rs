//! Outbound transport for shadow calls.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, Method, StatusCode};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use url::Url;

use crate::error::ShadowCallError;
use crate::server::HttpClient;

#[derive(Debug, Clone)]
pub struct ShadowRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

// async_trait keeps the client object-safe; the dispatcher holds Arc<dyn ShadowClient>.
#[async_trait]
pub trait ShadowClient: Send + Sync {
    /// Send one shadow request. The response body is drained and dropped.
    async fn send(&self, request: ShadowRequest) -> Result<StatusCode, ShadowCallError>;
}

pub struct HyperShadowClient {
    client: HttpClient,
    read_timeout: Duration,
}

impl HyperShadowClient {
    #[must_use]
    pub const fn new(client: HttpClient, read_timeout: Duration) -> Self {
        Self {
            client,
            read_timeout,
        }
    }
}

#[async_trait]
impl ShadowClient for HyperShadowClient {
    async fn send(&self, request: ShadowRequest) -> Result<StatusCode, ShadowCallError> {
        let mut builder = hyper::Request::builder()
            .method(request.method)
            .uri(request.url.as_str());
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        let body = request.body.map(Bytes::from).unwrap_or_default();
        let req = builder.body(Full::new(body))?;

        let exchange = async {
            let response = self.client.request(req).await?;
            let status = response.status();
            response.into_body().collect().await?;
            Ok::<_, ShadowCallError>(status)
        };

        tokio::time::timeout(self.read_timeout, exchange)
            .await
            .map_err(|_| ShadowCallError::Timeout(self.read_timeout))?
    }
}
