use std::time::Duration;

use client_logging::{client_debug, client_warn};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder};
use scrapeqa_core::{
    AskRequest, AskResponse, ClientError, RemoveUrlRequest, RemoveUrlResponse, ScrapeRequest,
    ScrapeResponse, UrlList,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Header carrying the session identifier on every call.
pub const SESSION_HEADER: &str = "X-User-ID";

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub api_base_url: String,
    pub connect_timeout: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000".to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// The retrieval backend. Every call honours `cancel` and attaches
/// `session_id` when one is known.
#[async_trait::async_trait]
pub trait RemoteService: Send + Sync {
    async fn scrape(
        &self,
        request: &ScrapeRequest,
        session_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ScrapeResponse, ClientError>;

    async fn ask(
        &self,
        request: &AskRequest,
        session_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<AskResponse, ClientError>;

    async fn list_urls(
        &self,
        session_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<UrlList, ClientError>;

    async fn remove_url(
        &self,
        request: &RemoveUrlRequest,
        session_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<RemoveUrlResponse, ClientError>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct ReqwestService {
    client: reqwest::Client,
    base: Url,
}

impl ReqwestService {
    pub fn new(settings: &ServiceSettings) -> Result<Self, ClientError> {
        let mut base = Url::parse(&settings.api_base_url).map_err(|err| {
            ClientError::Validation(format!("invalid api base url {}: {err}", settings.api_base_url))
        })?;
        // Endpoints are joined relative to the base path.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        // No overall request timeout: slow calls are reported, never cut off.
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|err| ClientError::Network(err.to_string()))?;

        Ok(Self { client, base })
    }

    fn request(&self, method: Method, endpoint: &str) -> Result<RequestBuilder, ClientError> {
        let url = self
            .base
            .join(endpoint)
            .map_err(|err| ClientError::Validation(format!("bad endpoint {endpoint}: {err}")))?;
        Ok(self.client.request(method, url))
    }

    async fn call<B, T>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
        session_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<T, ClientError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let mut builder = self.request(method.clone(), endpoint)?;
        if let Some(session_id) = session_id {
            builder = builder.header(SESSION_HEADER, session_id);
        }
        if let Some(body) = body {
            let encoded = serde_json::to_vec(body)
                .map_err(|err| ClientError::Validation(err.to_string()))?;
            builder = builder.header(CONTENT_TYPE, "application/json").body(encoded);
        }

        let exchange = async {
            let response = builder.send().await.map_err(map_reqwest_error)?;
            let status = response.status();
            let bytes = response.bytes().await.map_err(map_reqwest_error)?;
            if !status.is_success() {
                return Err(ClientError::Remote {
                    status: status.as_u16(),
                    detail: error_detail(&bytes),
                });
            }
            serde_json::from_slice::<T>(&bytes).map_err(|err| {
                client_warn!("{} {} returned an unreadable body: {}", method, endpoint, err);
                ClientError::Remote {
                    status: status.as_u16(),
                    detail: None,
                }
            })
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                client_debug!("{} {} cancelled", method, endpoint);
                Err(ClientError::Cancelled)
            }
            result = exchange => result,
        }
    }
}

#[async_trait::async_trait]
impl RemoteService for ReqwestService {
    async fn scrape(
        &self,
        request: &ScrapeRequest,
        session_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ScrapeResponse, ClientError> {
        if request.urls.is_empty() {
            return Err(ClientError::Validation("no URLs to scrape".to_string()));
        }
        self.call(Method::POST, "scrape", Some(request), session_id, cancel)
            .await
    }

    async fn ask(
        &self,
        request: &AskRequest,
        session_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<AskResponse, ClientError> {
        self.call(Method::POST, "ask", Some(request), session_id, cancel)
            .await
    }

    async fn list_urls(
        &self,
        session_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<UrlList, ClientError> {
        self.call::<(), _>(Method::GET, "urls", None, session_id, cancel)
            .await
    }

    async fn remove_url(
        &self,
        request: &RemoveUrlRequest,
        session_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<RemoveUrlResponse, ClientError> {
        self.call(Method::DELETE, "remove-url", Some(request), session_id, cancel)
            .await
    }
}

/// Server detail from an error body; non-string details are kept as JSON text.
fn error_detail(bytes: &[u8]) -> Option<String> {
    let body: ErrorBody = serde_json::from_slice(bytes).ok()?;
    match body.detail? {
        serde_json::Value::Null => None,
        serde_json::Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        return ClientError::Network(format!("timed out: {err}"));
    }
    if err.is_connect() {
        return ClientError::Network(format!("connection failed: {err}"));
    }
    ClientError::Network(err.to_string())
}
