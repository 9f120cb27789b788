//! HTTP plumbing shared by both catalog clients.
//!
//! Requests are described as plain data ([`ApiRequest`]) and sent through a
//! [`Transport`], which keeps the retry and rate-limit logic independent of
//! the network so it can be exercised with canned responses.

use crate::error::ApiError;
use crate::rate_limit::RateGovernor;
use crate::retry::{RetryPolicy, Sleeper};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// Body of an outbound request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Form(Vec<(String, String)>),
    Json(serde_json::Value),
}

/// Description of one HTTP request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    /// Query pairs; repeated keys are kept (e.g. `ids[]`).
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    /// Full `Authorization` header value, e.g. `Bearer abc`.
    pub authorization: Option<String>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
            authorization: None,
        }
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: Method::POST,
            ..Self::get(url)
        }
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn form(mut self, pairs: &[(&str, &str)]) -> Self {
        self.body = RequestBody::Form(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn authorization(mut self, value: Option<String>) -> Self {
        self.authorization = value;
        self
    }

    /// Returns the first query value for `key`.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body).map_err(|e| ApiError::UnexpectedResponse(e.to_string()))
    }
}

/// Sends requests somewhere and hands back the response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError>;
}

/// Real transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut url = url::Url::parse(&request.url)
            .map_err(|e| ApiError::Validation(format!("invalid URL {}: {}", request.url, e)))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }

        let mut builder = self.client.request(request.method.clone(), url);
        if let Some(value) = &request.authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Form(pairs) => {
                let encoded = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(pairs.iter())
                    .finish();
                builder
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(encoded)
            }
            RequestBody::Json(value) => builder.json(value),
        };

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

/// Converts a non-success response into an [`ApiError::Http`].
pub fn check_response_status(response: ApiResponse) -> Result<ApiResponse, ApiError> {
    if !response.status.is_success() {
        return Err(ApiError::Http {
            status: response.status.as_u16(),
            body: response.body,
        });
    }
    Ok(response)
}

/// Sends `request` through the governor, retrying throttled responses per
/// `policy`. Non-2xx responses other than 429 come back as
/// [`ApiError::Http`] without retrying.
pub async fn send_with_retry(
    transport: &dyn Transport,
    governor: &mut RateGovernor,
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    request: &ApiRequest,
) -> Result<ApiResponse, ApiError> {
    let mut attempt = 1;
    loop {
        governor.admit().await;
        debug!(method = %request.method, url = %request.url, attempt, "sending request");
        let response = transport.send(request).await?;
        governor.observe(&response.headers);

        if !policy.is_retryable(response.status.as_u16()) {
            return check_response_status(response);
        }

        match policy.backoff(attempt) {
            Some(delay) => {
                warn!(
                    url = %request.url,
                    "rate limit hit, waiting {}s before retry (attempt {}/{})",
                    delay.as_secs(),
                    attempt + 1,
                    policy.max_attempts
                );
                sleeper.sleep(delay).await;
                attempt += 1;
            }
            None => return Err(ApiError::RateLimitExceeded { attempts: attempt }),
        }
    }
}
