//! MangaDex client (api.mangadex.org).
//!
//! Authenticates with the OAuth2 password grant, refreshes once on a 401 and
//! retries throttled requests through the shared retry loop.

use super::{Credential, MangaRecord, SourceCatalog, StatusTable};
use crate::config::MangaDexConfig;
use crate::error::ApiError;
use crate::http::{ApiRequest, ApiResponse, Transport, send_with_retry};
use crate::rate_limit::RateGovernor;
use crate::retry::{RetryPolicy, Sleeper};
use crate::status::FollowStatus;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

/// Maximum ids per `/manga` request.
pub const BATCH_SIZE: usize = 100;

/// Ratings requested unless the caller narrows them.
const DEFAULT_CONTENT_RATINGS: [&str; 3] = ["safe", "suggestive", "erotica"];

const CONTENT_RATINGS: [&str; 4] = ["safe", "suggestive", "erotica", "pornographic"];

const ORDER_FIELDS: [&str; 6] = [
    "createdAt",
    "updatedAt",
    "publishAt",
    "readableAt",
    "volume",
    "chapter",
];

/// Timestamp format accepted by the `*Since` feed filters.
const SINCE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

static LANGUAGE_CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z-]{2,5}$").expect("Invalid LANGUAGE_CODE_REGEX"));

static UUID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("Invalid UUID_REGEX")
});

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

impl From<TokenResponse> for Credential {
    fn from(token: TokenResponse) -> Self {
        Self {
            access_token: token.access_token,
            token_type: token.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_in: token.expires_in,
            refresh_token: token.refresh_token,
        }
    }
}

/// `/manga/status` response.
#[derive(Debug, Deserialize)]
struct StatusResponse {
    statuses: StatusTable,
}

/// `/manga` response.
#[derive(Debug, Deserialize)]
struct MangaListResponse {
    #[serde(default)]
    data: Vec<MangaData>,
}

#[derive(Debug, Deserialize)]
struct MangaData {
    id: String,
    #[serde(default)]
    attributes: MangaAttributes,
}

#[derive(Debug, Default, Deserialize)]
struct MangaAttributes {
    #[serde(default)]
    title: serde_json::Map<String, serde_json::Value>,
}

impl From<MangaData> for MangaRecord {
    fn from(manga: MangaData) -> Self {
        let titles = manga
            .attributes
            .title
            .into_iter()
            .filter_map(|(locale, title)| title.as_str().map(|t| (locale, t.to_string())))
            .collect();
        Self {
            id: manga.id,
            titles,
        }
    }
}

/// Sort direction for feed ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Filters for the followed-manga chapter feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedParameters {
    /// Page size, 1 to 500.
    pub limit: u32,
    pub offset: u32,
    pub translated_language: Vec<String>,
    pub original_language: Vec<String>,
    pub excluded_original_language: Vec<String>,
    pub content_rating: Vec<String>,
    pub excluded_groups: Vec<String>,
    pub excluded_uploaders: Vec<String>,
    pub include_future_updates: bool,
    /// `YYYY-MM-DDTHH:MM:SS`
    pub created_at_since: Option<String>,
    pub updated_at_since: Option<String>,
    pub publish_at_since: Option<String>,
    /// Field name (e.g. `chapter`) and direction, flattened to `order[field]`.
    pub order: Vec<(String, SortOrder)>,
    pub includes: Vec<String>,
}

impl Default for FeedParameters {
    fn default() -> Self {
        Self {
            limit: 100,
            offset: 0,
            translated_language: Vec::new(),
            original_language: Vec::new(),
            excluded_original_language: Vec::new(),
            content_rating: DEFAULT_CONTENT_RATINGS.iter().map(|r| r.to_string()).collect(),
            excluded_groups: Vec::new(),
            excluded_uploaders: Vec::new(),
            include_future_updates: true,
            created_at_since: None,
            updated_at_since: None,
            publish_at_since: None,
            order: Vec::new(),
            includes: Vec::new(),
        }
    }
}

impl FeedParameters {
    /// Checks every field the API would reject.
    pub fn validate(&self) -> Result<(), ApiError> {
        if !(1..=500).contains(&self.limit) {
            return Err(ApiError::Validation(format!(
                "limit must be between 1 and 500, got {}",
                self.limit
            )));
        }

        for code in self
            .translated_language
            .iter()
            .chain(&self.original_language)
            .chain(&self.excluded_original_language)
        {
            if !LANGUAGE_CODE_REGEX.is_match(code) || !code.chars().any(|c| c.is_ascii_alphabetic())
            {
                return Err(ApiError::Validation(format!("Invalid language code: {}", code)));
            }
        }

        for id in self.excluded_groups.iter().chain(&self.excluded_uploaders) {
            if !UUID_REGEX.is_match(id) {
                return Err(ApiError::Validation(format!("Invalid UUID: {}", id)));
            }
        }

        for since in [
            &self.created_at_since,
            &self.updated_at_since,
            &self.publish_at_since,
        ]
        .into_iter()
        .flatten()
        {
            if NaiveDateTime::parse_from_str(since, SINCE_FORMAT).is_err() {
                return Err(ApiError::Validation(format!(
                    "Invalid datetime format: {}. Expected format: YYYY-MM-DDTHH:MM:SS",
                    since
                )));
            }
        }

        if let Some(rating) = self
            .content_rating
            .iter()
            .find(|r| !CONTENT_RATINGS.contains(&r.as_str()))
        {
            return Err(ApiError::Validation(format!("Invalid content rating: {}", rating)));
        }

        if let Some((field, _)) = self
            .order
            .iter()
            .find(|(field, _)| !ORDER_FIELDS.contains(&field.as_str()))
        {
            return Err(ApiError::Validation(format!("Invalid order field: {}", field)));
        }

        Ok(())
    }

    /// Flattens the parameters into query pairs.
    fn apply(&self, mut request: ApiRequest) -> ApiRequest {
        request = request
            .query("limit", self.limit.to_string())
            .query("offset", self.offset.to_string())
            .query(
                "includeFutureUpdates",
                if self.include_future_updates { "1" } else { "0" },
            );

        let lists = [
            ("translatedLanguage[]", &self.translated_language),
            ("originalLanguage[]", &self.original_language),
            ("excludedOriginalLanguage[]", &self.excluded_original_language),
            ("contentRating[]", &self.content_rating),
            ("excludedGroups[]", &self.excluded_groups),
            ("excludedUploaders[]", &self.excluded_uploaders),
            ("includes[]", &self.includes),
        ];
        for (key, values) in lists {
            for value in values {
                request = request.query(key, value.clone());
            }
        }

        for (key, value) in [
            ("createdAtSince", &self.created_at_since),
            ("updatedAtSince", &self.updated_at_since),
            ("publishAtSince", &self.publish_at_since),
        ] {
            if let Some(value) = value {
                request = request.query(key, value.clone());
            }
        }

        for (field, direction) in &self.order {
            request = request.query(&format!("order[{}]", field), direction.as_str());
        }

        request
    }
}

/// One page of the chapter feed.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedPage {
    #[serde(default)]
    pub data: Vec<FeedChapter>,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub total: u32,
}

/// A chapter in the feed.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedChapter {
    pub id: String,
    #[serde(default)]
    pub attributes: ChapterAttributes,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterAttributes {
    pub volume: Option<String>,
    pub chapter: Option<String>,
    pub title: Option<String>,
    pub translated_language: Option<String>,
}

/// MangaDex API client.
pub struct MangaDexClient {
    config: MangaDexConfig,
    transport: Arc<dyn Transport>,
    governor: RateGovernor,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    credential: Option<Credential>,
}

impl MangaDexClient {
    pub fn new(
        config: MangaDexConfig,
        transport: Arc<dyn Transport>,
        policy: RetryPolicy,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        let governor = RateGovernor::new("mangadex", &config.rate_limit, sleeper.clone());
        Self {
            config,
            transport,
            governor,
            policy,
            sleeper,
            credential: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }

    /// Logs in with the password grant.
    pub async fn login(&mut self) -> Result<(), ApiError> {
        info!(username = %self.config.username, "logging in to MangaDex");
        let config = &self.config;
        let request = ApiRequest::post(config.auth_url.clone()).form(&[
            ("grant_type", "password"),
            ("username", config.username.as_str()),
            ("password", config.password.as_str()),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
        ]);
        self.credential = Some(self.request_token(&request).await?);
        Ok(())
    }

    /// Exchanges the refresh token for a fresh token pair.
    pub async fn refresh(&mut self) -> Result<(), ApiError> {
        let refresh_token = self
            .credential
            .as_ref()
            .and_then(|c| c.refresh_token.clone())
            .ok_or_else(|| ApiError::Auth("no MangaDex token available to refresh".to_string()))?;

        debug!("refreshing MangaDex token");
        let config = &self.config;
        let request = ApiRequest::post(config.auth_url.clone()).form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
        ]);
        let mut credential = self.request_token(&request).await?;
        if credential.refresh_token.is_none() {
            credential.refresh_token = Some(refresh_token);
        }
        self.credential = Some(credential);
        Ok(())
    }

    async fn request_token(&mut self, request: &ApiRequest) -> Result<Credential, ApiError> {
        let response = self.send(request).await.map_err(|e| match e {
            ApiError::Http { status, body } => ApiError::Auth(format!("HTTP {}: {}", status, body)),
            other => other,
        })?;
        let token: TokenResponse = response.json()?;
        Ok(token.into())
    }

    async fn send(&mut self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        send_with_retry(
            self.transport.as_ref(),
            &mut self.governor,
            &self.policy,
            self.sleeper.as_ref(),
            request,
        )
        .await
    }

    fn authorization(&self) -> Option<String> {
        self.credential.as_ref().map(Credential::header_value)
    }

    /// Sends an authenticated request, logging in first if needed and
    /// refreshing once if the token is rejected.
    async fn execute(&mut self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        if self.credential.is_none() {
            self.login().await?;
        }

        let first = request.clone().authorization(self.authorization());
        match self.send(&first).await {
            Err(ApiError::Http { status: 401, .. }) => {
                warn!("MangaDex token rejected, refreshing and retrying once");
                self.refresh().await?;
                let retry = request.authorization(self.authorization());
                self.send(&retry).await.map_err(|e| match e {
                    ApiError::Http { status: 401, body } => {
                        ApiError::Auth(format!("token rejected after refresh: {}", body))
                    }
                    other => other,
                })
            }
            other => other,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url.trim_end_matches('/'), path)
    }

    /// Fetches one page of the followed-manga chapter feed.
    pub async fn fetch_follow_feed(&mut self, params: &FeedParameters) -> Result<FeedPage, ApiError> {
        params.validate()?;
        let request = params.apply(ApiRequest::get(self.url("/user/follows/manga/feed")));
        self.execute(request).await?.json()
    }
}

#[async_trait]
impl SourceCatalog for MangaDexClient {
    fn max_batch(&self) -> usize {
        BATCH_SIZE
    }

    async fn fetch_follow_statuses(
        &mut self,
        filter: Option<FollowStatus>,
    ) -> Result<StatusTable, ApiError> {
        let mut request = ApiRequest::get(self.url("/manga/status"));
        if let Some(status) = filter {
            request = request.query("status", status.as_str());
        }

        let response: StatusResponse = self.execute(request).await?.json()?;
        info!(count = response.statuses.len(), "fetched MangaDex follow statuses");
        Ok(response.statuses)
    }

    async fn fetch_batch(&mut self, ids: &[String]) -> Result<Vec<MangaRecord>, ApiError> {
        if ids.len() > BATCH_SIZE {
            return Err(ApiError::Validation(format!(
                "Too many manga IDs ({}). Maximum is {}",
                ids.len(),
                BATCH_SIZE
            )));
        }
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = ApiRequest::get(self.url("/manga"));
        for id in ids {
            request = request.query("ids[]", id.clone());
        }
        request = request.query("includes[]", "manga");
        for rating in DEFAULT_CONTENT_RATINGS {
            request = request.query("contentRating[]", rating);
        }
        request = request.query("limit", BATCH_SIZE.to_string());

        let response: MangaListResponse = self.execute(request).await?.json()?;
        debug!(requested = ids.len(), returned = response.data.len(), "fetched manga batch");
        Ok(response.data.into_iter().map(MangaRecord::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::RequestBody;
    use crate::http::testing::ScriptedTransport;
    use crate::rate_limit::REMAINING_HEADER;
    use crate::retry::RecordingSleeper;
    use reqwest::StatusCode;
    use reqwest::header::HeaderValue;
    use std::time::Duration;

    const TOKEN: &str = r#"{"access_token":"tok-1","refresh_token":"ref-1","token_type":"Bearer","expires_in":900}"#;
    const TOKEN_2: &str = r#"{"access_token":"tok-2","refresh_token":"ref-2","token_type":"Bearer","expires_in":900}"#;

    fn client(transport: &ScriptedTransport, sleeper: &RecordingSleeper) -> MangaDexClient {
        let mut config = MangaDexConfig::default();
        config.username = "reader".to_string();
        config.password = "pw".to_string();
        MangaDexClient::new(
            config,
            Arc::new(transport.clone()),
            RetryPolicy::new(3, Duration::from_secs(60)),
            Arc::new(sleeper.clone()),
        )
    }

    fn form_value(request: &ApiRequest, key: &str) -> Option<String> {
        match &request.body {
            RequestBody::Form(pairs) => pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone()),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_login_then_fetch_statuses() {
        let transport = ScriptedTransport::new();
        transport
            .push(200, TOKEN)
            .push(200, r#"{"result":"ok","statuses":{"m1":"reading","m2":"on_hold"}}"#);
        let sleeper = RecordingSleeper::new();
        let mut md = client(&transport, &sleeper);

        let table = md.fetch_follow_statuses(None).await.unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table["m2"], FollowStatus::OnHold);

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(form_value(&requests[0], "grant_type").as_deref(), Some("password"));
        assert_eq!(form_value(&requests[0], "username").as_deref(), Some("reader"));
        assert!(requests[1].url.ends_with("/manga/status"));
        assert_eq!(requests[1].authorization.as_deref(), Some("Bearer tok-1"));
    }

    #[tokio::test]
    async fn test_status_filter_is_sent() {
        let transport = ScriptedTransport::new();
        transport
            .push(200, TOKEN)
            .push(200, r#"{"result":"ok","statuses":{"m1":"dropped"}}"#);
        let sleeper = RecordingSleeper::new();
        let mut md = client(&transport, &sleeper);

        md.fetch_follow_statuses(Some(FollowStatus::Dropped)).await.unwrap();

        assert_eq!(transport.requests()[1].query_value("status"), Some("dropped"));
    }

    #[tokio::test]
    async fn test_unauthorized_refreshes_once() {
        let transport = ScriptedTransport::new();
        transport
            .push(200, TOKEN)
            .push(401, "expired")
            .push(200, TOKEN_2)
            .push(200, r#"{"result":"ok","statuses":{}}"#);
        let sleeper = RecordingSleeper::new();
        let mut md = client(&transport, &sleeper);

        md.fetch_follow_statuses(None).await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 4);
        assert_eq!(form_value(&requests[2], "grant_type").as_deref(), Some("refresh_token"));
        assert_eq!(form_value(&requests[2], "refresh_token").as_deref(), Some("ref-1"));
        assert_eq!(requests[3].authorization.as_deref(), Some("Bearer tok-2"));
    }

    #[tokio::test]
    async fn test_unauthorized_after_refresh_is_auth_error() {
        let transport = ScriptedTransport::new();
        transport
            .push(200, TOKEN)
            .push(401, "expired")
            .push(200, TOKEN_2)
            .push(401, "still expired");
        let sleeper = RecordingSleeper::new();
        let mut md = client(&transport, &sleeper);

        let err = md.fetch_follow_statuses(None).await.unwrap_err();
        assert!(matches!(err, ApiError::Auth(_)));
        assert_eq!(transport.requests().len(), 4);
    }

    #[tokio::test]
    async fn test_login_failure() {
        let transport = ScriptedTransport::new();
        transport.push(401, r#"{"error":"invalid_grant"}"#);
        let sleeper = RecordingSleeper::new();
        let mut md = client(&transport, &sleeper);

        let err = md.login().await.unwrap_err();
        assert!(matches!(err, ApiError::Auth(ref msg) if msg.contains("invalid_grant")));
        assert!(!md.is_authenticated());
    }

    #[tokio::test]
    async fn test_refresh_without_credential() {
        let transport = ScriptedTransport::new();
        let sleeper = RecordingSleeper::new();
        let mut md = client(&transport, &sleeper);

        assert!(matches!(md.refresh().await, Err(ApiError::Auth(_))));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_batch_too_large_is_rejected_before_network() {
        let transport = ScriptedTransport::new();
        let sleeper = RecordingSleeper::new();
        let mut md = client(&transport, &sleeper);
        let ids: Vec<String> = (0..101).map(|i| format!("m{}", i)).collect();

        let err = md.fetch_batch(&ids).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_batch_parses_titles_in_order() {
        let transport = ScriptedTransport::new();
        transport.push(200, TOKEN).push(
            200,
            r#"{"result":"ok","data":[
                {"id":"m1","type":"manga","attributes":{"title":{"ja-ro":"Fuu","en":"Foo"}}},
                {"id":"m2","type":"manga","attributes":{"title":{}}}
            ]}"#,
        );
        let sleeper = RecordingSleeper::new();
        let mut md = client(&transport, &sleeper);

        let records = md
            .fetch_batch(&["m1".to_string(), "m2".to_string()])
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].titles,
            vec![
                ("ja-ro".to_string(), "Fuu".to_string()),
                ("en".to_string(), "Foo".to_string())
            ]
        );
        assert!(records[1].titles.is_empty());

        let request = &transport.requests()[1];
        let ids: Vec<&str> = request
            .query
            .iter()
            .filter(|(k, _)| k == "ids[]")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(ids, vec!["m1", "m2"]);
        assert_eq!(request.query_value("limit"), Some("100"));
    }

    #[tokio::test]
    async fn test_batch_retries_after_throttle() {
        let transport = ScriptedTransport::new();
        transport
            .push(200, TOKEN)
            .push(429, "")
            .push(200, r#"{"data":[{"id":"m1","attributes":{"title":{"en":"A"}}}]}"#);
        let sleeper = RecordingSleeper::new();
        let mut md = client(&transport, &sleeper);

        let records = md.fetch_batch(&["m1".to_string()]).await.unwrap();

        assert_eq!(records[0].titles[0].1, "A");
        assert_eq!(sleeper.waits(), vec![Duration::from_secs(60)]);
    }

    #[tokio::test]
    async fn test_low_remaining_quota_delays_next_request() {
        let transport = ScriptedTransport::new();
        let mut token = ApiResponse::new(StatusCode::OK, TOKEN);
        token
            .headers
            .insert(REMAINING_HEADER, HeaderValue::from_static("5"));
        transport
            .push_response(token)
            .push(200, r#"{"result":"ok","statuses":{"m1":"reading"}}"#);
        let sleeper = RecordingSleeper::new();
        let mut md = client(&transport, &sleeper);

        md.fetch_follow_statuses(None).await.unwrap();

        let waits = sleeper.waits();
        assert_eq!(waits.len(), 1);
        assert!(waits[0] > Duration::from_secs(59));
        assert!(waits[0] <= Duration::from_secs(60));
        assert_eq!(transport.requests().len(), 2);
    }

    #[test]
    fn test_feed_parameter_validation() {
        assert!(FeedParameters::default().validate().is_ok());

        let mut params = FeedParameters::default();
        params.translated_language = vec!["en".to_string(), "pt-br".to_string()];
        assert!(params.validate().is_ok());

        params.translated_language = vec!["english".to_string()];
        assert!(matches!(params.validate(), Err(ApiError::Validation(_))));

        let mut params = FeedParameters::default();
        params.excluded_groups = vec!["1234".to_string()];
        assert!(params.validate().is_err());

        let mut params = FeedParameters::default();
        params.updated_at_since = Some("2024-01-01".to_string());
        assert!(params.validate().is_err());
        params.updated_at_since = Some("2024-01-01T10:30:00".to_string());
        assert!(params.validate().is_ok());

        let mut params = FeedParameters::default();
        params.limit = 501;
        assert!(params.validate().is_err());

        let mut params = FeedParameters::default();
        params.order = vec![("title".to_string(), SortOrder::Asc)];
        assert!(params.validate().is_err());
    }

    #[tokio::test]
    async fn test_invalid_feed_parameters_skip_network() {
        let transport = ScriptedTransport::new();
        let sleeper = RecordingSleeper::new();
        let mut md = client(&transport, &sleeper);

        let mut params = FeedParameters::default();
        params.excluded_uploaders = vec!["not-a-uuid".to_string()];

        assert!(md.fetch_follow_feed(&params).await.is_err());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_feed_query_flattening() {
        let transport = ScriptedTransport::new();
        transport.push(200, TOKEN).push(
            200,
            r#"{"data":[{"id":"c1","attributes":{"chapter":"12","translatedLanguage":"en"}}],"limit":10,"offset":0,"total":1}"#,
        );
        let sleeper = RecordingSleeper::new();
        let mut md = client(&transport, &sleeper);

        let mut params = FeedParameters::default();
        params.limit = 10;
        params.order = vec![("chapter".to_string(), SortOrder::Desc)];
        params.translated_language = vec!["en".to_string()];

        let page = md.fetch_follow_feed(&params).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].attributes.chapter.as_deref(), Some("12"));

        let request = &transport.requests()[1];
        assert!(request.url.ends_with("/user/follows/manga/feed"));
        assert_eq!(request.query_value("order[chapter]"), Some("desc"));
        assert_eq!(request.query_value("translatedLanguage[]"), Some("en"));
        assert_eq!(request.query_value("includeFutureUpdates"), Some("1"));
    }
}
