//! AniList client (graphql.anilist.co).
//!
//! Logs in with the implicit grant through the browser and a local redirect
//! listener, then searches and writes list entries over GraphQL.

use super::browser::{BrowserLauncher, SystemBrowser};
use super::callback::CallbackListener;
use super::{Candidate, Credential, DestinationCatalog};
use crate::config::AniListConfig;
use crate::error::ApiError;
use crate::http::{ApiRequest, Transport, send_with_retry};
use crate::rate_limit::RateGovernor;
use crate::retry::{RetryPolicy, Sleeper};
use crate::status::ListStatus;
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const SEARCH_QUERY: &str = r#"
query ($search: String) {
    Page {
        media(search: $search, type: MANGA) {
            id
            title {
                romaji
                english
            }
        }
    }
}
"#;

const SAVE_ENTRY_MUTATION: &str = r#"
mutation ($mediaId: Int, $status: MediaListStatus) {
    SaveMediaListEntry(mediaId: $mediaId, status: $status) {
        id
        status
    }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    #[serde(rename = "Page")]
    page: Option<SearchPage>,
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    media: Option<Vec<Media>>,
}

#[derive(Debug, Deserialize)]
struct Media {
    id: u64,
    #[serde(default)]
    title: MediaTitle,
}

#[derive(Debug, Default, Deserialize)]
struct MediaTitle {
    romaji: Option<String>,
    english: Option<String>,
}

impl From<Media> for Candidate {
    fn from(media: Media) -> Self {
        Self {
            id: media.id,
            romaji_title: media.title.romaji,
            english_title: media.title.english,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SaveData {
    #[serde(rename = "SaveMediaListEntry")]
    entry: Option<SavedEntry>,
}

#[derive(Debug, Deserialize)]
struct SavedEntry {
    id: u64,
    status: Option<ListStatus>,
}

/// AniList API client.
pub struct AniListClient {
    config: AniListConfig,
    transport: Arc<dyn Transport>,
    governor: RateGovernor,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    browser: Box<dyn BrowserLauncher>,
    login_timeout: Duration,
    credential: Option<Credential>,
}

impl AniListClient {
    pub fn new(
        config: AniListConfig,
        transport: Arc<dyn Transport>,
        policy: RetryPolicy,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        let governor = RateGovernor::new("anilist", &config.rate_limit, sleeper.clone());
        let login_timeout = Duration::from_secs(config.login_timeout_sec);
        Self {
            config,
            transport,
            governor,
            policy,
            sleeper,
            browser: Box::new(SystemBrowser),
            login_timeout,
            credential: None,
        }
    }

    /// Replaces the browser launcher used by `login`.
    pub fn with_browser(mut self, browser: Box<dyn BrowserLauncher>) -> Self {
        self.browser = browser;
        self
    }

    pub fn with_login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    /// Uses an already obtained token instead of the browser flow.
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }

    /// URL the user is sent to for authorization.
    pub fn authorize_url(&self) -> Result<String, ApiError> {
        url::Url::parse_with_params(
            &self.config.authorize_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("response_type", "token"),
            ],
        )
        .map(String::from)
        .map_err(|e| ApiError::Validation(format!("invalid authorize URL: {}", e)))
    }

    /// `host:port` the redirect listener binds to.
    fn listen_addr(&self) -> Result<String, ApiError> {
        let redirect = url::Url::parse(&self.config.redirect_uri)
            .map_err(|e| ApiError::Validation(format!("invalid redirect URI: {}", e)))?;
        let host = redirect
            .host_str()
            .ok_or_else(|| ApiError::Validation("redirect URI has no host".to_string()))?;
        let port = redirect.port_or_known_default().unwrap_or(80);
        Ok(format!("{}:{}", host, port))
    }

    /// Runs the implicit-grant flow: start the listener, open the browser,
    /// wait (bounded) for the token, tear the listener down.
    pub async fn login(&mut self) -> Result<(), ApiError> {
        let listener = CallbackListener::bind(&self.listen_addr()?).await?;
        let url = self.authorize_url()?;

        info!("opening browser for AniList authorization");
        if let Err(e) = self.browser.open(&url) {
            warn!("could not open a browser ({}); open this URL manually: {}", e, url);
        }

        let credential = listener.wait_for_token(self.login_timeout).await?;
        info!("AniList authorization received");
        self.credential = Some(credential);
        Ok(())
    }

    async fn graphql<T: DeserializeOwned>(
        &mut self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, ApiError> {
        let authorization = self
            .credential
            .as_ref()
            .map(Credential::header_value)
            .ok_or_else(|| ApiError::Auth("Not authenticated with AniList".to_string()))?;

        let request = ApiRequest::post(self.config.api_url.clone())
            .json(json!({ "query": query, "variables": variables }))
            .authorization(Some(authorization));

        let response = send_with_retry(
            self.transport.as_ref(),
            &mut self.governor,
            &self.policy,
            self.sleeper.as_ref(),
            &request,
        )
        .await
        .map_err(|e| match e {
            ApiError::Http { status: 401, body } => {
                ApiError::Auth(format!("AniList rejected the token: {}", body))
            }
            other => other,
        })?;

        let envelope: GraphqlResponse<T> = response.json()?;
        if !envelope.errors.is_empty() {
            let messages: Vec<&str> = envelope.errors.iter().map(|e| e.message.as_str()).collect();
            return Err(ApiError::UnexpectedResponse(messages.join("; ")));
        }
        envelope
            .data
            .ok_or_else(|| ApiError::UnexpectedResponse("response has no data".to_string()))
    }
}

#[async_trait]
impl DestinationCatalog for AniListClient {
    async fn authenticate(&mut self) -> Result<(), ApiError> {
        if self.credential.is_none() {
            self.login().await?;
        }
        Ok(())
    }

    async fn search_by_title(&mut self, title: &str) -> Result<Vec<Candidate>, ApiError> {
        let data: SearchData = self
            .graphql(SEARCH_QUERY, json!({ "search": title }))
            .await?;

        let media = data
            .page
            .and_then(|page| page.media)
            .ok_or_else(|| ApiError::UnexpectedResponse("search response has no Page.media".to_string()))?;

        debug!(title, hits = media.len(), "AniList search");
        Ok(media.into_iter().map(Candidate::from).collect())
    }

    async fn upsert_list_entry(
        &mut self,
        destination_id: u64,
        status: ListStatus,
    ) -> Result<ListStatus, ApiError> {
        let data: SaveData = self
            .graphql(
                SAVE_ENTRY_MUTATION,
                json!({ "mediaId": destination_id, "status": status.as_str() }),
            )
            .await?;

        let entry = data
            .entry
            .ok_or_else(|| ApiError::UnexpectedResponse("SaveMediaListEntry returned null".to_string()))?;
        debug!(media_id = destination_id, entry_id = entry.id, "saved AniList entry");

        entry
            .status
            .ok_or_else(|| ApiError::UnexpectedResponse("saved entry has no status".to_string()))
    }
}
