//! Short-lived local listener that captures an implicit-grant token.
//!
//! The token arrives in the URL fragment, which browsers never send to a
//! server. `/` therefore serves a small relay page that re-submits the
//! fragment as a query string to `/callback`, where it is captured.

use super::Credential;
use crate::error::ApiError;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long to let the server drain after the token has been captured.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const RELAY_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>AniList Authorization</title>
</head>
<body>
    <h1>Processing authorization...</h1>
    <script>
        const fragment = window.location.hash.substring(1);
        const params = new URLSearchParams(fragment);
        fetch('/callback?' + params.toString())
            .then(response => response.text())
            .then(text => {
                document.body.innerHTML = text;
            })
            .catch(error => {
                document.body.innerHTML = 'Error: ' + error;
            });
    </script>
</body>
</html>
"#;

type Outcome = Result<Credential, String>;

#[derive(Clone)]
struct ListenerState {
    sender: Arc<Mutex<Option<oneshot::Sender<Outcome>>>>,
}

impl ListenerState {
    /// Delivers the first outcome; later ones are ignored.
    fn finish(&self, outcome: Outcome) {
        if let Ok(mut slot) = self.sender.lock()
            && let Some(sender) = slot.take()
        {
            let _ = sender.send(outcome);
        }
    }

    fn fail(&self, params: &HashMap<String, String>) -> Option<Response> {
        let error = params.get("error")?;
        let description = params
            .get("error_description")
            .map(String::as_str)
            .unwrap_or_default();
        let message = format!("{} - {}", error, description);
        self.finish(Err(message.clone()));
        Some((StatusCode::BAD_REQUEST, format!("Authorization failed: {}", message)).into_response())
    }
}

async fn relay_page(
    State(state): State<ListenerState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Some(failure) = state.fail(&params) {
        return failure;
    }
    Html(RELAY_PAGE).into_response()
}

async fn capture_token(
    State(state): State<ListenerState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Some(failure) = state.fail(&params) {
        return failure;
    }

    let Some(access_token) = params.get("access_token") else {
        return "Waiting for authorization... (no access token yet)".into_response();
    };

    state.finish(Ok(Credential {
        access_token: access_token.clone(),
        token_type: params
            .get("token_type")
            .cloned()
            .unwrap_or_else(|| "Bearer".to_string()),
        expires_in: params.get("expires_in").and_then(|v| v.parse().ok()),
        refresh_token: None,
    }));
    "Authorization successful! You can close this window.".into_response()
}

async fn unknown_path() -> Response {
    (StatusCode::BAD_REQUEST, "Authorization failed! Please try again.").into_response()
}

/// A running redirect listener.
pub struct CallbackListener {
    local_addr: SocketAddr,
    outcome: oneshot::Receiver<Outcome>,
    shutdown: oneshot::Sender<()>,
    server: JoinHandle<()>,
}

impl CallbackListener {
    /// Starts listening on `addr` (e.g. `localhost:8080`).
    pub async fn bind(addr: &str) -> Result<Self, ApiError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let (sender, outcome) = oneshot::channel();
        let (shutdown, shutdown_signal) = oneshot::channel::<()>();

        let state = ListenerState {
            sender: Arc::new(Mutex::new(Some(sender))),
        };
        let app = Router::new()
            .route("/", get(relay_page))
            .route("/callback", get(capture_token))
            .fallback(unknown_path)
            .with_state(state);

        let server = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_signal.await;
                })
                .await;
            if let Err(e) = result {
                warn!("login listener stopped with error: {}", e);
            }
        });

        info!("waiting for authorization on http://{}", local_addr);
        Ok(Self {
            local_addr,
            outcome,
            shutdown,
            server,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Blocks until a token or an error callback arrives, or `timeout`
    /// passes. The listener is torn down in every case.
    pub async fn wait_for_token(self, timeout: Duration) -> Result<Credential, ApiError> {
        let Self {
            outcome,
            shutdown,
            mut server,
            ..
        } = self;

        let result = tokio::time::timeout(timeout, outcome).await;

        let _ = shutdown.send(());
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await.is_err() {
            debug!("login listener did not drain in time, aborting");
            server.abort();
        }

        match result {
            Err(_) => Err(ApiError::Auth(format!(
                "timed out after {}s waiting for authorization",
                timeout.as_secs()
            ))),
            Ok(Err(_)) => Err(ApiError::Auth(
                "login listener closed before a token arrived".to_string(),
            )),
            Ok(Ok(Err(message))) => Err(ApiError::Auth(message)),
            Ok(Ok(Ok(credential))) => Ok(credential),
        }
    }
}
