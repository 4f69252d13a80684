use crate::services::drive::DriveConfig;
use anyhow::{anyhow, bail, Context, Result};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use log::{debug, info};
use rand::distr::Alphanumeric;
use rand::Rng;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use url::Url;

pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

const CALLBACK_PAGE: &str = "<html><body><h3>Character Studio is connected to Google Drive.</h3>\
<p>You can close this tab.</p></body></html>";

/// How long the redirect server lingers to flush the browser's page.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

pub fn random_state() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

pub fn authorization_url(cfg: &DriveConfig, redirect_uri: &str, state: &str) -> Result<Url> {
    let mut url = Url::parse(&cfg.auth_url).context("Invalid OAuth auth_url")?;
    url.query_pairs_mut()
        .append_pair("client_id", &cfg.client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", DRIVE_SCOPE)
        .append_pair("state", state)
        .append_pair("access_type", "online");
    Ok(url)
}

/// Query parameters Google appends to the redirect.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

impl CallbackParams {
    /// Requests without any OAuth parameter (favicon, preconnects, reloads of `/`).
    fn is_empty(&self) -> bool {
        self.code.is_none() && self.state.is_none() && self.error.is_none()
    }
}

pub fn check_callback(params: &CallbackParams, expected_state: &str) -> Result<String> {
    if let Some(error) = &params.error {
        bail!("Authorization denied: {}", error);
    }
    if params.state.as_deref() != Some(expected_state) {
        bail!("OAuth state mismatch");
    }
    params
        .code
        .clone()
        .ok_or_else(|| anyhow!("OAuth callback without code"))
}

struct CallbackState {
    expected_state: String,
    outcome: Mutex<Option<oneshot::Sender<Result<String>>>>,
}

async fn callback(
    State(shared): State<Arc<CallbackState>>,
    Query(params): Query<CallbackParams>,
) -> (StatusCode, Html<String>) {
    if params.is_empty() {
        return (StatusCode::NOT_FOUND, Html(String::new()));
    }

    let outcome = check_callback(&params, &shared.expected_state);
    let page = match &outcome {
        Ok(_) => (StatusCode::OK, Html(CALLBACK_PAGE.to_string())),
        Err(e) => (StatusCode::BAD_REQUEST, Html(format!("<html><body>{}</body></html>", e))),
    };

    match shared.outcome.lock().await.take() {
        Some(sender) => {
            let _ = sender.send(outcome);
        }
        None => debug!("Ignoring repeated OAuth callback"),
    }
    page
}

/// Serves the loopback redirect until the first request carrying OAuth
/// parameters, and returns its authorization code.
pub async fn wait_for_callback(listener: TcpListener, expected_state: &str) -> Result<String> {
    let (sender, receiver) = oneshot::channel();
    let shared = Arc::new(CallbackState {
        expected_state: expected_state.to_string(),
        outcome: Mutex::new(Some(sender)),
    });
    let app = Router::new().route("/", get(callback)).with_state(shared);

    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stopped.await;
            })
            .await
    });

    let outcome = receiver
        .await
        .map_err(|_| anyhow!("OAuth redirect server stopped before the callback"));

    let _ = stop.send(());
    match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
        Ok(Ok(Err(e))) => debug!("OAuth redirect server error: {}", e),
        Err(_) => debug!("OAuth redirect server did not drain in time"),
        _ => {}
    }

    outcome?
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

pub async fn exchange_code(
    client: &reqwest::Client,
    cfg: &DriveConfig,
    code: &str,
    redirect_uri: &str,
) -> Result<String> {
    let mut form = url::form_urlencoded::Serializer::new(String::new());
    form.append_pair("code", code)
        .append_pair("client_id", &cfg.client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("grant_type", "authorization_code");
    if let Some(secret) = &cfg.client_secret {
        form.append_pair("client_secret", secret);
    }

    let resp = client
        .post(&cfg.token_url)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(form.finish())
        .send()
        .await
        .context("Failed to reach OAuth token endpoint")?;

    let status = resp.status();
    let text = resp.text().await?;
    let token: TokenResponse = serde_json::from_str(&text)
        .with_context(|| format!("Unexpected token response ({}): {}", status, text))?;

    if let Some(err) = token.error {
        let detail = token.error_description.unwrap_or_default();
        bail!("OAuth token error: {} {}", err, detail);
    }
    match token.access_token {
        Some(access) if status.is_success() => Ok(access),
        _ => Err(anyhow!("OAuth token endpoint returned {} without a token", status)),
    }
}

/// Full browser round trip: prints the consent URL, waits for the redirect and
/// trades the code for an access token.
pub async fn obtain_access_token(cfg: &DriveConfig) -> Result<String> {
    let listener = TcpListener::bind(("127.0.0.1", cfg.redirect_port))
        .await
        .context("Failed to open OAuth redirect listener")?;
    let redirect_uri = format!("http://127.0.0.1:{}", listener.local_addr()?.port());
    let state = random_state();

    let url = authorization_url(cfg, &redirect_uri, &state)?;
    println!("Open this URL in your browser to authorize Google Drive access:\n\n{}\n", url);

    let code = wait_for_callback(listener, &state).await?;
    let token = exchange_code(&reqwest::Client::new(), cfg, &code, &redirect_uri).await?;
    info!("Google Drive authorization complete");
    Ok(token)
}
