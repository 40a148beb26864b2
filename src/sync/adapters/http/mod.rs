//! HTTP adapters for the collaboration backend and the GitHub REST API.
//!
//! Both clients send JSON with a bearer token and map every non-2xx answer
//! to a [`RemoteError`] carrying the server's `message` field when one is
//! present.

mod backend;
mod github;

pub use backend::{BackendClient, DEFAULT_WEBHOOK_EVENTS, RepositorySummary, WebhookConfig};
pub use github::{DEFAULT_GITHUB_API, GitHubRestGateway};

use crate::sync::ports::{RemoteError, RemoteResult};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

const CLIENT_USER_AGENT: &str = concat!("boardsync/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

fn build_client(
    token: &str,
    accept: &'static str,
    timeout: Duration,
) -> RemoteResult<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static(accept));
    let bearer = format!("Bearer {}", token.trim());
    let mut auth = HeaderValue::from_str(&bearer)
        .map_err(|err| RemoteError::Transport(format!("invalid authorization header: {err}")))?;
    auth.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth);

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(|err| RemoteError::Transport(format!("failed to build http client: {err}")))
}

fn transport(operation: &str, err: &reqwest::Error) -> RemoteError {
    RemoteError::Transport(format!("{operation}: {err}"))
}

/// Turns a non-success response into a [`RemoteError`].
async fn into_error(operation: &str, response: Response) -> RemoteError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = extract_message(&text)
        .unwrap_or_else(|| format!("{operation} failed with status {}", status.as_u16()));
    if status == StatusCode::NOT_FOUND {
        return RemoteError::NotFound(message);
    }
    RemoteError::Rejected {
        status: status.as_u16(),
        message,
    }
}

fn extract_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.message)
        .map(|message| message.trim().to_owned())
        .filter(|message| !message.is_empty())
}

async fn ensure_success(operation: &str, response: Response) -> RemoteResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    Err(into_error(operation, response).await)
}

async fn read_json<T: DeserializeOwned>(operation: &str, response: Response) -> RemoteResult<T> {
    let ok = ensure_success(operation, response).await?;
    ok.json::<T>()
        .await
        .map_err(|err| RemoteError::Transport(format!("{operation}: invalid response body: {err}")))
}

/// Like [`read_json`] but maps 404 to `None`.
async fn read_optional_json<T: DeserializeOwned>(
    operation: &str,
    response: Response,
) -> RemoteResult<Option<T>> {
    if response.status() == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    read_json(operation, response).await.map(Some)
}
