//! HTTP gateway for the task-tracker backend.
//!
//! Stateless request/response client: every operation intent becomes one
//! HTTP call and a typed result. The only state read is the current bearer
//! token, supplied through [`TokenSource`] and attached as an
//! `Authorization` header on every call except login/register.

use reqwest::{Client, RequestBuilder, StatusCode, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use taskrail_core::{
    ApiError, AuthSession, Credentials, FieldError, Task, TaskDraft, TaskFilter, TaskId, TaskPage,
    TaskPatch, User,
};

/// Supplier of the current bearer token.
///
/// The gateway never owns a credential; it asks this source on every call so
/// a token set after construction is picked up immediately.
pub trait TokenSource: Send + Sync {
    /// The current token, if a credential is stored.
    fn token(&self) -> Option<String>;
}

/// Raised when the configured base URL cannot be parsed.
#[derive(Debug, Error)]
#[error("invalid base URL '{url}': {reason}")]
pub struct InvalidBaseUrl {
    /// The rejected URL string.
    pub url: String,
    /// Parser message.
    pub reason: String,
}

/// HTTP client for the auth and task endpoints.
pub struct HttpGateway {
    client: Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
}

impl HttpGateway {
    /// Build a gateway against `base_url` (scheme + host + optional prefix).
    ///
    /// # Errors
    /// Returns [`InvalidBaseUrl`] when the URL does not parse.
    pub fn new(base_url: &str, tokens: Arc<dyn TokenSource>) -> Result<Self, InvalidBaseUrl> {
        let trimmed = base_url.trim_end_matches('/');
        reqwest::Url::parse(trimmed).map_err(|err| InvalidBaseUrl {
            url: base_url.to_owned(),
            reason: err.to_string(),
        })?;
        Ok(Self {
            client: Client::new(),
            base_url: trimmed.to_owned(),
            tokens,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.tokens.token() {
            Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {token}")),
            None => builder,
        }
    }

    /// Exchange credentials for a session token.
    ///
    /// # Errors
    /// Propagates the typed [`ApiError`] taxonomy; bad credentials surface as
    /// [`ApiError::Unauthorized`].
    pub async fn login(&self, credentials: &Credentials) -> Result<AuthSession, ApiError> {
        debug!(email = %credentials.email, "login");
        let builder = self.client.post(self.endpoint("auth/login")).json(credentials);
        send_json(builder).await
    }

    /// Create an account and receive a session token.
    ///
    /// # Errors
    /// A duplicate email surfaces as [`ApiError::Conflict`].
    pub async fn register(&self, credentials: &Credentials) -> Result<AuthSession, ApiError> {
        debug!(email = %credentials.email, "register");
        let builder = self
            .client
            .post(self.endpoint("auth/register"))
            .json(credentials);
        send_json(builder).await
    }

    /// Invalidate the session server-side.
    ///
    /// # Errors
    /// Propagates the typed [`ApiError`] taxonomy.
    pub async fn logout(&self) -> Result<(), ApiError> {
        debug!("logout");
        let builder = self.authorize(self.client.post(self.endpoint("auth/logout")));
        send_empty(builder).await
    }

    /// Fetch the account behind the current token.
    ///
    /// # Errors
    /// [`ApiError::Unauthorized`] when the token is absent or rejected.
    pub async fn current_user(&self) -> Result<User, ApiError> {
        let builder = self.authorize(self.client.get(self.endpoint("auth/me")));
        send_json(builder).await
    }

    /// List tasks matching the filter.
    ///
    /// # Errors
    /// Propagates the typed [`ApiError`] taxonomy.
    pub async fn list_tasks(&self, filter: &TaskFilter) -> Result<TaskPage, ApiError> {
        debug!(?filter, "list tasks");
        send_json(self.list_request(filter)).await
    }

    fn list_request(&self, filter: &TaskFilter) -> RequestBuilder {
        let mut builder = self.client.get(self.endpoint("tasks"));
        if !filter.is_empty() {
            builder = builder.query(&filter.query_pairs());
        }
        self.authorize(builder)
    }

    /// Create a task from a validated draft.
    ///
    /// # Errors
    /// Server-side rejections surface as [`ApiError::ValidationFailed`].
    pub async fn create_task(&self, draft: &TaskDraft) -> Result<Task, ApiError> {
        debug!(title = %draft.title, "create task");
        let builder = self.authorize(self.client.post(self.endpoint("tasks")).json(draft));
        send_json(builder).await
    }

    /// Apply a partial update to a task.
    ///
    /// # Errors
    /// [`ApiError::NotFound`] when the id is unknown.
    pub async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> Result<Task, ApiError> {
        debug!(%id, "update task");
        let builder = self.authorize(
            self.client
                .patch(self.endpoint(&format!("tasks/{id}")))
                .json(patch),
        );
        send_json(builder).await
    }

    /// Delete a task.
    ///
    /// # Errors
    /// [`ApiError::NotFound`] when the id is unknown.
    pub async fn delete_task(&self, id: TaskId) -> Result<(), ApiError> {
        debug!(%id, "delete task");
        let builder = self.authorize(self.client.delete(self.endpoint(&format!("tasks/{id}"))));
        send_empty(builder).await
    }
}

async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, ApiError> {
    let response = builder.send().await.map_err(transport_error)?;
    let status = response.status();
    if status.is_success() {
        response
            .json()
            .await
            .map_err(|err| ApiError::NetworkFailure(format!("malformed response body: {err}")))
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(classify(status, &body))
    }
}

async fn send_empty(builder: RequestBuilder) -> Result<(), ApiError> {
    let response = builder.send().await.map_err(transport_error)?;
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify(status, &body))
}

fn transport_error(err: reqwest::Error) -> ApiError {
    ApiError::NetworkFailure(err.to_string())
}

/// Error payload shape the backend uses for non-2xx responses.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Vec<FieldError>,
}

fn classify(status: StatusCode, body: &str) -> ApiError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
        StatusCode::NOT_FOUND => ApiError::NotFound,
        StatusCode::CONFLICT => {
            ApiError::Conflict(parsed.message.unwrap_or_else(|| "conflict".to_owned()))
        }
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            let fields = if parsed.errors.is_empty() {
                parsed
                    .message
                    .map(|message| vec![FieldError::new("request", message)])
                    .unwrap_or_default()
            } else {
                parsed.errors
            };
            ApiError::ValidationFailed(fields)
        }
        other => ApiError::ServerError(other.as_u16()),
    }
}
