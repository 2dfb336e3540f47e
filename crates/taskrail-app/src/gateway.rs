//! Async gateway abstraction the application layer is written against.
//!
//! Mirrors the operations of [`taskrail_api::HttpGateway`] so tests can
//! substitute an in-memory implementation.

use taskrail_core::{
    ApiError, AuthSession, Credentials, Task, TaskDraft, TaskFilter, TaskId, TaskPage, TaskPatch,
    User,
};

/// Remote operations required by the session manager, cache coordinator and
/// mutation pipeline.
#[allow(async_fn_in_trait)]
pub trait RemoteGateway: Send + Sync {
    /// Exchange credentials for a session.
    ///
    /// # Errors
    /// Propagates the typed [`ApiError`] taxonomy.
    async fn login(&self, credentials: &Credentials) -> Result<AuthSession, ApiError>;

    /// Create an account and receive a session.
    ///
    /// # Errors
    /// A duplicate email surfaces as [`ApiError::Conflict`].
    async fn register(&self, credentials: &Credentials) -> Result<AuthSession, ApiError>;

    /// Invalidate the session server-side.
    ///
    /// # Errors
    /// Propagates the typed [`ApiError`] taxonomy.
    async fn logout(&self) -> Result<(), ApiError>;

    /// Fetch the account behind the current token.
    ///
    /// # Errors
    /// [`ApiError::Unauthorized`] when the token is absent or rejected.
    async fn current_user(&self) -> Result<User, ApiError>;

    /// List tasks matching the filter.
    ///
    /// # Errors
    /// Propagates the typed [`ApiError`] taxonomy.
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<TaskPage, ApiError>;

    /// Create a task from a validated draft.
    ///
    /// # Errors
    /// Server-side rejections surface as [`ApiError::ValidationFailed`].
    async fn create_task(&self, draft: &TaskDraft) -> Result<Task, ApiError>;

    /// Apply a partial update to a task.
    ///
    /// # Errors
    /// [`ApiError::NotFound`] when the id is unknown.
    async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> Result<Task, ApiError>;

    /// Delete a task.
    ///
    /// # Errors
    /// [`ApiError::NotFound`] when the id is unknown.
    async fn delete_task(&self, id: TaskId) -> Result<(), ApiError>;
}

impl RemoteGateway for taskrail_api::HttpGateway {
    async fn login(&self, credentials: &Credentials) -> Result<AuthSession, ApiError> {
        Self::login(self, credentials).await
    }

    async fn register(&self, credentials: &Credentials) -> Result<AuthSession, ApiError> {
        Self::register(self, credentials).await
    }

    async fn logout(&self) -> Result<(), ApiError> {
        Self::logout(self).await
    }

    async fn current_user(&self) -> Result<User, ApiError> {
        Self::current_user(self).await
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<TaskPage, ApiError> {
        Self::list_tasks(self, filter).await
    }

    async fn create_task(&self, draft: &TaskDraft) -> Result<Task, ApiError> {
        Self::create_task(self, draft).await
    }

    async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> Result<Task, ApiError> {
        Self::update_task(self, id, patch).await
    }

    async fn delete_task(&self, id: TaskId) -> Result<(), ApiError> {
        Self::delete_task(self, id).await
    }
}
