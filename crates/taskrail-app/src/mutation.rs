//! Task mutations coupled to the cache protocol and user feedback.
//!
//! Every operation validates client-side first, calls the gateway, and only
//! after a confirmed success drives the coordinator's invalidate+refetch for
//! both scopes. A failed operation surfaces a user-visible notice and leaves
//! the cache untouched.

use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use taskrail_core::{ApiError, FieldError, Task, TaskDraft, TaskId, TaskPatch};

use crate::gateway::RemoteGateway;
use crate::task_cache::TaskCacheCoordinator;

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// The operation completed.
    Success,
    /// The operation failed; the message explains why.
    Error,
}

/// User-facing feedback emitted by the pipeline.
#[derive(Debug, Clone)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Message to present verbatim.
    pub message: String,
}

impl Notice {
    /// Success notice.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    /// Error notice.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Sink for user-facing notices; the CLI prints them, tests record them.
pub trait Notifier: Send + Sync {
    /// Deliver one notice.
    fn notify(&self, notice: Notice);
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn notify(&self, notice: Notice) {
        (**self).notify(notice);
    }
}

/// Explicit user decision required before a delete reaches the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteConfirmation {
    /// The user confirmed the deletion.
    Confirmed,
    /// The user backed out; nothing is sent.
    Cancelled,
}

/// Result of a delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The task was removed remotely and the cache refreshed.
    Deleted,
    /// The user cancelled; no call was issued and the cache is unchanged.
    Cancelled,
}

/// Failures surfaced by the mutation pipeline.
#[derive(Debug, Error)]
pub enum MutationError {
    /// Client-side validation rejected the payload; no call was issued.
    #[error("validation failed: {}", join_fields(.0))]
    Invalid(Vec<FieldError>),
    /// The patch contains no changes; no call was issued.
    #[error("nothing to update")]
    EmptyPatch,
    /// The gateway reported a typed failure.
    #[error(transparent)]
    Api(#[from] ApiError),
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Message presented to the user for a gateway failure, preferring whatever
/// the server said over a generic fallback.
#[must_use]
pub fn user_message(err: &ApiError) -> String {
    match err {
        ApiError::Unauthorized => "Your session has expired. Please sign in again.".to_owned(),
        ApiError::ValidationFailed(fields) if !fields.is_empty() => join_fields(fields),
        ApiError::ValidationFailed(_) => "The submitted data is invalid.".to_owned(),
        ApiError::NotFound => "This task no longer exists.".to_owned(),
        ApiError::Conflict(message) => message.clone(),
        ApiError::NetworkFailure(_) => "Could not reach the server. Please try again.".to_owned(),
        ApiError::ServerError(_) => {
            "Something went wrong on the server. Please try again.".to_owned()
        }
    }
}

/// Executes task mutations and drives the cache protocol plus notices.
pub struct TaskMutator<G, N> {
    gateway: Arc<G>,
    cache: Arc<TaskCacheCoordinator<G>>,
    notifier: N,
}

impl<G: RemoteGateway, N: Notifier> TaskMutator<G, N> {
    /// Create a mutator over the shared gateway and coordinator.
    pub const fn new(gateway: Arc<G>, cache: Arc<TaskCacheCoordinator<G>>, notifier: N) -> Self {
        Self {
            gateway,
            cache,
            notifier,
        }
    }

    /// Create a task.
    ///
    /// # Errors
    /// [`MutationError::Invalid`] when client-side validation fails (no call
    /// is issued); otherwise the gateway failure.
    pub async fn create(&self, draft: TaskDraft) -> Result<Task, MutationError> {
        if let Err(fields) = draft.validate() {
            self.notifier.notify(Notice::error(join_fields(&fields)));
            return Err(MutationError::Invalid(fields));
        }
        match self.gateway.create_task(&draft).await {
            Ok(task) => {
                self.finish_success("Task created").await;
                Ok(task)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Apply a partial update; also backs the status-toggle shortcut.
    ///
    /// # Errors
    /// [`MutationError::EmptyPatch`] / [`MutationError::Invalid`] without a
    /// call; otherwise the gateway failure.
    pub async fn update(&self, id: TaskId, patch: TaskPatch) -> Result<Task, MutationError> {
        if patch.is_empty() {
            self.notifier.notify(Notice::error("Nothing to update."));
            return Err(MutationError::EmptyPatch);
        }
        if let Err(fields) = patch.validate() {
            self.notifier.notify(Notice::error(join_fields(&fields)));
            return Err(MutationError::Invalid(fields));
        }
        match self.gateway.update_task(id, &patch).await {
            Ok(task) => {
                self.finish_success("Task updated").await;
                Ok(task)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Flip a task between pending and completed.
    ///
    /// # Errors
    /// Same as [`update`](Self::update).
    pub async fn toggle_status(&self, task: &Task) -> Result<Task, MutationError> {
        let next = task.status.toggled();
        self.update(task.id, TaskPatch::status_only(next)).await
    }

    /// Delete a task, gated on an explicit confirmation.
    ///
    /// A cancelled confirmation short-circuits: no gateway call, no cache
    /// change, no notice.
    ///
    /// # Errors
    /// Propagates the gateway failure for a confirmed delete.
    pub async fn delete(
        &self,
        id: TaskId,
        confirmation: DeleteConfirmation,
    ) -> Result<DeleteOutcome, MutationError> {
        if confirmation == DeleteConfirmation::Cancelled {
            return Ok(DeleteOutcome::Cancelled);
        }
        match self.gateway.delete_task(id).await {
            Ok(()) => {
                self.finish_success("Task deleted").await;
                Ok(DeleteOutcome::Deleted)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Cache protocol after a confirmed success: both scopes are invalidated
    /// and refetched. A failed refetch leaves them stale-marked (the next
    /// read refetches), and the success notice is still emitted because the
    /// mutation itself is confirmed.
    async fn finish_success(&self, message: &str) {
        if let Err(err) = self.cache.refresh_after_mutation().await {
            warn!(error = %err, "cache refresh after mutation failed; scopes stay stale");
        }
        self.notifier.notify(Notice::success(message));
    }

    fn fail(&self, err: ApiError) -> MutationError {
        self.notifier.notify(Notice::error(user_message(&err)));
        err.into()
    }
}
