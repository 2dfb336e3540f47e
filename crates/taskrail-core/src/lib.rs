//! Domain types for the taskrail client.
//!
//! The backend is the source of truth; everything here is either a wire
//! shape (`Task`, `User`, `TaskPage`) or a derived view (`TaskStats`).

/// Mutation payloads and client-side validation.
pub mod draft;
/// Failure taxonomy shared across the gateway and application layers.
pub mod error;
/// Identifier types.
pub mod id;

pub use draft::{DESCRIPTION_MAX_CHARS, TITLE_MAX_CHARS, TaskDraft, TaskPatch};
pub use error::{ApiError, FieldError};
pub use id::{TaskId, UserId};

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use time::OffsetDateTime;

/// Completion status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Not yet completed.
    Pending,
    /// Completed.
    Completed,
}

impl Status {
    /// The opposite status; backs the pending ⇄ completed toggle shortcut.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Pending => Self::Completed,
            Self::Completed => Self::Pending,
        }
    }

    /// Wire representation, also used in query strings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown status '{other}' (expected pending|completed)")),
        }
    }
}

/// Priority of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Low priority.
    Low,
    /// Medium priority.
    Medium,
    /// High priority.
    High,
}

impl Priority {
    /// Wire representation, also used in query strings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown priority '{other}' (expected low|medium|high)")),
        }
    }
}

/// A task as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Server-assigned identifier.
    pub id: TaskId,
    /// Task title.
    pub title: String,
    /// Optional description body.
    #[serde(default)]
    pub description: Option<String>,
    /// Completion status.
    pub status: Status,
    /// Priority.
    pub priority: Priority,
    /// Server-assigned creation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// An authenticated user account.
///
/// Never carries the password hash; the backend strips it before responding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Server-assigned identifier.
    pub id: UserId,
    /// Email address used to sign in.
    pub email: String,
    /// Server-assigned creation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Email/password pair submitted to login and register.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    /// Email address.
    pub email: String,
    /// Plaintext password; hashing happens behind the backend boundary.
    pub password: String,
}

/// Successful login/register response: the user plus a fresh bearer token.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    /// The authenticated account.
    pub user: User,
    /// Opaque bearer token for subsequent calls.
    pub token: String,
}

/// One page of the task collection as returned by the list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPage {
    /// Tasks in server order.
    pub tasks: Vec<Task>,
    /// Total number of tasks matching the filter, across all pages.
    pub total: u64,
}

/// Server-side filter applied to the task list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    /// Restrict to one completion status.
    pub status: Option<Status>,
    /// Restrict to one priority.
    pub priority: Option<Priority>,
    /// Free-text search over title/description.
    pub search: Option<String>,
    /// 1-based page number.
    pub page: Option<u32>,
    /// Page size.
    pub per_page: Option<u32>,
}

impl TaskFilter {
    /// Returns true when no restriction or pagination is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.priority.is_none()
            && self.search.is_none()
            && self.page.is_none()
            && self.per_page.is_none()
    }

    /// Query-string pairs for the list endpoint, in a stable order.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(status) = self.status {
            pairs.push(("status", status.to_string()));
        }
        if let Some(priority) = self.priority {
            pairs.push(("priority", priority.to_string()));
        }
        if let Some(search) = &self.search {
            pairs.push(("search", search.clone()));
        }
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(per_page) = self.per_page {
            pairs.push(("perPage", per_page.to_string()));
        }
        pairs
    }
}

/// Aggregate counters derived from the unfiltered task collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    /// Number of tasks overall.
    pub total: u64,
    /// Number of completed tasks.
    pub completed: u64,
    /// Number of pending tasks.
    pub pending: u64,
}

impl TaskStats {
    /// Derive counters from a task collection.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let completed = tasks
            .iter()
            .filter(|task| task.status == Status::Completed)
            .count() as u64;
        let total = tasks.len() as u64;
        Self {
            total,
            completed,
            pending: total - completed,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn task(status: Status) -> Task {
        Task {
            id: TaskId::new(),
            title: "t".into(),
            description: None,
            status,
            priority: Priority::Medium,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn status_toggle_flips_both_ways() {
        assert_eq!(Status::Pending.toggled(), Status::Completed);
        assert_eq!(Status::Completed.toggled(), Status::Pending);
    }

    #[test]
    fn status_and_priority_parse_their_wire_values() {
        assert_eq!("pending".parse::<Status>().unwrap(), Status::Pending);
        assert_eq!("high".parse::<Priority>().unwrap(), Priority::High);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn task_uses_camel_case_on_the_wire() {
        let parsed: Task = serde_json::from_value(serde_json::json!({
            "id": "00000000-0000-0000-0000-000000000001",
            "title": "Buy milk",
            "status": "pending",
            "priority": "low",
            "createdAt": "2024-05-01T12:00:00Z"
        }))
        .unwrap();
        assert_eq!(parsed.title, "Buy milk");
        assert_eq!(parsed.status, Status::Pending);
        assert!(parsed.description.is_none());
    }

    #[test]
    fn stats_count_completed_and_pending() {
        let tasks = vec![
            task(Status::Pending),
            task(Status::Completed),
            task(Status::Pending),
        ];
        let stats = TaskStats::from_tasks(&tasks);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.pending, 2);
    }

    #[test]
    fn filter_query_pairs_keep_a_stable_order() {
        let filter = TaskFilter {
            status: Some(Status::Pending),
            priority: Some(Priority::High),
            search: Some("milk".into()),
            page: Some(2),
            per_page: Some(20),
        };
        let pairs = filter.query_pairs();
        let keys: Vec<&str> = pairs.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["status", "priority", "search", "page", "perPage"]);
        assert!(TaskFilter::default().is_empty());
        assert!(!filter.is_empty());
    }
}
