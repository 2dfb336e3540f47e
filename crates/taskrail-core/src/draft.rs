//! Mutation payloads and the client-side validation applied before any
//! network call.

use serde::Serialize;

use crate::error::FieldError;
use crate::{Priority, Status};

/// Maximum accepted title length in characters.
pub const TITLE_MAX_CHARS: usize = 255;
/// Maximum accepted description length in characters.
pub const DESCRIPTION_MAX_CHARS: usize = 1000;

/// Payload for creating a task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskDraft {
    /// Task title (required, non-blank).
    pub title: String,
    /// Optional description body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Initial completion status.
    pub status: Status,
    /// Initial priority.
    pub priority: Priority,
}

impl TaskDraft {
    /// Draft with the given title and the usual defaults (pending, medium).
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            status: Status::Pending,
            priority: Priority::Medium,
        }
    }

    /// Validate the draft, returning every offending field at once.
    ///
    /// # Errors
    /// Returns the collected [`FieldError`]s when any field is out of bounds.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        validate_title(&self.title, &mut errors);
        validate_description(self.description.as_deref(), &mut errors);
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Partial update applied to an existing task.
///
/// `None` fields are left untouched by the backend; this type serializes to
/// the PATCH body with absent keys skipped.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskPatch {
    /// Replacement title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Replacement description body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Replacement completion status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    /// Replacement priority.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

impl TaskPatch {
    /// Patch that only flips the completion status.
    #[must_use]
    pub const fn status_only(status: Status) -> Self {
        Self {
            title: None,
            description: None,
            status: Some(status),
            priority: None,
        }
    }

    /// Returns true when the patch would not change anything.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
    }

    /// Validate the present fields, returning every offending field at once.
    ///
    /// # Errors
    /// Returns the collected [`FieldError`]s when any present field is out of bounds.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        if let Some(title) = self.title.as_deref() {
            validate_title(title, &mut errors);
        }
        validate_description(self.description.as_deref(), &mut errors);
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

fn validate_title(title: &str, errors: &mut Vec<FieldError>) {
    if title.trim().is_empty() {
        errors.push(FieldError::new("title", "must not be empty"));
    } else if title.chars().count() > TITLE_MAX_CHARS {
        errors.push(FieldError::new(
            "title",
            format!("must be at most {TITLE_MAX_CHARS} characters"),
        ));
    }
}

fn validate_description(description: Option<&str>, errors: &mut Vec<FieldError>) {
    if let Some(body) = description
        && body.chars().count() > DESCRIPTION_MAX_CHARS
    {
        errors.push(FieldError::new(
            "description",
            format!("must be at most {DESCRIPTION_MAX_CHARS} characters"),
        ));
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn valid_draft_passes() {
        let draft = TaskDraft {
            title: "Buy milk".into(),
            description: Some("2% if available".into()),
            status: Status::Pending,
            priority: Priority::Low,
        };
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn blank_title_is_rejected() {
        let draft = TaskDraft::new("   ");
        let errors = draft.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "title");
    }

    #[test]
    fn overlong_fields_are_reported_together() {
        let draft = TaskDraft {
            title: "t".repeat(TITLE_MAX_CHARS + 1),
            description: Some("d".repeat(DESCRIPTION_MAX_CHARS + 1)),
            status: Status::Pending,
            priority: Priority::High,
        };
        let errors = draft.validate().unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["title", "description"]);
    }

    #[test]
    fn title_at_limit_is_accepted() {
        let draft = TaskDraft::new("t".repeat(TITLE_MAX_CHARS));
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn empty_patch_reports_empty() {
        assert!(TaskPatch::default().is_empty());
        assert!(!TaskPatch::status_only(Status::Completed).is_empty());
    }

    #[test]
    fn patch_validates_only_present_fields() {
        let patch = TaskPatch {
            title: Some(String::new()),
            ..TaskPatch::default()
        };
        let errors = patch.validate().unwrap_err();
        assert_eq!(errors[0].field, "title");

        let patch = TaskPatch::status_only(Status::Completed);
        assert!(patch.validate().is_ok());
    }

    #[test]
    fn patch_serializes_without_absent_fields() {
        let patch = TaskPatch::status_only(Status::Completed);
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "completed" }));
    }
}
