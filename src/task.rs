//! The Task entity — a to-do or event pinned to one calendar day and one owner.
//!
//! All field invariants live here. Handlers hand raw strings in, this module
//! hands validated state back (or a TaskError naming the bad field). A failed
//! create or update never leaves a half-applied entity behind.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

pub const TITLE_MAX: usize = 255;
pub const DESCRIPTION_MAX: usize = 5000;

// ── Enums ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Todo,
    Event,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

// ── Entity ─────────────────────────────────────────────────────

/// A planning task.
///
/// `date` is a pure calendar day — whatever time component the caller sent is
/// dropped at the UTC day boundary during parsing. `due_time` stays a separate
/// advisory field and is never folded into `date`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub due_time: Option<NaiveTime>,
    pub category: Category,
    pub priority: Priority,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ── Errors ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Malformed or out-of-range field. Message names the field.
    Validation(String),
    Forbidden,
    NotFound,
}

impl std::fmt::Display for TaskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskError::Validation(msg) => write!(f, "{msg}"),
            TaskError::Forbidden => write!(f, "You do not have access to this task"),
            TaskError::NotFound => write!(f, "Task not found"),
        }
    }
}

// ── Patch (partial update) ─────────────────────────────────────

/// Fields of a PUT body. Omitted fields stay untouched. `due_time`
/// distinguishes "absent" (leave alone) from an explicit null (clear).
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub due_time: Option<Option<String>>,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
}

/// Maps JSON null to Some(None) instead of None, so a client can clear
/// due_time without us confusing that with the field being absent.
fn explicit_null<'de, D>(de: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(de).map(Some)
}

impl TaskPatch {
    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.date.is_none()
            && self.due_time.is_none()
            && self.category.is_none()
            && self.priority.is_none()
    }
}

// ── Lifecycle ──────────────────────────────────────────────────

impl Task {
    /// Validate and construct a new task. Validation order: title, date,
    /// due_time. Category and priority arrive pre-validated as closed enums.
    pub fn create(
        user_id: Uuid,
        title: &str,
        description: Option<&str>,
        date: &str,
        due_time: Option<&str>,
        category: Category,
        priority: Priority,
    ) -> Result<Task, TaskError> {
        let title = validate_title(title)?;
        let description = validate_description(description.unwrap_or(""))?;
        let date = parse_day(date)?;
        let due_time = due_time.map(parse_due_time).transpose()?;

        let now = Utc::now();
        Ok(Task {
            id: Uuid::new_v4(),
            user_id,
            title,
            description,
            date,
            due_time,
            category,
            priority,
            completed: false,
            completed_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a partial update. Every provided field is validated before any
    /// field is written, so a bad patch leaves the task exactly as it was.
    /// Returns true (and refreshes updated_at) when at least one field was
    /// provided.
    pub fn update(&mut self, patch: TaskPatch) -> Result<bool, TaskError> {
        if patch.is_empty() {
            return Ok(false);
        }

        // Validate phase — nothing is written yet.
        let title = patch.title.as_deref().map(validate_title).transpose()?;
        let description = patch
            .description
            .as_deref()
            .map(validate_description)
            .transpose()?;
        let date = patch.date.as_deref().map(parse_day).transpose()?;
        let due_time = match &patch.due_time {
            None => None,
            Some(None) => Some(None),
            Some(Some(raw)) => Some(Some(parse_due_time(raw)?)),
        };

        // Apply phase.
        if let Some(title) = title {
            self.title = title;
        }
        if let Some(description) = description {
            self.description = description;
        }
        if let Some(date) = date {
            self.date = date;
        }
        if let Some(due_time) = due_time {
            self.due_time = due_time;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }

        self.updated_at = Utc::now();
        Ok(true)
    }

    /// Mark completed. Idempotent — completing twice keeps the original
    /// completed_at.
    pub fn complete(&mut self) {
        if self.completed {
            return;
        }
        let now = Utc::now();
        self.completed = true;
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    /// Inverse of complete(). Also idempotent.
    pub fn uncomplete(&mut self) {
        if !self.completed {
            return;
        }
        self.completed = false;
        self.completed_at = None;
        self.updated_at = Utc::now();
    }
}

// ── Validation helpers ─────────────────────────────────────────

fn validate_title(raw: &str) -> Result<String, TaskError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(TaskError::Validation("Title cannot be empty".into()));
    }
    if title.chars().count() > TITLE_MAX {
        return Err(TaskError::Validation(format!(
            "Title too long (max {TITLE_MAX} characters)"
        )));
    }
    Ok(title.to_string())
}

fn validate_description(raw: &str) -> Result<String, TaskError> {
    let description = raw.trim();
    if description.chars().count() > DESCRIPTION_MAX {
        return Err(TaskError::Validation(format!(
            "Description too long (max {DESCRIPTION_MAX} characters)"
        )));
    }
    Ok(description.to_string())
}

/// Parse a date string into a calendar day. Accepts a plain `YYYY-MM-DD` or a
/// full RFC 3339 timestamp; the latter is normalized to its UTC day.
pub fn parse_day(raw: &str) -> Result<NaiveDate, TaskError> {
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(day);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc).date_naive());
    }
    Err(TaskError::Validation("Invalid date format".into()))
}

/// Parse a strict 24-hour `HH:MM` due time.
pub fn parse_due_time(raw: &str) -> Result<NaiveTime, TaskError> {
    // chrono's %H accepts single digits; the length check keeps "9:5" out.
    if raw.len() == 5 {
        if let Ok(time) = NaiveTime::parse_from_str(raw, "%H:%M") {
            return Ok(time);
        }
    }
    Err(TaskError::Validation(
        "Due time must be HH:MM (24-hour)".into(),
    ))
}

// ── Tests ──────────────────────────────────────────────────────
