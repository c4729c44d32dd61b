//! Task entity model.
//!
//! Defines the task record exchanged with the remote API, its enumerations,
//! and [`TaskPatch`] for partial updates. Records use the API's camelCase
//! field names and SCREAMING_SNAKE_CASE enum values on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::draft::FieldErrors;

/// Maximum allowed task title length in characters.
pub const MAX_TASK_TITLE_LENGTH: usize = 256;

/// Prefix carried by placeholder ids during the optimistic window.
const PLACEHOLDER_PREFIX: &str = "tmp-";

/// Errors from parsing textual task fields.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Not one of LOW, MEDIUM, HIGH.
    #[error("unknown priority: {0}")]
    UnknownPriority(String),

    /// Not one of PENDING, IN_PROGRESS, COMPLETED.
    #[error("unknown status: {0}")]
    UnknownStatus(String),

    /// Not one of WORK, PERSONAL, SHOPPING, OTHER.
    #[error("unknown category: {0}")]
    UnknownCategory(String),

    /// Neither `YYYY-MM-DD` nor RFC 3339.
    #[error("invalid date: {0}")]
    InvalidDate(String),

    /// Filter text not of the form `all` or `<kind>:<value>`.
    #[error("unknown filter: {0}")]
    UnknownFilter(String),

    /// Not a sortable field.
    #[error("unknown sort field: {0}")]
    UnknownSortField(String),

    /// Not `asc` or `desc`.
    #[error("unknown sort direction: {0}")]
    UnknownDirection(String),
}

/// Opaque task identifier.
///
/// Ids assigned by the remote API are stable across sessions. A placeholder
/// id derived from a [`TempId`] stands in for a record between its creation
/// request and the server's confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Wraps an id string issued by the remote API.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Placeholder id for a record created optimistically under `temp`.
    #[must_use]
    pub fn placeholder(temp: &TempId) -> Self {
        Self(format!("{PLACEHOLDER_PREFIX}{temp}"))
    }

    /// Whether this id was generated locally and is not yet confirmed.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.0.starts_with(PLACEHOLDER_PREFIX)
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client-generated tag for one in-flight optimistic mutation (UUID v7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TempId(Uuid);

impl TempId {
    /// Creates a new time-ordered temporary id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `TempId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID value.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TempId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TempId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    /// Can wait.
    Low,
    /// The default for new tasks.
    #[default]
    Medium,
    /// Needs attention first.
    High,
}

impl Priority {
    /// All priorities, lowest first.
    pub const ALL: [Self; 3] = [Self::Low, Self::Medium, Self::High];

    /// Sort rank: HIGH(3) > MEDIUM(2) > LOW(1).
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }

    /// Wire name of the priority.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            _ => Err(ParseError::UnknownPriority(s.to_string())),
        }
    }
}

/// Task progress state.
///
/// The single "advance" action cycles PENDING → IN_PROGRESS → COMPLETED →
/// PENDING; any state may also be assigned directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Not started.
    #[default]
    Pending,
    /// Being worked on.
    InProgress,
    /// Done.
    Completed,
}

impl TaskStatus {
    /// All statuses in cycle order.
    pub const ALL: [Self; 3] = [Self::Pending, Self::InProgress, Self::Completed];

    /// The status the advance action moves to.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Pending => Self::InProgress,
            Self::InProgress => Self::Completed,
            Self::Completed => Self::Pending,
        }
    }

    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "PENDING" | "TODO" => Ok(Self::Pending),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "COMPLETED" | "DONE" => Ok(Self::Completed),
            _ => Err(ParseError::UnknownStatus(s.to_string())),
        }
    }
}

/// Task category.
///
/// The server may grow new categories; unrecognized values decode as
/// [`Category::Other`] instead of failing the whole record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    /// Job related.
    Work,
    /// Private errands.
    Personal,
    /// Things to buy.
    Shopping,
    /// Anything else.
    #[serde(other)]
    Other,
}

impl Category {
    /// All known categories.
    pub const ALL: [Self; 4] = [Self::Work, Self::Personal, Self::Shopping, Self::Other];

    /// Wire name of the category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Work => "WORK",
            Self::Personal => "PERSONAL",
            Self::Shopping => "SHOPPING",
            Self::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "WORK" => Ok(Self::Work),
            "PERSONAL" => Ok(Self::Personal),
            "SHOPPING" => Ok(Self::Shopping),
            "OTHER" => Ok(Self::Other),
            _ => Err(ParseError::UnknownCategory(s.to_string())),
        }
    }
}

/// Uppercases and maps `-`/space to `_` so `in-progress` parses like `IN_PROGRESS`.
fn normalize(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

/// A task record as returned by the remote API.
///
/// `created_at` and `updated_at` are set by the server. The client only
/// fabricates them for a record that is still inside its optimistic window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier within the task set.
    pub id: TaskId,
    /// Non-empty title.
    pub title: String,
    /// Free text, possibly empty.
    #[serde(default)]
    pub description: String,
    /// Task priority.
    pub priority: Priority,
    /// Progress state.
    pub status: TaskStatus,
    /// Category.
    pub category: Category,
    /// When the task is due.
    pub due_date: DateTime<Utc>,
    /// When work is planned to start.
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Whether the record is complete.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

/// A partial update to a task. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    /// New title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New priority.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// New status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    /// New category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    /// New due date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    /// New start date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
}

impl TaskPatch {
    /// A patch that only changes the status.
    #[must_use]
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Whether the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Checks the fields the patch sets.
    ///
    /// # Errors
    ///
    /// Returns a [`FieldErrors`] mapping when the title is set but blank or
    /// too long, or when the patch is empty.
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if let Some(title) = &self.title {
            crate::draft::check_title(title, &mut errors);
        }
        if self.is_empty() {
            errors.insert("patch", "Nothing to update");
        }
        errors.into_result(())
    }

    /// Returns `task` with this patch applied and `updated_at` set to `now`.
    ///
    /// Titles and descriptions are trimmed the same way drafts are.
    #[must_use]
    pub fn apply_to(&self, task: &Task, now: DateTime<Utc>) -> Task {
        let mut out = task.clone();
        if let Some(title) = &self.title {
            title.trim().clone_into(&mut out.title);
        }
        if let Some(description) = &self.description {
            description.trim().clone_into(&mut out.description);
        }
        if let Some(priority) = self.priority {
            out.priority = priority;
        }
        if let Some(status) = self.status {
            out.status = status;
        }
        if let Some(category) = self.category {
            out.category = category;
        }
        if let Some(due) = self.due_date {
            out.due_date = due;
        }
        if let Some(start) = self.start_date {
            out.start_date = Some(start);
        }
        out.updated_at = now;
        out
    }
}
