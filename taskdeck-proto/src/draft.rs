//! Task drafts and creation-time validation.
//!
//! A [`TaskDraft`] holds what a user typed: dates are still text and most
//! fields are optional. [`TaskDraft::validate`] turns it into a normalized
//! [`NewTask`] payload or a [`FieldErrors`] mapping. Validation never panics,
//! so the form layer and the mutation pipeline consume the same result.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::{
    Category, MAX_TASK_TITLE_LENGTH, ParseError, Priority, Task, TaskId, TaskStatus,
};

/// Field name to error message, in field-name order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    /// Creates an empty mapping.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Records an error for `field`, keeping the first message per field.
    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    /// The message recorded for `field`, if any.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Whether no errors were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of fields with errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates `(field, message)` pairs in field-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `Ok(value)` when empty, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one field error was recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, (field, message)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
        }
        Ok(())
    }
}

impl std::error::Error for FieldErrors {}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldErrors {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut errors = Self::new();
        for (k, v) in iter {
            errors.insert(k, v);
        }
        errors
    }
}

/// Unvalidated input for a new task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDraft {
    /// Required, trimmed before use.
    pub title: String,
    /// Optional free text.
    pub description: String,
    /// Required; `YYYY-MM-DD` or RFC 3339.
    pub due_date: String,
    /// Required.
    pub category: Option<Category>,
    /// Defaults to MEDIUM.
    pub priority: Option<Priority>,
    /// Defaults to the validation time.
    pub start_date: Option<String>,
}

/// A validated creation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    /// Trimmed, non-empty title.
    pub title: String,
    /// Trimmed description.
    pub description: String,
    /// Priority.
    pub priority: Priority,
    /// Category.
    pub category: Category,
    /// Due date.
    pub due_date: DateTime<Utc>,
    /// Start date.
    pub start_date: DateTime<Utc>,
}

impl NewTask {
    /// Builds the optimistic record shown until the server confirms.
    ///
    /// The status is always PENDING, the only state the server creates
    /// tasks in.
    #[must_use]
    pub fn to_task(&self, id: TaskId, now: DateTime<Utc>) -> Task {
        Task {
            id,
            title: self.title.clone(),
            description: self.description.clone(),
            priority: self.priority,
            status: TaskStatus::Pending,
            category: self.category,
            due_date: self.due_date,
            start_date: Some(self.start_date),
            created_at: now,
            updated_at: now,
        }
    }
}

impl TaskDraft {
    /// Validates the draft against `now`, used as the default start date.
    ///
    /// # Errors
    ///
    /// Returns every failing field at once: a blank or overlong title, a
    /// missing or unparseable due date, a missing category, or an
    /// unparseable start date.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<NewTask, FieldErrors> {
        let mut errors = FieldErrors::new();

        check_title(&self.title, &mut errors);

        let due_date = if self.due_date.trim().is_empty() {
            errors.insert("dueDate", "Due date is required");
            None
        } else {
            parse_date(&self.due_date)
                .map_err(|_| errors.insert("dueDate", "Due date is not a valid date"))
                .ok()
        };

        if self.category.is_none() {
            errors.insert("category", "Category is required");
        }

        let start_date = match self.start_date.as_deref().map(str::trim) {
            None | Some("") => Some(now),
            Some(text) => parse_date(text)
                .map_err(|_| errors.insert("startDate", "Start date is not a valid date"))
                .ok(),
        };

        match (due_date, self.category, start_date) {
            (Some(due_date), Some(category), Some(start_date)) if errors.is_empty() => {
                Ok(NewTask {
                    title: self.title.trim().to_string(),
                    description: self.description.trim().to_string(),
                    priority: self.priority.unwrap_or_default(),
                    category,
                    due_date,
                    start_date,
                })
            }
            _ => Err(errors),
        }
    }
}

/// Records a title error when `title` is blank or too long.
pub(crate) fn check_title(title: &str, errors: &mut FieldErrors) {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        errors.insert("title", "Title is required");
    } else if trimmed.chars().count() > MAX_TASK_TITLE_LENGTH {
        errors.insert(
            "title",
            format!("Title must be at most {MAX_TASK_TITLE_LENGTH} characters"),
        );
    }
}

/// Parses a calendar date (`YYYY-MM-DD`, midnight UTC) or an RFC 3339 timestamp.
///
/// # Errors
///
/// Returns [`ParseError::InvalidDate`] when neither form matches.
pub fn parse_date(text: &str) -> Result<DateTime<Utc>, ParseError> {
    let text = text.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
        .map_err(|_| ParseError::InvalidDate(text.to_string()))
}
