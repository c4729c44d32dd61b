//! Filter and sort parameters.
//!
//! [`Filter`] and [`SortSpec`] are the transient view parameters the client
//! projects with. [`TaskFilter`], [`TaskSort`] and [`Pagination`] are the
//! server-side arguments of the task list query.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::{Category, ParseError, Priority, Task, TaskStatus};

/// Client-side view filter: everything, or one value of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filter {
    /// Identity pass-through.
    #[default]
    All,
    /// Only tasks with this priority.
    Priority(Priority),
    /// Only tasks with this status.
    Status(TaskStatus),
    /// Only tasks in this category.
    Category(Category),
}

impl Filter {
    /// Whether `task` passes the filter.
    #[must_use]
    pub fn matches(self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::Priority(p) => task.priority == p,
            Self::Status(s) => task.status == s,
            Self::Category(c) => task.category == c,
        }
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Priority(p) => write!(f, "priority:{p}"),
            Self::Status(s) => write!(f, "status:{s}"),
            Self::Category(c) => write!(f, "category:{c}"),
        }
    }
}

impl std::str::FromStr for Filter {
    type Err = ParseError;

    /// Parses `all`, `priority:<p>`, `status:<s>` or `category:<c>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        let Some((kind, value)) = s.split_once(':') else {
            return Err(ParseError::UnknownFilter(s.to_string()));
        };
        match kind.trim().to_ascii_lowercase().as_str() {
            "priority" => value.parse().map(Self::Priority),
            "status" => value.parse().map(Self::Status),
            "category" => value.parse().map(Self::Category),
            _ => Err(ParseError::UnknownFilter(s.to_string())),
        }
    }
}

/// Field a task list is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    /// Lexicographic by title.
    Title,
    /// By priority rank.
    Priority,
    /// Chronological by due date.
    #[default]
    DueDate,
    /// Chronological by creation time.
    CreatedAt,
}

impl std::str::FromStr for SortField {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "title" => Ok(Self::Title),
            "priority" => Ok(Self::Priority),
            "duedate" | "due" => Ok(Self::DueDate),
            "createdat" | "created" => Ok(Self::CreatedAt),
            _ => Err(ParseError::UnknownSortField(s.to_string())),
        }
    }
}

/// Sort direction. Serializes as `asc` / `desc` for the list query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Smallest first.
    #[default]
    Asc,
    /// Largest first.
    Desc,
}

impl std::str::FromStr for SortDirection {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Asc),
            "desc" | "descending" => Ok(Self::Desc),
            _ => Err(ParseError::UnknownDirection(s.to_string())),
        }
    }
}

/// Sort field plus direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortSpec {
    /// Field compared.
    pub field: SortField,
    /// Direction applied to the comparison.
    pub direction: SortDirection,
}

impl SortSpec {
    /// Creates a sort specification.
    #[must_use]
    pub const fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }
}

impl std::str::FromStr for SortSpec {
    type Err = ParseError;

    /// Parses `<field>` or `<field>:<asc|desc>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, direction) = match s.split_once(':') {
            Some((field, dir)) => (field.parse()?, dir.parse()?),
            None => (s.parse()?, SortDirection::Asc),
        };
        Ok(Self { field, direction })
    }
}

// ---------------------------------------------------------------------------
// List query arguments
// ---------------------------------------------------------------------------

/// Server-side filter of the task list query. Unset fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFilter {
    /// Category equality.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    /// Description substring.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Due on the same calendar day.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    /// Priority equality.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// Status equality.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    /// Title substring.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl TaskFilter {
    /// Whether `task` satisfies every set constraint.
    ///
    /// Substring matches ignore case.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        let contains = |haystack: &str, needle: &str| {
            haystack.to_lowercase().contains(&needle.to_lowercase())
        };
        self.category.is_none_or(|c| task.category == c)
            && self.priority.is_none_or(|p| task.priority == p)
            && self.status.is_none_or(|s| task.status == s)
            && self
                .due_date
                .is_none_or(|d| task.due_date.date_naive() == d.date_naive())
            && self.title.as_deref().is_none_or(|t| contains(&task.title, t))
            && self
                .description
                .as_deref()
                .is_none_or(|d| contains(&task.description, d))
    }
}

impl From<Filter> for TaskFilter {
    fn from(filter: Filter) -> Self {
        match filter {
            Filter::All => Self::default(),
            Filter::Priority(p) => Self {
                priority: Some(p),
                ..Self::default()
            },
            Filter::Status(s) => Self {
                status: Some(s),
                ..Self::default()
            },
            Filter::Category(c) => Self {
                category: Some(c),
                ..Self::default()
            },
        }
    }
}

/// Server-side ordering of the task list query.
///
/// The API sorts by timestamps only; title and priority ordering happen in
/// the client projection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSort {
    /// Order by creation time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<SortDirection>,
    /// Order by due date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<SortDirection>,
    /// Order by last modification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<SortDirection>,
}

impl TaskSort {
    /// The server-side equivalent of `spec`, if the API can sort by its field.
    #[must_use]
    pub fn from_spec(spec: SortSpec) -> Option<Self> {
        match spec.field {
            SortField::DueDate => Some(Self {
                due_date: Some(spec.direction),
                ..Self::default()
            }),
            SortField::CreatedAt => Some(Self {
                created_at: Some(spec.direction),
                ..Self::default()
            }),
            SortField::Title | SortField::Priority => None,
        }
    }
}

/// Offset paging of the task list query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Records to skip.
    pub skip: u32,
    /// Records to return.
    pub take: u32,
}

impl Pagination {
    /// Default page size of the list query.
    pub const DEFAULT_TAKE: u32 = 10;

    /// First page with `take` records.
    #[must_use]
    pub const fn first(take: u32) -> Self {
        Self { skip: 0, take }
    }

    /// The page following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self {
            skip: self.skip.saturating_add(self.take),
            take: self.take,
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::first(Self::DEFAULT_TAKE)
    }
}
