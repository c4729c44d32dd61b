//! Read-only views over the canonical task set.
//!
//! Every function here is pure: it borrows the set, never mutates it, and
//! takes `now` as an argument so one projection pass uses a single instant.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use taskdeck_proto::dashboard::DashboardStats;
use taskdeck_proto::query::{Filter, SortDirection, SortField, SortSpec};
use taskdeck_proto::task::{Task, TaskId, TaskStatus};

/// Tasks passing `filter`, in input order. [`Filter::All`] is the identity.
#[must_use]
pub fn filtered_tasks(set: &[Task], filter: Filter) -> Vec<&Task> {
    set.iter().filter(|t| filter.matches(t)).collect()
}

/// Whether `task` matches a search term (case-insensitive substring of the
/// title, description or category). An empty term matches everything.
#[must_use]
pub fn matches_search(task: &Task, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    term.is_empty()
        || task.title.to_lowercase().contains(&term)
        || task.description.to_lowercase().contains(&term)
        || task.category.as_str().to_lowercase().contains(&term)
}

/// Compares two tasks by `field`, ascending.
///
/// Titles compare case-insensitively first, then by exact text, which
/// approximates a locale collation for Latin scripts.
#[must_use]
pub fn compare(a: &Task, b: &Task, field: SortField) -> Ordering {
    match field {
        SortField::Title => a
            .title
            .to_lowercase()
            .cmp(&b.title.to_lowercase())
            .then_with(|| a.title.cmp(&b.title)),
        SortField::Priority => a.priority.rank().cmp(&b.priority.rank()),
        SortField::DueDate => a.due_date.cmp(&b.due_date),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
    }
}

/// Search then stable sort.
///
/// Descending order reverses the comparison; equal elements keep their
/// input order in both directions.
#[must_use]
pub fn searched_and_sorted<'a, I>(tasks: I, term: &str, sort: SortSpec) -> Vec<&'a Task>
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut out: Vec<&Task> = tasks
        .into_iter()
        .filter(|t| matches_search(t, term))
        .collect();
    out.sort_by(|a, b| {
        let ord = compare(a, b, sort.field);
        match sort.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });
    out
}

/// Open tasks by ascending due date, at most `limit`.
#[must_use]
pub fn upcoming(set: &[Task], limit: usize) -> Vec<&Task> {
    let mut open: Vec<&Task> = set.iter().filter(|t| !t.is_completed()).collect();
    open.sort_by_key(|t| t.due_date);
    open.truncate(limit);
    open
}

/// Completed tasks, most recently completed first, at most `limit`.
///
/// The last modification time stands in for the completion time.
#[must_use]
pub fn recently_completed(set: &[Task], limit: usize) -> Vec<&Task> {
    let mut done: Vec<&Task> = set.iter().filter(|t| t.is_completed()).collect();
    done.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    done.truncate(limit);
    done
}

/// Past due and not completed.
#[must_use]
pub fn is_overdue(task: &Task, now: DateTime<Utc>) -> bool {
    task.due_date < now && task.status != TaskStatus::Completed
}

// ---------------------------------------------------------------------------
// View models
// ---------------------------------------------------------------------------

/// Parameters of the task list view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    /// Equality filter.
    pub filter: Filter,
    /// Search term, may be empty.
    pub search: String,
    /// Ordering.
    pub sort: SortSpec,
}

/// One displayed task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRow {
    /// The record.
    pub task: Task,
    /// Past due and not completed, as of the pass's `now`.
    pub overdue: bool,
    /// An unconfirmed change references this record.
    pub pending: bool,
}

/// The filtered, searched and sorted task list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskListView {
    /// Rows in display order.
    pub rows: Vec<TaskRow>,
    /// Size of the canonical set before filtering.
    pub total: usize,
}

/// Remote aggregates next to locally derived subsets.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    /// Remote statistics, shown verbatim; `None` when unavailable.
    pub stats: Option<DashboardStats>,
    /// Next open tasks by due date.
    pub upcoming: Vec<TaskRow>,
    /// Latest completed tasks.
    pub recently_completed: Vec<TaskRow>,
}

fn rows<'a>(
    tasks: impl IntoIterator<Item = &'a Task>,
    now: DateTime<Utc>,
    is_pending: &impl Fn(&TaskId) -> bool,
) -> Vec<TaskRow> {
    tasks
        .into_iter()
        .map(|t| TaskRow {
            task: t.clone(),
            overdue: is_overdue(t, now),
            pending: is_pending(&t.id),
        })
        .collect()
}

/// Builds the task list view in one pass against a single `now`.
#[must_use]
pub fn task_list_view(
    set: &[Task],
    params: &ListParams,
    now: DateTime<Utc>,
    is_pending: impl Fn(&TaskId) -> bool,
) -> TaskListView {
    let filtered = filtered_tasks(set, params.filter);
    let sorted = searched_and_sorted(filtered, &params.search, params.sort);
    TaskListView {
        rows: rows(sorted, now, &is_pending),
        total: set.len(),
    }
}

/// Builds the dashboard view in one pass against a single `now`.
#[must_use]
pub fn dashboard_view(
    set: &[Task],
    stats: Option<DashboardStats>,
    limits: (usize, usize),
    now: DateTime<Utc>,
    is_pending: impl Fn(&TaskId) -> bool,
) -> DashboardView {
    let (upcoming_limit, recent_limit) = limits;
    DashboardView {
        stats,
        upcoming: rows(upcoming(set, upcoming_limit), now, &is_pending),
        recently_completed: rows(recently_completed(set, recent_limit), now, &is_pending),
    }
}
