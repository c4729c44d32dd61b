//! Dashboard aggregates computed by the remote API.
//!
//! The client displays these verbatim and never recomputes them.

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

use crate::task::{Category, Priority};

/// Number of tasks in one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    /// Category counted.
    pub category: Category,
    /// Tasks in the category.
    #[serde(rename = "_count")]
    pub count: u64,
}

/// Number of tasks with one priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityCount {
    /// Priority counted.
    pub priority: Priority,
    /// Tasks with the priority.
    #[serde(rename = "_count")]
    pub count: u64,
}

/// Result of the dashboard query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardStats {
    /// All tasks.
    pub total_tasks: u64,
    /// Tasks in COMPLETED.
    pub completed_tasks: u64,
    /// Tasks in PENDING.
    pub pending_tasks: u64,
    /// Tasks in IN_PROGRESS.
    pub in_progress_tasks: u64,
    /// Registered users.
    pub total_users: u64,
    /// Users considered active.
    pub active_users: u64,
    /// Users considered inactive.
    pub inactive_users: u64,
    /// Per-category counts.
    pub tasks_by_category: Vec<CategoryCount>,
    /// Per-priority counts. Rows with a priority this client does not know
    /// are dropped.
    #[serde(deserialize_with = "known_priorities")]
    pub tasks_by_priority: Vec<PriorityCount>,
    /// Completion percentage, 0 to 100.
    pub overall_progress: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PriorityRow {
    Known(PriorityCount),
    Unknown(IgnoredAny),
}

fn known_priorities<'de, D>(deserializer: D) -> Result<Vec<PriorityCount>, D::Error>
where
    D: Deserializer<'de>,
{
    let rows = Vec::<PriorityRow>::deserialize(deserializer)?;
    Ok(rows
        .into_iter()
        .filter_map(|row| match row {
            PriorityRow::Known(count) => Some(count),
            PriorityRow::Unknown(_) => None,
        })
        .collect())
}

impl DashboardStats {
    /// Count reported for `category`, zero when absent.
    #[must_use]
    pub fn category_count(&self, category: Category) -> u64 {
        self.tasks_by_category
            .iter()
            .filter(|c| c.category == category)
            .map(|c| c.count)
            .sum()
    }

    /// Count reported for `priority`, zero when absent.
    #[must_use]
    pub fn priority_count(&self, priority: Priority) -> u64 {
        self.tasks_by_priority
            .iter()
            .filter(|p| p.priority == priority)
            .map(|p| p.count)
            .sum()
    }
}
