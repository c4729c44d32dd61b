//! Command-line front end over the task store.
//!
//! [`App`] runs one [`Command`] against a hydrated [`TaskStore`] and
//! returns the lines to print. Rendering stays here; the store only
//! exposes data.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use taskdeck_proto::auth::{Credentials, Registration};
use taskdeck_proto::dashboard::DashboardStats;
use taskdeck_proto::draft::{TaskDraft, parse_date};
use taskdeck_proto::query::{Filter, SortSpec};
use taskdeck_proto::task::{Category, ParseError, Priority, TaskId, TaskPatch, TaskStatus};

use crate::cache::StoreError;
use crate::config::ConfigError;
use crate::gateway::{AuthApi, DashboardSource, TaskGateway};
use crate::session::{Session, SessionError};
use crate::tasks::{DashboardView, ListParams, MutationError, TaskRow, TaskStore};

/// Errors surfaced to the user by the binary.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Local storage could not be opened.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A command argument could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A task operation failed.
    #[error(transparent)]
    Mutation(#[from] MutationError),

    /// Signing in or out failed.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// One user action.
#[derive(clap::Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show tasks.
    List {
        /// `all`, or `priority:<p>`, `status:<s>`, `category:<c>`.
        #[arg(long, default_value = "all")]
        filter: Filter,
        /// Case-insensitive text to look for.
        #[arg(long, default_value = "")]
        search: String,
        /// `<field>[:asc|desc]` with field one of title, priority, dueDate, createdAt.
        #[arg(long, default_value = "dueDate:asc")]
        sort: SortSpec,
    },
    /// Create a task.
    Add {
        /// Title.
        title: String,
        /// Due date (`YYYY-MM-DD` or RFC 3339).
        #[arg(long)]
        due: String,
        /// Category.
        #[arg(long)]
        category: Option<Category>,
        /// Longer text.
        #[arg(long, default_value = "")]
        description: String,
        /// Priority (default MEDIUM).
        #[arg(long)]
        priority: Option<Priority>,
        /// Start date (default now).
        #[arg(long)]
        start: Option<String>,
    },
    /// Change task fields.
    Edit {
        /// Task id.
        id: String,
        /// New title.
        #[arg(long)]
        title: Option<String>,
        /// New description.
        #[arg(long)]
        description: Option<String>,
        /// New priority.
        #[arg(long)]
        priority: Option<Priority>,
        /// New category.
        #[arg(long)]
        category: Option<Category>,
        /// New due date.
        #[arg(long)]
        due: Option<String>,
        /// New start date.
        #[arg(long)]
        start: Option<String>,
    },
    /// Set a task's status.
    Status {
        /// Task id.
        id: String,
        /// `pending`, `in_progress` or `completed`.
        status: TaskStatus,
    },
    /// Move a task to its next status.
    Advance {
        /// Task id.
        id: String,
    },
    /// Remove a task.
    Delete {
        /// Task id.
        id: String,
    },
    /// Show statistics with upcoming and recently completed tasks.
    Dashboard,
    /// Sign in.
    Login {
        /// Account email.
        email: String,
        /// Account password.
        #[arg(long, env = "TASKDECK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and sign in.
    Register {
        /// Display name.
        name: String,
        /// Account email.
        email: String,
        /// Account password.
        #[arg(long, env = "TASKDECK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out and forget the stored credentials.
    Logout,
}

impl Default for Command {
    fn default() -> Self {
        Self::List {
            filter: Filter::All,
            search: String::new(),
            sort: SortSpec::default(),
        }
    }
}

/// The command runner.
#[derive(Debug)]
pub struct App<G: TaskGateway> {
    store: TaskStore<G>,
    session: Arc<Session>,
}

impl<G> App<G>
where
    G: TaskGateway + DashboardSource + AuthApi,
{
    /// Wraps a store and the session it signs out on authorization failures.
    #[must_use]
    pub const fn new(store: TaskStore<G>, session: Arc<Session>) -> Self {
        Self { store, session }
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &TaskStore<G> {
        &self.store
    }

    /// Runs `command` and returns its output lines, evaluated at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError`] when arguments do not parse or the operation
    /// fails. Field validation errors are returned as
    /// [`MutationError::Invalid`].
    pub async fn run(&self, command: Command, now: DateTime<Utc>) -> Result<Vec<String>, AppError> {
        match command {
            Command::List {
                filter,
                search,
                sort,
            } => {
                let params = ListParams {
                    filter,
                    search,
                    sort,
                };
                let view = self.store.list_view(&params, now)?;
                let mut lines: Vec<String> = view.rows.iter().map(format_row).collect();
                lines.push(format!("{} of {} tasks", view.rows.len(), view.total));
                Ok(lines)
            }
            Command::Add {
                title,
                due,
                category,
                description,
                priority,
                start,
            } => {
                let draft = TaskDraft {
                    title,
                    description,
                    due_date: due,
                    category,
                    priority,
                    start_date: start,
                };
                let task = self.store.create(&draft).await?;
                Ok(vec![format!("created {}", task.id)])
            }
            Command::Edit {
                id,
                title,
                description,
                priority,
                category,
                due,
                start,
            } => {
                let patch = TaskPatch {
                    title,
                    description,
                    priority,
                    status: None,
                    category,
                    due_date: due.as_deref().map(parse_date).transpose()?,
                    start_date: start.as_deref().map(parse_date).transpose()?,
                };
                let task = self.store.update(&TaskId::new(id), patch).await?;
                Ok(vec![format!("updated {}", task.id)])
            }
            Command::Status { id, status } => {
                let task = self.store.change_status(&TaskId::new(id), status).await?;
                Ok(vec![format!("{} is now {}", task.id, task.status)])
            }
            Command::Advance { id } => {
                let task = self.store.advance_status(&TaskId::new(id)).await?;
                Ok(vec![format!("{} is now {}", task.id, task.status)])
            }
            Command::Delete { id } => {
                let id = TaskId::new(id);
                self.store.delete(&id).await?;
                Ok(vec![format!("deleted {id}")])
            }
            Command::Dashboard => {
                let stats = match self.store.fetch_dashboard().await {
                    Ok(stats) => Some(stats),
                    Err(MutationError::Rejected(err)) => {
                        tracing::debug!(error = %err, "dashboard shown without statistics");
                        None
                    }
                    Err(err) => return Err(err.into()),
                };
                Ok(format_dashboard(&self.store.dashboard_view(stats, now)?))
            }
            Command::Login { email, password } => {
                let credentials = Credentials { email, password };
                self.session
                    .login(self.store.gateway().as_ref(), &credentials)
                    .await?;
                Ok(vec!["signed in".to_string()])
            }
            Command::Register {
                name,
                email,
                password,
            } => {
                let registration = Registration {
                    name,
                    email,
                    password,
                };
                self.session
                    .register(self.store.gateway().as_ref(), &registration)
                    .await?;
                Ok(vec!["account created, signed in".to_string()])
            }
            Command::Logout => {
                self.session.sign_out();
                Ok(vec!["signed out".to_string()])
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn format_row(row: &TaskRow) -> String {
    let task = &row.task;
    let mut line = format!(
        "{}  [{}] {:<6} {:<8} {}  due {}",
        task.id,
        task.status,
        task.priority,
        task.category,
        task.title,
        task.due_date.format("%Y-%m-%d"),
    );
    if row.overdue {
        line.push_str("  OVERDUE");
    }
    if row.pending {
        line.push_str("  (saving)");
    }
    line
}

fn format_stats(stats: &DashboardStats) -> Vec<String> {
    let mut lines = vec![
        format!(
            "tasks: {} total, {} completed, {} in progress, {} pending",
            stats.total_tasks, stats.completed_tasks, stats.in_progress_tasks, stats.pending_tasks
        ),
        format!("progress: {}%", stats.overall_progress),
    ];
    let by_priority: Vec<String> = stats
        .tasks_by_priority
        .iter()
        .map(|p| format!("{} {}", p.priority, p.count))
        .collect();
    if !by_priority.is_empty() {
        lines.push(format!("by priority: {}", by_priority.join(", ")));
    }
    let by_category: Vec<String> = stats
        .tasks_by_category
        .iter()
        .map(|c| format!("{} {}", c.category, c.count))
        .collect();
    if !by_category.is_empty() {
        lines.push(format!("by category: {}", by_category.join(", ")));
    }
    lines
}

fn format_dashboard(view: &DashboardView) -> Vec<String> {
    let mut lines = view
        .stats
        .as_ref()
        .map_or_else(|| vec!["statistics unavailable".to_string()], format_stats);
    lines.push("upcoming:".to_string());
    lines.extend(view.upcoming.iter().map(format_row));
    lines.push("recently completed:".to_string());
    lines.extend(view.recently_completed.iter().map(format_row));
    lines
}
