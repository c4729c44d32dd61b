//! In-process implementation of the remote API.
//!
//! [`InMemoryGateway`] keeps tasks in memory and behaves like the remote
//! service: it assigns ids and timestamps, filters, sorts and pages the list
//! query, aggregates the dashboard, and issues tokens. Switches simulate an
//! unreachable server, rejected credentials, one-off failures, and held
//! responses for observing the optimistic window.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, watch};
use uuid::Uuid;

use taskdeck_proto::auth::{Credentials, Registration, TokenPair};
use taskdeck_proto::dashboard::{CategoryCount, DashboardStats, PriorityCount};
use taskdeck_proto::draft::{FieldErrors, NewTask};
use taskdeck_proto::query::{Pagination, SortDirection, TaskFilter, TaskSort};
use taskdeck_proto::task::{Category, Priority, Task, TaskId, TaskPatch, TaskStatus};

use super::{AuthApi, DashboardSource, GatewayError, TaskGateway};

/// In-memory stand-in for the remote task, dashboard and auth APIs.
pub struct InMemoryGateway {
    tasks: Mutex<Vec<Task>>,
    offline: AtomicBool,
    unauthorized: AtomicBool,
    fail_next: parking_lot::Mutex<Option<GatewayError>>,
    hold_tx: watch::Sender<bool>,
    calls: AtomicU64,
}

impl InMemoryGateway {
    /// An empty, reachable gateway.
    #[must_use]
    pub fn new() -> Self {
        Self::with_tasks(Vec::new())
    }

    /// A gateway pre-populated with `tasks`.
    #[must_use]
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let (hold_tx, _) = watch::channel(false);
        Self {
            tasks: Mutex::new(tasks),
            offline: AtomicBool::new(false),
            unauthorized: AtomicBool::new(false),
            fail_next: parking_lot::Mutex::new(None),
            hold_tx,
            calls: AtomicU64::new(0),
        }
    }

    /// Makes every call fail with [`GatewayError::Network`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Makes every call fail with [`GatewayError::Unauthorized`].
    pub fn set_unauthorized(&self, unauthorized: bool) {
        self.unauthorized.store(unauthorized, Ordering::SeqCst);
    }

    /// Fails the next call with `err`.
    pub fn fail_next(&self, err: GatewayError) {
        *self.fail_next.lock() = Some(err);
    }

    /// Holds every call until [`release`](Self::release).
    pub fn hold(&self) {
        self.hold_tx.send_replace(true);
    }

    /// Lets held and future calls proceed.
    pub fn release(&self) {
        self.hold_tx.send_replace(false);
    }

    /// Number of calls received, including failed ones.
    #[must_use]
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// The server-side task list.
    pub async fn tasks(&self) -> Vec<Task> {
        self.tasks.lock().await.clone()
    }

    /// Common entry: counts the call, waits while held, then applies the
    /// failure switches.
    async fn enter(&self) -> Result<(), GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut held = self.hold_tx.subscribe();
        // The sender lives in `self`, so this cannot observe a closed channel.
        let _ = held.wait_for(|held| !*held).await;

        if let Some(err) = self.fail_next.lock().take() {
            return Err(err);
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(GatewayError::Network("server unreachable".to_string()));
        }
        if self.unauthorized.load(Ordering::SeqCst) {
            return Err(GatewayError::Unauthorized("token rejected".to_string()));
        }
        Ok(())
    }

    fn issue_tokens() -> TokenPair {
        TokenPair::new(
            format!("access-{}", Uuid::now_v7()),
            format!("refresh-{}", Uuid::now_v7()),
        )
    }
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

fn sort_tasks(tasks: &mut [Task], sort: &TaskSort) {
    // Applied last-to-first so the earliest set key is the primary order.
    let keyed: [(Option<SortDirection>, fn(&Task) -> DateTime<Utc>); 3] = [
        (sort.due_date, |t| t.due_date),
        (sort.created_at, |t| t.created_at),
        (sort.updated_at, |t| t.updated_at),
    ];
    for (direction, key) in keyed.into_iter().rev() {
        let Some(direction) = direction else {
            continue;
        };
        tasks.sort_by(|a, b| {
            let ord = key(a).cmp(&key(b));
            match direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        });
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let raw = part as f64 * 100.0 / whole as f64;
    (raw * 100.0).round() / 100.0
}

impl TaskGateway for InMemoryGateway {
    async fn list(
        &self,
        filter: &TaskFilter,
        page: Pagination,
        sort: Option<&TaskSort>,
    ) -> Result<Vec<Task>, GatewayError> {
        self.enter().await?;
        let mut matching: Vec<Task> = self
            .tasks
            .lock()
            .await
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        if let Some(sort) = sort {
            sort_tasks(&mut matching, sort);
        }
        Ok(matching
            .into_iter()
            .skip(page.skip as usize)
            .take(page.take as usize)
            .collect())
    }

    async fn create(&self, task: &NewTask) -> Result<Task, GatewayError> {
        self.enter().await?;
        if task.title.trim().is_empty() {
            let fields: FieldErrors = [("title", "Title is required")].into_iter().collect();
            return Err(GatewayError::Validation {
                message: "Invalid task input".to_string(),
                fields,
            });
        }
        let now = Utc::now();
        let record = task.to_task(TaskId::new(format!("task-{}", Uuid::now_v7())), now);
        self.tasks.lock().await.insert(0, record.clone());
        Ok(record)
    }

    async fn update(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, GatewayError> {
        self.enter().await?;
        let mut tasks = self.tasks.lock().await;
        let slot = tasks
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| GatewayError::NotFound(format!("task {id}")))?;
        *slot = patch.apply_to(slot, Utc::now());
        Ok(slot.clone())
    }

    async fn delete(&self, id: &TaskId) -> Result<(), GatewayError> {
        self.enter().await?;
        let mut tasks = self.tasks.lock().await;
        let before = tasks.len();
        tasks.retain(|t| &t.id != id);
        if tasks.len() == before {
            return Err(GatewayError::NotFound(format!("task {id}")));
        }
        Ok(())
    }
}

impl DashboardSource for InMemoryGateway {
    async fn dashboard(&self) -> Result<DashboardStats, GatewayError> {
        self.enter().await?;
        let tasks = self.tasks.lock().await;
        let count = |pred: &dyn Fn(&Task) -> bool| tasks.iter().filter(|t| pred(t)).count() as u64;

        let total_tasks = tasks.len() as u64;
        let completed_tasks = count(&|t| t.status == TaskStatus::Completed);
        Ok(DashboardStats {
            total_tasks,
            completed_tasks,
            pending_tasks: count(&|t| t.status == TaskStatus::Pending),
            in_progress_tasks: count(&|t| t.status == TaskStatus::InProgress),
            total_users: 1,
            active_users: 1,
            inactive_users: 0,
            tasks_by_category: Category::ALL
                .into_iter()
                .map(|category| CategoryCount {
                    category,
                    count: count(&|t| t.category == category),
                })
                .filter(|c| c.count > 0)
                .collect(),
            tasks_by_priority: Priority::ALL
                .into_iter()
                .map(|priority| PriorityCount {
                    priority,
                    count: count(&|t| t.priority == priority),
                })
                .filter(|p| p.count > 0)
                .collect(),
            overall_progress: percent(completed_tasks, total_tasks),
        })
    }
}

impl AuthApi for InMemoryGateway {
    async fn login(&self, credentials: &Credentials) -> Result<TokenPair, GatewayError> {
        self.enter().await?;
        if credentials.email.trim().is_empty() || credentials.password.is_empty() {
            return Err(GatewayError::Unauthorized("invalid credentials".to_string()));
        }
        Ok(Self::issue_tokens())
    }

    async fn register(&self, registration: &Registration) -> Result<TokenPair, GatewayError> {
        self.enter().await?;
        let mut fields = FieldErrors::new();
        if registration.name.trim().is_empty() {
            fields.insert("name", "Name is required");
        }
        if !registration.email.contains('@') {
            fields.insert("email", "Email is invalid");
        }
        if registration.password.len() < 6 {
            fields.insert("password", "Password must be at least 6 characters");
        }
        if !fields.is_empty() {
            return Err(GatewayError::Validation {
                message: "Invalid registration".to_string(),
                fields,
            });
        }
        Ok(Self::issue_tokens())
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, GatewayError> {
        self.enter().await?;
        if refresh_token.is_empty() {
            return Err(GatewayError::Unauthorized("missing refresh token".to_string()));
        }
        Ok(Self::issue_tokens())
    }
}
