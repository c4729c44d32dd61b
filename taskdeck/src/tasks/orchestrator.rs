//! Mutation pipeline between the presentation layer and the remote API.
//!
//! [`TaskStore`] drives each user action through
//! validate -> optimistic apply -> gateway call -> commit or rollback, and
//! reports the outcome on a notification channel. The canonical set stays
//! queryable throughout: the engine lock is only held for synchronous
//! steps, never across a gateway call.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use taskdeck_proto::dashboard::DashboardStats;
use taskdeck_proto::draft::{FieldErrors, TaskDraft};
use taskdeck_proto::query::{Pagination, SortSpec, TaskFilter, TaskSort};
use taskdeck_proto::task::{Task, TaskId, TaskPatch, TaskStatus, TempId};

use super::engine::{EngineError, HydrateSource, OptimisticOp, ReconciliationEngine};
use super::notification::{MutationAction, Notification};
use super::projection::{self, DashboardView, ListParams, TaskListView};
use crate::config::StoreConfig;
use crate::gateway::{DashboardSource, GatewayError, TaskGateway};
use crate::session::Session;

/// Upper bound on list pages fetched during hydration.
const MAX_HYDRATE_PAGES: u32 = 1_000;

/// Errors returned to the caller of a mutation.
///
/// Every failure after the optimistic step has already been rolled back
/// and reported on the notification channel when this is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    /// Input failed validation; nothing was changed.
    #[error("invalid input: {0}")]
    Invalid(FieldErrors),

    /// The server refused or could not be reached; the change was rolled back.
    #[error("{0}")]
    Rejected(GatewayError),

    /// Credentials were rejected; the session has been signed out.
    #[error("sign-in required")]
    ReauthRequired,

    /// No task with this id.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The task is still waiting for its create to be confirmed.
    #[error("task {0} has not been saved yet")]
    NotCommitted(TaskId),

    /// The temporary id collided with an in-flight change.
    #[error("temporary id {0} already in use")]
    DuplicateTempId(TempId),

    /// The store was shut down; the result was discarded.
    #[error("task store has shut down")]
    TornDown,
}

impl From<EngineError> for MutationError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::TaskNotFound(id) => Self::NotFound(id),
            EngineError::PlaceholderNotCommitted(id) => Self::NotCommitted(id),
            EngineError::DuplicateTempId(temp) => Self::DuplicateTempId(temp),
        }
    }
}

/// The client core's outward surface: canonical set, views and mutations.
pub struct TaskStore<G: TaskGateway> {
    /// `None` after [`shutdown`](Self::shutdown).
    engine: Mutex<Option<ReconciliationEngine>>,
    gateway: Arc<G>,
    session: Arc<Session>,
    event_tx: mpsc::Sender<Notification>,
    config: StoreConfig,
}

impl<G: TaskGateway> TaskStore<G> {
    /// Creates a store over `engine` and the notification receiver.
    #[must_use]
    pub fn new(
        engine: ReconciliationEngine,
        gateway: Arc<G>,
        session: Arc<Session>,
        config: StoreConfig,
    ) -> (Self, mpsc::Receiver<Notification>) {
        let (event_tx, event_rx) = mpsc::channel(config.notification_buffer.max(1));
        (
            Self {
                engine: Mutex::new(Some(engine)),
                gateway,
                session,
                event_tx,
                config,
            },
            event_rx,
        )
    }

    /// The gateway this store calls.
    #[must_use]
    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    // -----------------------------------------------------------------------
    // Startup
    // -----------------------------------------------------------------------

    /// Loads the canonical set from the remote list, falling back to cache.
    ///
    /// A failed fetch is reported as [`Notification::WorkingOffline`], or as
    /// [`Notification::ReauthRequired`] after signing out when the token was
    /// rejected. Either way the cached set is used.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError::TornDown`] after shutdown.
    pub async fn hydrate(&self) -> Result<HydrateSource, MutationError> {
        let cached = self.with_engine(|engine| engine.load_cache())?;
        let remote = match self.fetch_all().await {
            Ok(tasks) => tasks,
            Err(err) => {
                if err.is_unauthorized() {
                    self.reauthenticate(&err);
                } else {
                    tracing::warn!(error = %err, "task list unavailable, using cache");
                    self.notify(Notification::WorkingOffline {
                        reason: err.to_string(),
                    });
                }
                Vec::new()
            }
        };
        let source = self.finish(|engine| engine.hydrate(remote, cached))?;
        tracing::info!(?source, "tasks loaded");
        Ok(source)
    }

    async fn fetch_all(&self) -> Result<Vec<Task>, GatewayError> {
        let filter = TaskFilter::default();
        let sort = TaskSort::from_spec(SortSpec::default());
        let mut page = Pagination::first(self.config.page_size.max(1));
        let mut tasks = Vec::new();

        for _ in 0..MAX_HYDRATE_PAGES {
            let batch = self.gateway.list(&filter, page, sort.as_ref()).await?;
            let short = batch.len() < usize::try_from(page.take).unwrap_or(usize::MAX);
            tasks.extend(batch);
            if short {
                return Ok(tasks);
            }
            page = page.next();
        }
        tracing::warn!(count = tasks.len(), "task list truncated at page limit");
        Ok(tasks)
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Creates a task from a form draft.
    ///
    /// The optimistic record appears at the front of the set under a
    /// placeholder id until the server confirms it.
    ///
    /// # Errors
    ///
    /// [`MutationError::Invalid`] with every failing field, or a
    /// rolled-back gateway failure.
    pub async fn create(&self, draft: &TaskDraft) -> Result<Task, MutationError> {
        let now = Utc::now();
        let new = draft.validate(now).map_err(MutationError::Invalid)?;
        let temp = TempId::new();
        self.with_engine(|engine| {
            engine.apply_optimistic(temp, OptimisticOp::Create(new.clone()), now)
        })??;

        match self.gateway.create(&new).await {
            Ok(record) => {
                self.finish(|engine| engine.commit(temp, record.clone()))?;
                tracing::info!(task_id = %record.id, "task created");
                self.notify(Notification::TaskCreated {
                    id: record.id.clone(),
                    title: record.title.clone(),
                });
                Ok(record)
            }
            Err(err) => Err(self.fail(temp, MutationAction::Create, err)),
        }
    }

    /// Applies a field edit.
    ///
    /// # Errors
    ///
    /// [`MutationError::Invalid`] for an empty patch or bad title,
    /// [`MutationError::NotFound`] / [`MutationError::NotCommitted`] for an
    /// unusable id, or a rolled-back gateway failure.
    pub async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, MutationError> {
        patch.validate().map_err(MutationError::Invalid)?;
        self.patch(id, patch, MutationAction::Update).await
    }

    /// Sets a task's status.
    ///
    /// # Errors
    ///
    /// Same as [`update`](Self::update), without validation.
    pub async fn change_status(
        &self,
        id: &TaskId,
        status: TaskStatus,
    ) -> Result<Task, MutationError> {
        self.patch(id, TaskPatch::status(status), MutationAction::ChangeStatus)
            .await
    }

    /// Moves a task to the next status in the PENDING -> IN_PROGRESS ->
    /// COMPLETED -> PENDING cycle.
    ///
    /// # Errors
    ///
    /// Same as [`change_status`](Self::change_status).
    pub async fn advance_status(&self, id: &TaskId) -> Result<Task, MutationError> {
        let current = self
            .with_engine(|engine| engine.get(id).map(|t| t.status))?
            .ok_or_else(|| MutationError::NotFound(id.clone()))?;
        self.change_status(id, current.next()).await
    }

    /// Removes a task.
    ///
    /// # Errors
    ///
    /// [`MutationError::NotFound`] / [`MutationError::NotCommitted`] for an
    /// unusable id, or a rolled-back gateway failure.
    pub async fn delete(&self, id: &TaskId) -> Result<(), MutationError> {
        let temp = TempId::new();
        let title = self.with_engine(|engine| {
            let title = engine.get(id).map(|t| t.title.clone());
            engine
                .apply_optimistic(temp, OptimisticOp::Delete { id: id.clone() }, Utc::now())
                .map(|_| title.unwrap_or_default())
        })??;

        match self.gateway.delete(id).await {
            Ok(()) => {
                self.finish(|engine| engine.commit_removal(temp))?;
                tracing::info!(task_id = %id, "task deleted");
                self.notify(Notification::TaskDeleted {
                    id: id.clone(),
                    title,
                });
                Ok(())
            }
            Err(err) => Err(self.fail(temp, MutationAction::Delete, err)),
        }
    }

    async fn patch(
        &self,
        id: &TaskId,
        patch: TaskPatch,
        action: MutationAction,
    ) -> Result<Task, MutationError> {
        let temp = TempId::new();
        let completes = patch.status == Some(TaskStatus::Completed);
        self.with_engine(|engine| {
            engine.apply_optimistic(
                temp,
                OptimisticOp::Update {
                    id: id.clone(),
                    patch: patch.clone(),
                },
                Utc::now(),
            )
        })??;

        match self.gateway.update(id, &patch).await {
            Ok(record) => {
                self.finish(|engine| engine.commit(temp, record.clone()))?;
                tracing::info!(task_id = %record.id, %action, "task updated");
                let (id, title) = (record.id.clone(), record.title.clone());
                self.notify(if completes {
                    Notification::TaskCompleted { id, title }
                } else {
                    Notification::TaskUpdated { id, title }
                });
                Ok(record)
            }
            Err(err) => Err(self.fail(temp, action, err)),
        }
    }

    /// Rolls back `temp` and turns `err` into the caller's error.
    fn fail(&self, temp: TempId, action: MutationAction, err: GatewayError) -> MutationError {
        if let Err(torn_down) = self.finish(|engine| engine.rollback(temp)) {
            return torn_down;
        }
        if err.is_unauthorized() {
            self.reauthenticate(&err);
            return MutationError::ReauthRequired;
        }
        tracing::warn!(%action, kind = %err.kind(), error = %err, "mutation rolled back");
        self.notify(Notification::MutationFailed {
            action,
            message: err.to_string(),
        });
        MutationError::Rejected(err)
    }

    fn reauthenticate(&self, err: &GatewayError) {
        tracing::warn!(error = %err, "credentials rejected, signing out");
        self.session.sign_out();
        self.notify(Notification::ReauthRequired);
    }

    fn notify(&self, notification: Notification) {
        if let Err(e) = self.event_tx.try_send(notification) {
            tracing::debug!(error = %e, "notification dropped");
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Snapshot of the canonical set, optimistic records included.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError::TornDown`] after shutdown.
    pub fn tasks(&self) -> Result<Vec<Task>, MutationError> {
        self.with_engine(|engine| engine.tasks().to_vec())
    }

    /// The filtered, searched and sorted list as of `now`.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError::TornDown`] after shutdown.
    pub fn list_view(
        &self,
        params: &ListParams,
        now: DateTime<Utc>,
    ) -> Result<TaskListView, MutationError> {
        self.with_engine(|engine| {
            projection::task_list_view(engine.tasks(), params, now, |id| engine.is_pending(id))
        })
    }

    /// Remote `stats` next to the local upcoming and recently completed
    /// subsets as of `now`.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError::TornDown`] after shutdown.
    pub fn dashboard_view(
        &self,
        stats: Option<DashboardStats>,
        now: DateTime<Utc>,
    ) -> Result<DashboardView, MutationError> {
        let limits = (
            self.config.upcoming_limit,
            self.config.recently_completed_limit,
        );
        self.with_engine(|engine| {
            projection::dashboard_view(engine.tasks(), stats, limits, now, |id| {
                engine.is_pending(id)
            })
        })
    }

    /// Number of unconfirmed changes.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.engine
            .lock()
            .as_ref()
            .map_or(0, ReconciliationEngine::pending_count)
    }

    /// Whether the last cache write failed.
    #[must_use]
    pub fn cache_is_stale(&self) -> bool {
        self.engine
            .lock()
            .as_ref()
            .is_some_and(ReconciliationEngine::cache_is_stale)
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    /// Drops the canonical set.
    ///
    /// In-flight mutations are not awaited; when they resume they find no
    /// set and discard their results.
    pub fn shutdown(&self) {
        if let Some(engine) = self.engine.lock().take() {
            tracing::info!(pending = engine.pending_count(), "task store shut down");
        }
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.engine.lock().is_none()
    }

    fn with_engine<R>(
        &self,
        f: impl FnOnce(&mut ReconciliationEngine) -> R,
    ) -> Result<R, MutationError> {
        self.engine
            .lock()
            .as_mut()
            .map(f)
            .ok_or(MutationError::TornDown)
    }

    /// Like `with_engine`, for continuations resuming after a gateway call.
    fn finish<R>(
        &self,
        f: impl FnOnce(&mut ReconciliationEngine) -> R,
    ) -> Result<R, MutationError> {
        self.with_engine(f).inspect_err(|_| {
            tracing::debug!("store shut down while a call was in flight, result discarded");
        })
    }
}

impl<G: TaskGateway + DashboardSource> TaskStore<G> {
    /// Fetches the remote dashboard statistics.
    ///
    /// # Errors
    ///
    /// [`MutationError::ReauthRequired`] after signing out when the token is
    /// rejected, otherwise [`MutationError::Rejected`].
    pub async fn fetch_dashboard(&self) -> Result<DashboardStats, MutationError> {
        match self.gateway.dashboard().await {
            Ok(stats) => Ok(stats),
            Err(err) if err.is_unauthorized() => {
                self.reauthenticate(&err);
                Err(MutationError::ReauthRequired)
            }
            Err(err) => {
                tracing::warn!(error = %err, "dashboard unavailable");
                Err(MutationError::Rejected(err))
            }
        }
    }
}

impl<G: TaskGateway> std::fmt::Debug for TaskStore<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStore")
            .field("pending", &self.pending_count())
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}
