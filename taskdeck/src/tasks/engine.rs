//! Canonical task set and the optimistic mutation protocol.
//!
//! [`ReconciliationEngine`] owns the in-memory task set. Every change is
//! tagged with a [`TempId`] when applied optimistically and later either
//! committed (the server's record replaces the local guess in full) or
//! rolled back (the change is taken out of the record's history). After each
//! change the full set is written through to the [`TaskCache`].
//!
//! Changes to one record may be in flight together and settle in any order.
//! The pending changes of a record form a chain on top of its last known
//! server value: settling one change rebuilds the rest of the chain, so the
//! visible record is always that value with the still-pending changes
//! replayed in the order they were applied.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use taskdeck_proto::draft::NewTask;
use taskdeck_proto::task::{Task, TaskId, TaskPatch, TempId};

use crate::cache::TaskCache;

/// Errors from [`ReconciliationEngine::apply_optimistic`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// No record with this id is in the set.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// The id belongs to a create that the server has not confirmed yet.
    #[error("task {0} has not been saved yet")]
    PlaceholderNotCommitted(TaskId),

    /// The temporary id is already tagging another operation.
    #[error("temporary id {0} already in use")]
    DuplicateTempId(TempId),
}

/// Which source won during [`ReconciliationEngine::hydrate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydrateSource {
    /// The non-empty remote list.
    Remote,
    /// The local cache, because the remote list was empty.
    Cache,
    /// Neither source had tasks.
    Empty,
}

/// A change applied before server confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptimisticOp {
    /// Insert a new record under a placeholder id.
    Create(NewTask),
    /// Patch an existing record.
    Update {
        /// Record to patch.
        id: TaskId,
        /// Fields to change.
        patch: TaskPatch,
    },
    /// Remove an existing record.
    Delete {
        /// Record to remove.
        id: TaskId,
    },
}

/// What is needed to undo or replay one optimistic change.
#[derive(Debug, Clone)]
enum PendingOp {
    /// A placeholder record was inserted.
    Insert { id: TaskId },
    /// A record was patched at `at`; `before` is the value it was applied to.
    Patch {
        id: TaskId,
        before: Task,
        patch: TaskPatch,
        at: DateTime<Utc>,
    },
    /// A record was removed; `before` is its value at removal.
    Remove { before: Task },
}

impl PendingOp {
    fn references(&self, id: &TaskId) -> bool {
        match self {
            Self::Insert { id: own } | Self::Patch { id: own, .. } => own == id,
            Self::Remove { before } => &before.id == id,
        }
    }
}

/// Owner of the canonical task set.
///
/// Ids are unique in the set at all times. Records keep their display
/// order: hydrated records in source order, new records at the front.
#[derive(Debug)]
pub struct ReconciliationEngine {
    tasks: Vec<Task>,
    /// Display order of the visible records plus those removed optimistically
    /// and not yet confirmed, so a rolled-back removal finds its slot again.
    layout: Vec<TaskId>,
    /// Unconfirmed changes in the order they were applied.
    pending: Vec<(TempId, PendingOp)>,
    cache: TaskCache,
}

impl ReconciliationEngine {
    /// An empty engine persisting to `cache`.
    #[must_use]
    pub fn new(cache: TaskCache) -> Self {
        Self {
            tasks: Vec::new(),
            layout: Vec::new(),
            pending: Vec::new(),
            cache,
        }
    }

    /// Reads the cached set for [`hydrate`](Self::hydrate).
    #[must_use]
    pub fn load_cache(&self) -> Vec<Task> {
        self.cache.load()
    }

    /// Replaces the canonical set at startup.
    ///
    /// `remote` wins whenever it is non-empty; otherwise `cached` is used.
    /// The sources are never merged. Duplicate ids keep their first
    /// occurrence, and unconfirmed placeholders left in the cache by an
    /// interrupted session are dropped. Pending operations are discarded.
    pub fn hydrate(&mut self, remote: Vec<Task>, cached: Vec<Task>) -> HydrateSource {
        let (source, tasks) = if !remote.is_empty() {
            (HydrateSource::Remote, remote)
        } else {
            let before = cached.len();
            let kept: Vec<Task> = cached
                .into_iter()
                .filter(|t| !t.id.is_placeholder())
                .collect();
            if kept.len() < before {
                tracing::info!(
                    dropped = before - kept.len(),
                    "discarded unconfirmed tasks from cache"
                );
            }
            let source = if kept.is_empty() {
                HydrateSource::Empty
            } else {
                HydrateSource::Cache
            };
            (source, kept)
        };

        self.tasks = dedup_by_id(tasks);
        self.layout = self.tasks.iter().map(|t| t.id.clone()).collect();
        self.pending.clear();
        tracing::debug!(?source, count = self.tasks.len(), "task set hydrated");
        self.persist();
        source
    }

    /// Applies `op` immediately and tags it with `temp`.
    ///
    /// Returns the record as it now stands in the set, `None` for deletes.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if `temp` is already in use, or if an update
    /// or delete addresses an unknown id or an unconfirmed placeholder. The
    /// set is untouched on error.
    pub fn apply_optimistic(
        &mut self,
        temp: TempId,
        op: OptimisticOp,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>, EngineError> {
        if self.position_of(temp).is_some() {
            return Err(EngineError::DuplicateTempId(temp));
        }

        let (pending, record) = match op {
            OptimisticOp::Create(new) => {
                let id = TaskId::placeholder(&temp);
                let task = new.to_task(id.clone(), now);
                self.tasks.insert(0, task.clone());
                self.layout.insert(0, id.clone());
                (PendingOp::Insert { id }, Some(task))
            }
            OptimisticOp::Update { id, patch } => {
                let index = self.index_of_confirmed(&id)?;
                let before = self.tasks[index].clone();
                let after = patch.apply_to(&before, now);
                self.tasks[index] = after.clone();
                let pending = PendingOp::Patch {
                    id,
                    before,
                    patch,
                    at: now,
                };
                (pending, Some(after))
            }
            OptimisticOp::Delete { id } => {
                let index = self.index_of_confirmed(&id)?;
                let before = self.tasks.remove(index);
                (PendingOp::Remove { before }, None)
            }
        };

        tracing::debug!(temp_id = %temp, "optimistic change applied");
        self.pending.push((temp, pending));
        self.persist();
        Ok(record)
    }

    /// Replaces the optimistic record tagged `temp` with `record`.
    ///
    /// The authoritative record replaces the local guess in full; changes to
    /// the same record that are still pending are replayed on top of it.
    /// Returns `false` without changing anything when `temp` is unknown,
    /// which covers duplicate or late confirmations. For a delete, `record`
    /// is ignored and the removal stands.
    pub fn commit(&mut self, temp: TempId, record: Task) -> bool {
        let Some(position) = self.position_of(temp) else {
            tracing::debug!(temp_id = %temp, "stale confirmation ignored");
            return false;
        };

        match self.pending.remove(position).1 {
            PendingOp::Insert { id } => {
                if let Some(index) = self.index_of(&id) {
                    self.relabel(&id, &record.id);
                    self.tasks[index] = record;
                    self.dedup_around(index);
                } else {
                    tracing::debug!(task_id = %id, "committed record no longer in set, skipped");
                }
            }
            PendingOp::Patch { id, .. } => self.replay(&id, record, 0),
            PendingOp::Remove { before } => self.forget_removed(&before.id),
        }

        tracing::debug!(temp_id = %temp, "optimistic change committed");
        self.persist();
        true
    }

    /// Confirms a delete tagged `temp`.
    ///
    /// Returns `false` when `temp` is unknown or tags a non-delete.
    pub fn commit_removal(&mut self, temp: TempId) -> bool {
        let Some(position) = self.position_of(temp) else {
            return false;
        };
        if let (_, PendingOp::Remove { before }) = &self.pending[position] {
            let id = before.id.clone();
            self.pending.remove(position);
            self.forget_removed(&id);
            tracing::debug!(temp_id = %temp, "removal committed");
            true
        } else {
            tracing::warn!(temp_id = %temp, "removal commit for a non-delete ignored");
            false
        }
    }

    /// Reverts the change tagged `temp`.
    ///
    /// Inserted records are removed and removed records return to their
    /// former position. A patch is taken out of its record's history: the
    /// record returns to the value the patch was applied to, with any later
    /// pending changes replayed on top. Returns `false` when `temp` is
    /// unknown.
    pub fn rollback(&mut self, temp: TempId) -> bool {
        let Some(position) = self.position_of(temp) else {
            return false;
        };

        match self.pending.remove(position).1 {
            PendingOp::Insert { id } => {
                self.tasks.retain(|t| t.id != id);
                self.layout.retain(|l| l != &id);
            }
            PendingOp::Patch { id, before, .. } => self.replay(&id, before, position),
            PendingOp::Remove { before } => {
                if self.index_of(&before.id).is_none() {
                    let index = self.restore_index(&before.id);
                    self.tasks.insert(index, before);
                }
            }
        }

        tracing::debug!(temp_id = %temp, "optimistic change rolled back");
        self.persist();
        true
    }

    /// The canonical set in display order.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// The record with `id`.
    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    /// Whether an unconfirmed operation references `id`.
    #[must_use]
    pub fn is_pending(&self, id: &TaskId) -> bool {
        self.pending.iter().any(|(_, op)| op.references(id))
    }

    /// Number of unconfirmed operations.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Whether the last cache write failed.
    #[must_use]
    pub fn cache_is_stale(&self) -> bool {
        self.cache.is_stale()
    }

    fn position_of(&self, temp: TempId) -> Option<usize> {
        self.pending.iter().position(|(own, _)| *own == temp)
    }

    fn index_of(&self, id: &TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| &t.id == id)
    }

    fn index_of_confirmed(&self, id: &TaskId) -> Result<usize, EngineError> {
        if id.is_placeholder() {
            return Err(EngineError::PlaceholderNotCommitted(id.clone()));
        }
        self.index_of(id)
            .ok_or_else(|| EngineError::TaskNotFound(id.clone()))
    }

    /// Rebuilds the chain of pending changes to `id` from `pending[from..]`
    /// on top of `base`, then shows the result unless a pending removal
    /// hides the record.
    fn replay(&mut self, id: &TaskId, mut base: Task, from: usize) {
        for (_, op) in self.pending.iter_mut().skip(from) {
            match op {
                PendingOp::Patch {
                    id: own,
                    before,
                    patch,
                    at,
                } if own == id => {
                    *before = base;
                    base = patch.apply_to(before, *at);
                }
                PendingOp::Remove { before } if &before.id == id => {
                    *before = base;
                    return;
                }
                _ => {}
            }
        }
        match self.index_of(id) {
            Some(index) => self.tasks[index] = base,
            // Removal already confirmed while the request was in flight.
            None => tracing::debug!(task_id = %id, "settled record no longer in set, skipped"),
        }
    }

    /// Index in `tasks` for a record returning to its `layout` slot.
    fn restore_index(&self, id: &TaskId) -> usize {
        let Some(slot) = self.layout.iter().position(|l| l == id) else {
            return self.tasks.len();
        };
        let visible: HashSet<&TaskId> = self.tasks.iter().map(|t| &t.id).collect();
        self.layout[..slot]
            .iter()
            .filter(|l| visible.contains(l))
            .count()
    }

    /// Drops the layout slot of a record whose removal is final.
    fn forget_removed(&mut self, id: &TaskId) {
        if self.index_of(id).is_none() {
            self.layout.retain(|l| l != id);
        }
    }

    /// Moves the layout slot of `from` to `to`, dropping any other slot of `to`.
    fn relabel(&mut self, from: &TaskId, to: &TaskId) {
        let Some(slot) = self.layout.iter().position(|l| l == from) else {
            return;
        };
        self.layout[slot] = to.clone();
        let mut index = 0;
        self.layout.retain(|l| {
            let keep = index == slot || l != to;
            index += 1;
            keep
        });
    }

    /// Removes any other record sharing the id of the record at `keep`.
    fn dedup_around(&mut self, keep: usize) {
        let id = self.tasks[keep].id.clone();
        let mut index = 0;
        self.tasks.retain(|t| {
            let retain = index == keep || t.id != id;
            index += 1;
            retain
        });
    }

    fn persist(&self) {
        self.cache.write_through(&self.tasks);
    }
}

/// Keeps the first record per id, logging the rest.
fn dedup_by_id(tasks: Vec<Task>) -> Vec<Task> {
    let mut seen = HashSet::new();
    tasks
        .into_iter()
        .filter(|t| {
            let first = seen.insert(t.id.clone());
            if !first {
                tracing::warn!(task_id = %t.id, "duplicate task id dropped");
            }
            first
        })
        .collect()
}
