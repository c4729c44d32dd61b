//! User-facing notifications emitted by the mutation pipeline.

use taskdeck_proto::task::TaskId;

/// Which user action a notification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationAction {
    /// New task.
    Create,
    /// Field edit.
    Update,
    /// Status change or advance.
    ChangeStatus,
    /// Removal.
    Delete,
}

impl std::fmt::Display for MutationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "create task"),
            Self::Update => write!(f, "update task"),
            Self::ChangeStatus => write!(f, "change task status"),
            Self::Delete => write!(f, "delete task"),
        }
    }
}

/// A transient message for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A create was confirmed by the server.
    TaskCreated {
        /// Server-assigned id.
        id: TaskId,
        /// Title of the new task.
        title: String,
    },
    /// An update or non-completing status change was confirmed.
    TaskUpdated {
        /// Task id.
        id: TaskId,
        /// Title after the update.
        title: String,
    },
    /// A status change to COMPLETED was confirmed.
    TaskCompleted {
        /// Task id.
        id: TaskId,
        /// Title of the completed task.
        title: String,
    },
    /// A delete was confirmed.
    TaskDeleted {
        /// Id of the removed task.
        id: TaskId,
        /// Title of the removed task.
        title: String,
    },
    /// A mutation was rolled back.
    MutationFailed {
        /// What the user tried to do.
        action: MutationAction,
        /// The gateway's message.
        message: String,
    },
    /// Credentials were rejected and have been cleared; the user must sign in.
    ReauthRequired,
    /// The remote task list could not be fetched; showing cached tasks.
    WorkingOffline {
        /// Why the fetch failed.
        reason: String,
    },
}

impl Notification {
    /// Short headline.
    #[must_use]
    pub fn headline(&self) -> String {
        match self {
            Self::TaskCreated { .. } => "Task created!".to_string(),
            Self::TaskUpdated { .. } => "Task updated!".to_string(),
            Self::TaskCompleted { .. } => "Task completed! 🎉".to_string(),
            Self::TaskDeleted { .. } => "Task deleted!".to_string(),
            Self::MutationFailed { action, .. } => format!("Failed to {action}"),
            Self::ReauthRequired => "Session expired".to_string(),
            Self::WorkingOffline { .. } => "Working offline".to_string(),
        }
    }

    /// Longer description.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::TaskCreated { .. } => "Your new task has been added successfully.".to_string(),
            Self::TaskUpdated { .. } => "Your task has been updated successfully.".to_string(),
            Self::TaskCompleted { title, .. } => format!("Great job completing \"{title}\"!"),
            Self::TaskDeleted { .. } => "The task has been removed successfully.".to_string(),
            Self::MutationFailed { message, .. } => message.clone(),
            Self::ReauthRequired => "Please sign in again.".to_string(),
            Self::WorkingOffline { reason } => format!("Showing cached tasks ({reason})."),
        }
    }

    /// Whether this reports a failure.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(
            self,
            Self::MutationFailed { .. } | Self::ReauthRequired | Self::WorkingOffline { .. }
        )
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.headline(), self.detail())
    }
}
