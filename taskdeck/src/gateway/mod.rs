//! Remote API abstraction for `Taskdeck`.
//!
//! Defines the [`TaskGateway`], [`DashboardSource`] and [`AuthApi`] traits
//! the client core talks to. Concrete implementations include:
//! - [`graphql::GraphqlGateway`] -- GraphQL calls over a pluggable transport
//! - [`memory::InMemoryGateway`] -- in-process API for local use and tests
//!
//! Gateways never retry. An authorization failure is reported as
//! [`GatewayError::Unauthorized`] and the caller decides how to
//! re-authenticate.

pub mod graphql;
pub mod memory;

use std::fmt;

use taskdeck_proto::auth::{Credentials, Registration, TokenPair};
use taskdeck_proto::dashboard::DashboardStats;
use taskdeck_proto::draft::{FieldErrors, NewTask};
use taskdeck_proto::query::{Pagination, TaskFilter, TaskSort};
use taskdeck_proto::task::{Task, TaskId, TaskPatch};

/// Coarse classification of a [`GatewayError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    /// The API could not be reached.
    Network,
    /// The API rejected the input.
    Validation,
    /// Credentials are missing, expired or rejected.
    Unauthorized,
    /// The addressed record does not exist.
    NotFound,
    /// Anything else.
    Unknown,
}

impl fmt::Display for GatewayErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Validation => write!(f, "validation"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::NotFound => write!(f, "not found"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Errors returned by remote API calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// The server rejected the input, possibly with per-field detail.
    #[error("{message}")]
    Validation {
        /// Server message.
        message: String,
        /// Per-field messages, may be empty.
        fields: FieldErrors,
    },

    /// Credentials were rejected. The caller must re-authenticate.
    #[error("not authorized: {0}")]
    Unauthorized(String),

    /// The record does not exist on the server.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other server or decoding failure.
    #[error("{0}")]
    Unknown(String),
}

impl GatewayError {
    /// The error's classification.
    #[must_use]
    pub const fn kind(&self) -> GatewayErrorKind {
        match self {
            Self::Network(_) => GatewayErrorKind::Network,
            Self::Validation { .. } => GatewayErrorKind::Validation,
            Self::Unauthorized(_) => GatewayErrorKind::Unauthorized,
            Self::NotFound(_) => GatewayErrorKind::NotFound,
            Self::Unknown(_) => GatewayErrorKind::Unknown,
        }
    }

    /// Server-side field errors to re-surface on a form.
    #[must_use]
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Validation { fields, .. } if !fields.is_empty() => Some(fields),
            _ => None,
        }
    }

    /// Whether the caller should trigger re-authentication.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

/// Task lifecycle calls against the remote API.
pub trait TaskGateway: Send + Sync {
    /// One page of tasks matching `filter`, in `sort` order when given.
    fn list(
        &self,
        filter: &TaskFilter,
        page: Pagination,
        sort: Option<&TaskSort>,
    ) -> impl std::future::Future<Output = Result<Vec<Task>, GatewayError>> + Send;

    /// Creates a task and returns the authoritative record.
    fn create(
        &self,
        task: &NewTask,
    ) -> impl std::future::Future<Output = Result<Task, GatewayError>> + Send;

    /// Applies `patch` and returns the authoritative record.
    fn update(
        &self,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> impl std::future::Future<Output = Result<Task, GatewayError>> + Send;

    /// Deletes a task.
    fn delete(
        &self,
        id: &TaskId,
    ) -> impl std::future::Future<Output = Result<(), GatewayError>> + Send;
}

/// Precomputed dashboard aggregates.
pub trait DashboardSource: Send + Sync {
    /// Fetches the current dashboard statistics.
    fn dashboard(
        &self,
    ) -> impl std::future::Future<Output = Result<DashboardStats, GatewayError>> + Send;
}

/// Token issuance.
pub trait AuthApi: Send + Sync {
    /// Exchanges credentials for a token pair.
    fn login(
        &self,
        credentials: &Credentials,
    ) -> impl std::future::Future<Output = Result<TokenPair, GatewayError>> + Send;

    /// Creates an account and returns a token pair.
    fn register(
        &self,
        registration: &Registration,
    ) -> impl std::future::Future<Output = Result<TokenPair, GatewayError>> + Send;

    /// Exchanges a refresh token for a fresh pair.
    fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> impl std::future::Future<Output = Result<TokenPair, GatewayError>> + Send;
}
