//! GraphQL implementation of the gateway traits.
//!
//! [`GraphqlGateway`] builds requests from `taskdeck_proto::graphql`,
//! attaches the session's bearer token, and maps replies onto
//! [`GatewayError`]. Moving bytes is delegated to a [`GraphqlTransport`],
//! so the gateway carries no HTTP stack of its own.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use taskdeck_proto::auth::{Credentials, Registration, TokenPair};
use taskdeck_proto::dashboard::DashboardStats;
use taskdeck_proto::draft::{FieldErrors, NewTask};
use taskdeck_proto::graphql::{CodecError, GraphqlError, GraphqlRequest, GraphqlResponse, codes};
use taskdeck_proto::query::{Pagination, TaskFilter, TaskSort};
use taskdeck_proto::task::{Task, TaskId, TaskPatch};

use super::{AuthApi, DashboardSource, GatewayError, TaskGateway};
use crate::session::Session;

/// HTTP status the API answers with when the bearer token is rejected.
const HTTP_UNAUTHORIZED: u16 = 401;

/// Errors from moving a GraphQL request over the wire.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection or I/O failure.
    #[error("transport I/O error: {0}")]
    Io(String),

    /// No response within the deadline.
    #[error("request timed out")]
    Timeout,

    /// Non-success HTTP status.
    #[error("HTTP {status}")]
    Http {
        /// Status code.
        status: u16,
    },

    /// The body was not a GraphQL reply.
    #[error("undecodable response: {0}")]
    Decode(#[from] CodecError),
}

impl From<TransportError> for GatewayError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Http {
                status: HTTP_UNAUTHORIZED,
            } => Self::Unauthorized(err.to_string()),
            TransportError::Io(_) | TransportError::Timeout => Self::Network(err.to_string()),
            TransportError::Http { .. } | TransportError::Decode(_) => {
                Self::Unknown(err.to_string())
            }
        }
    }
}

/// Executes one GraphQL request against the API endpoint.
pub trait GraphqlTransport: Send + Sync {
    /// Sends `request`, with `Authorization: Bearer <bearer>` when given.
    fn execute(
        &self,
        request: &GraphqlRequest,
        bearer: Option<&str>,
    ) -> impl std::future::Future<Output = Result<GraphqlResponse, TransportError>> + Send;
}

/// Gateway speaking the remote GraphQL API.
pub struct GraphqlGateway<T: GraphqlTransport> {
    transport: T,
    session: Arc<Session>,
}

impl<T: GraphqlTransport> GraphqlGateway<T> {
    /// Creates a gateway that authenticates with `session`'s bearer token.
    pub const fn new(transport: T, session: Arc<Session>) -> Self {
        Self { transport, session }
    }

    /// The underlying transport.
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    async fn call<R: DeserializeOwned>(
        &self,
        request: Result<GraphqlRequest, CodecError>,
        authenticated: bool,
    ) -> Result<R, GatewayError> {
        let request = request.map_err(|e| GatewayError::Unknown(e.to_string()))?;
        let bearer = if authenticated {
            self.session.access_token()
        } else {
            None
        };
        let response = self
            .transport
            .execute(&request, bearer.as_deref())
            .await
            .inspect_err(|e| {
                tracing::debug!(
                    operation = request.operation_name,
                    error = %e,
                    "graphql transport failed"
                );
            })?;

        if let Some(err) = map_errors(&response.errors) {
            tracing::debug!(
                operation = request.operation_name,
                kind = %err.kind(),
                "graphql call rejected"
            );
            return Err(err);
        }
        response
            .take_field(request.field)
            .map_err(|e| GatewayError::Unknown(e.to_string()))
    }
}

/// Collapses a reply's `errors` into one [`GatewayError`].
///
/// Authorization codes win over everything else, so a single rejected token
/// always triggers re-authentication. Validation entries are merged into one
/// field mapping.
fn map_errors(errors: &[GraphqlError]) -> Option<GatewayError> {
    let first = errors.first()?;

    if let Some(auth) = errors
        .iter()
        .find(|e| matches!(e.code(), Some(codes::UNAUTHORIZED | codes::UNAUTHENTICATED)))
    {
        return Some(GatewayError::Unauthorized(auth.message.clone()));
    }

    let validation: Vec<&GraphqlError> = errors
        .iter()
        .filter(|e| matches!(e.code(), Some(codes::BAD_USER_INPUT | codes::VALIDATION_ERROR)))
        .collect();
    if let Some(head) = validation.first() {
        let fields: FieldErrors = validation
            .iter()
            .flat_map(|e| e.extensions.fields.iter())
            .collect();
        return Some(GatewayError::Validation {
            message: head.message.clone(),
            fields,
        });
    }

    if let Some(missing) = errors.iter().find(|e| e.code() == Some(codes::NOT_FOUND)) {
        return Some(GatewayError::NotFound(missing.message.clone()));
    }

    Some(GatewayError::Unknown(first.message.clone()))
}

#[derive(serde::Deserialize)]
struct Deleted {}

impl<T: GraphqlTransport> TaskGateway for GraphqlGateway<T> {
    async fn list(
        &self,
        filter: &TaskFilter,
        page: Pagination,
        sort: Option<&TaskSort>,
    ) -> Result<Vec<Task>, GatewayError> {
        self.call(GraphqlRequest::list_tasks(filter, page, sort), true)
            .await
    }

    async fn create(&self, task: &NewTask) -> Result<Task, GatewayError> {
        self.call(GraphqlRequest::create_task(task), true).await
    }

    async fn update(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, GatewayError> {
        self.call(GraphqlRequest::update_task(id, patch), true).await
    }

    async fn delete(&self, id: &TaskId) -> Result<(), GatewayError> {
        self.call::<Deleted>(GraphqlRequest::delete_task(id), true)
            .await
            .map(|_| ())
    }
}

impl<T: GraphqlTransport> DashboardSource for GraphqlGateway<T> {
    async fn dashboard(&self) -> Result<DashboardStats, GatewayError> {
        self.call(GraphqlRequest::dashboard(), true).await
    }
}

impl<T: GraphqlTransport> AuthApi for GraphqlGateway<T> {
    async fn login(&self, credentials: &Credentials) -> Result<TokenPair, GatewayError> {
        self.call(GraphqlRequest::login(credentials), false).await
    }

    async fn register(&self, registration: &Registration) -> Result<TokenPair, GatewayError> {
        self.call(GraphqlRequest::register(registration), false)
            .await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, GatewayError> {
        self.call(GraphqlRequest::refresh_token(refresh_token), false)
            .await
    }
}
