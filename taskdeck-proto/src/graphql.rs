//! GraphQL envelope for the remote task, dashboard and auth APIs.
//!
//! Each [`Operation`] bundles the document text with the name of the
//! response field that carries its result. [`GraphqlRequest`] builds the
//! variables for one call, [`GraphqlResponse`] is the standard
//! `{ data, errors }` reply, and [`encode_request`] / [`decode_response`]
//! convert to and from JSON bytes.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::{Credentials, Registration};
use crate::draft::{FieldErrors, NewTask};
use crate::query::{Pagination, TaskFilter, TaskSort};
use crate::task::{TaskId, TaskPatch};

/// Error codes the API puts in `errors[].extensions.code`.
pub mod codes {
    /// Missing or rejected bearer token.
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    /// Token expired or unknown.
    pub const UNAUTHENTICATED: &str = "UNAUTHENTICATED";
    /// Argument validation failed; `extensions.fields` holds details.
    pub const BAD_USER_INPUT: &str = "BAD_USER_INPUT";
    /// Model validation failed; `extensions.fields` holds details.
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    /// The addressed record does not exist.
    pub const NOT_FOUND: &str = "NOT_FOUND";
}

/// Error type for GraphQL encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The response carried neither the expected field nor errors.
    #[error("response has no data for field `{0}`")]
    MissingField(&'static str),
}

/// A named GraphQL document and the response field holding its result.
#[derive(Debug, PartialEq, Eq)]
pub struct Operation {
    /// `operationName` sent with the request.
    pub name: &'static str,
    /// Key under `data` where the result is found.
    pub field: &'static str,
    /// Document text.
    pub document: &'static str,
}

/// Paged, filtered and sorted task list.
pub const GET_ALL_TASKS: Operation = Operation {
    name: "GetAllTasks",
    field: "getAllTasks",
    document: concat!(
        "query GetAllTasks($filter: TaskFilter, $skip: Int, $take: Int, $sort: TaskSort) { ",
        "getAllTasks(filter: $filter, skip: $skip, take: $take, sort: $sort) { ",
        "id title description status category priority dueDate startDate createdAt updatedAt ",
        "} }"
    ),
};

/// Creates a task and returns the stored record.
pub const CREATE_TASK: Operation = Operation {
    name: "CreateTask",
    field: "createTask",
    document: concat!(
        "mutation CreateTask($title: String!, $description: String!, $category: Category!, ",
        "$priority: Priority!, $dueDate: String!, $startDate: String!) { ",
        "createTask(title: $title, description: $description, category: $category, ",
        "priority: $priority, dueDate: $dueDate, startDate: $startDate) { ",
        "id title description status category priority dueDate startDate createdAt updatedAt ",
        "} }"
    ),
};

/// Applies a partial update and returns the stored record.
pub const UPDATE_TASK: Operation = Operation {
    name: "UpdateTask",
    field: "updateTask",
    document: concat!(
        "mutation UpdateTask($id: String!, $title: String, $description: String, ",
        "$category: Category, $priority: Priority, $status: Status, $dueDate: String, ",
        "$startDate: String) { ",
        "updateTask(id: $id, title: $title, description: $description, category: $category, ",
        "priority: $priority, status: $status, dueDate: $dueDate, startDate: $startDate) { ",
        "id title description status category priority dueDate startDate createdAt updatedAt ",
        "} }"
    ),
};

/// Deletes a task.
pub const DELETE_TASK: Operation = Operation {
    name: "DeleteTask",
    field: "deleteTask",
    document: "mutation DeleteTask($id: String!) { deleteTask(id: $id) { id } }",
};

/// Precomputed dashboard aggregates.
pub const GET_DASHBOARD: Operation = Operation {
    name: "GetDashboard",
    field: "getDashboard",
    document: concat!(
        "query GetDashboard { getDashboard { ",
        "totalTasks completedTasks pendingTasks inProgressTasks ",
        "totalUsers activeUsers inactiveUsers ",
        "tasksByCategory tasksByPriority overallProgress ",
        "} }"
    ),
};

/// Exchanges credentials for a token pair.
pub const LOGIN: Operation = Operation {
    name: "Login",
    field: "login",
    document: concat!(
        "mutation Login($email: String!, $password: String!) { ",
        "login(email: $email, password: $password) { accessToken refreshToken } }"
    ),
};

/// Creates an account and returns a token pair.
pub const REGISTER: Operation = Operation {
    name: "Register",
    field: "register",
    document: concat!(
        "mutation Register($name: String!, $email: String!, $password: String!) { ",
        "register(name: $name, email: $email, password: $password) { ",
        "accessToken refreshToken } }"
    ),
};

/// Exchanges a refresh token for a fresh pair.
pub const REFRESH_TOKEN: Operation = Operation {
    name: "RefreshToken",
    field: "refreshToken",
    document: concat!(
        "mutation RefreshToken($refreshToken: String!) { ",
        "refreshToken(refreshToken: $refreshToken) { accessToken refreshToken } }"
    ),
};

/// One GraphQL call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlRequest {
    /// Operation name, for server logs and routing.
    pub operation_name: &'static str,
    /// Document text.
    pub query: &'static str,
    /// Operation variables (always an object).
    pub variables: Value,
    /// Response field holding the result.
    #[serde(skip)]
    pub field: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListVars<'a> {
    filter: &'a TaskFilter,
    skip: u32,
    take: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    sort: Option<&'a TaskSort>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateVars<'a> {
    title: &'a str,
    description: &'a str,
    category: crate::task::Category,
    priority: crate::task::Priority,
    due_date: chrono::DateTime<chrono::Utc>,
    start_date: chrono::DateTime<chrono::Utc>,
}

#[derive(Serialize)]
struct UpdateVars<'a> {
    id: &'a TaskId,
    #[serde(flatten)]
    patch: &'a TaskPatch,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshVars<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct IdVars<'a> {
    id: &'a TaskId,
}

impl GraphqlRequest {
    /// Builds a request for `op` from serializable variables.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Serialization`] if the variables cannot be
    /// converted to JSON.
    pub fn new(op: &Operation, variables: &impl Serialize) -> Result<Self, CodecError> {
        Ok(Self {
            operation_name: op.name,
            query: op.document,
            variables: serde_json::to_value(variables)?,
            field: op.field,
        })
    }

    /// `GetAllTasks` with server-side filter, paging and optional sort.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Serialization`] if the variables cannot be encoded.
    pub fn list_tasks(
        filter: &TaskFilter,
        page: Pagination,
        sort: Option<&TaskSort>,
    ) -> Result<Self, CodecError> {
        Self::new(
            &GET_ALL_TASKS,
            &ListVars {
                filter,
                skip: page.skip,
                take: page.take,
                sort,
            },
        )
    }

    /// `CreateTask`. The initial status is not part of the mutation.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Serialization`] if the variables cannot be encoded.
    pub fn create_task(task: &NewTask) -> Result<Self, CodecError> {
        Self::new(
            &CREATE_TASK,
            &CreateVars {
                title: &task.title,
                description: &task.description,
                category: task.category,
                priority: task.priority,
                due_date: task.due_date,
                start_date: task.start_date,
            },
        )
    }

    /// `UpdateTask` with the patch fields flattened next to the id.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Serialization`] if the variables cannot be encoded.
    pub fn update_task(id: &TaskId, patch: &TaskPatch) -> Result<Self, CodecError> {
        Self::new(&UPDATE_TASK, &UpdateVars { id, patch })
    }

    /// `DeleteTask`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Serialization`] if the variables cannot be encoded.
    pub fn delete_task(id: &TaskId) -> Result<Self, CodecError> {
        Self::new(&DELETE_TASK, &IdVars { id })
    }

    /// `GetDashboard`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Serialization`] if the variables cannot be encoded.
    pub fn dashboard() -> Result<Self, CodecError> {
        Self::new(&GET_DASHBOARD, &serde_json::Map::new())
    }

    /// `Login`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Serialization`] if the variables cannot be encoded.
    pub fn login(credentials: &Credentials) -> Result<Self, CodecError> {
        Self::new(&LOGIN, credentials)
    }

    /// `Register`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Serialization`] if the variables cannot be encoded.
    pub fn register(registration: &Registration) -> Result<Self, CodecError> {
        Self::new(&REGISTER, registration)
    }

    /// `RefreshToken`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Serialization`] if the variables cannot be encoded.
    pub fn refresh_token(refresh_token: &str) -> Result<Self, CodecError> {
        Self::new(&REFRESH_TOKEN, &RefreshVars { refresh_token })
    }
}

/// `errors[].extensions` of a GraphQL error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorExtensions {
    /// Machine-readable code, see [`codes`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Per-field validation messages.
    #[serde(skip_serializing_if = "FieldErrors::is_empty")]
    pub fields: FieldErrors,
}

/// One entry of a response's `errors` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphqlError {
    /// Human-readable message.
    pub message: String,
    /// Structured detail.
    #[serde(default)]
    pub extensions: ErrorExtensions,
}

impl GraphqlError {
    /// An error with a message and code.
    #[must_use]
    pub fn new(message: impl Into<String>, code: &str) -> Self {
        Self {
            message: message.into(),
            extensions: ErrorExtensions {
                code: Some(code.to_string()),
                fields: FieldErrors::new(),
            },
        }
    }

    /// Attaches per-field validation messages.
    #[must_use]
    pub fn with_fields(mut self, fields: FieldErrors) -> Self {
        self.extensions.fields = fields;
        self
    }

    /// The `extensions.code`, if present.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.extensions.code.as_deref()
    }
}

/// A GraphQL reply. Partial data and errors may both be present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphqlResponse {
    /// Result object keyed by field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Errors reported by the server.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphqlError>,
}

impl GraphqlResponse {
    /// A successful reply with `value` under `field`.
    #[must_use]
    pub fn with_field(field: &str, value: Value) -> Self {
        let mut data = serde_json::Map::new();
        data.insert(field.to_string(), value);
        Self {
            data: Some(Value::Object(data)),
            errors: Vec::new(),
        }
    }

    /// A failed reply with a single error.
    #[must_use]
    pub fn with_error(error: GraphqlError) -> Self {
        Self {
            data: None,
            errors: vec![error],
        }
    }

    /// Deserializes the value under `field`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MissingField`] if `data` lacks the field or it
    /// is `null`, and [`CodecError::Serialization`] if it has the wrong shape.
    pub fn take_field<T: DeserializeOwned>(self, field: &'static str) -> Result<T, CodecError> {
        let value = self
            .data
            .and_then(|mut data| data.get_mut(field).map(Value::take))
            .filter(|v| !v.is_null())
            .ok_or(CodecError::MissingField(field))?;
        Ok(serde_json::from_value(value)?)
    }
}

/// Encodes a request as a JSON body.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the request cannot be serialized.
pub fn encode_request(request: &GraphqlRequest) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(request)?)
}

/// Decodes a JSON response body.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the bytes are not a GraphQL reply.
pub fn decode_response(bytes: &[u8]) -> Result<GraphqlResponse, CodecError> {
    Ok(serde_json::from_slice(bytes)?)
}
