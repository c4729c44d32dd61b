//! Shared task model and remote API protocol for `Taskdeck`.

pub mod auth;
pub mod dashboard;
pub mod draft;
pub mod graphql;
pub mod query;
pub mod task;
