//! Taskdeck: offline-tolerant personal task tracker client.

pub mod app;
pub mod cache;
pub mod config;
pub mod gateway;
pub mod session;
pub mod tasks;
