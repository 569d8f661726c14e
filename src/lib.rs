//! Autotask — task-execution core of a local automation server.

pub mod actions;
pub mod api;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod store;
