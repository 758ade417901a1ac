//! # Teamboard Shared Library
//!
//! Core of the Teamboard project/task manager: domain models, the access
//! policy, persistence and the services that tie them together. The HTTP
//! server in `teamboard-api` is a thin layer on top of this crate.
//!
//! ## Module Organization
//!
//! - `models`: users, projects, tasks and membership diffs
//! - `auth`: actor, access policy, password hashing, JWT
//! - `repository`: persistence trait with PostgreSQL and in-memory backends
//! - `services`: project, task and user operations
//! - `db`: connection pool and migrations
//! - `error`: the shared error type

pub mod auth;
pub mod db;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

/// Current version of the Teamboard shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
