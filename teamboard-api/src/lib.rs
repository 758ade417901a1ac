//! # Teamboard API Server Library
//!
//! HTTP layer over `teamboard-shared`: configuration, routing, bearer-token
//! authentication and the mapping of service errors to HTTP responses.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: Body and query extractors with JSON rejections
//! - `middleware`: Response hardening
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
