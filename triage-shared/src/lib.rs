//! # Triage Shared Library
//!
//! Domain types and business logic for the email triage API.
//!
//! ## Module Organization
//!
//! - `models`: Database models and their SQL
//! - `auth`: Passwords, session tokens, caller context and the access policy
//! - `escalation`: The escalation lifecycle and SLA status
//! - `audit`: Access audit logging
//! - `store`: The `Store` trait with Postgres and in-memory implementations
//! - `realtime`: Redis change notifications
//! - `db`: Connection pool and migrations

pub mod audit;
pub mod auth;
pub mod db;
pub mod escalation;
pub mod models;
pub mod realtime;
pub mod store;

/// Current version of the shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
