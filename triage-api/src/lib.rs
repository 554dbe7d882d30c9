//! # Triage API Server Library
//!
//! HTTP surface for the email triage service.
//!
//! ## Modules
//!
//! - `app`: Application state, router and session middleware
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: Caller, request metadata and JSON extractors
//! - `middleware`: Security headers
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
