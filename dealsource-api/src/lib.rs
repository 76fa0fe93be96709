//! # DealSource API Server Library
//!
//! This library provides the HTTP layer of DealSource: session-authenticated
//! JSON endpoints for deals, vendors, investors and pack templates, the
//! page gate for dashboard routes, and investor pack downloads.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: Validating JSON extractor
//! - `middleware`: Security headers and the page gate
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
