//! # DealSource Shared Library
//!
//! This crate contains shared types, data access and business logic used by
//! the DealSource API server and the vendor pipeline worker.
//!
//! ## Module Organization
//!
//! - `models`: Database models and data structures
//! - `auth`: Authentication, sessions and access policy
//! - `db`: Connection pooling and migrations
//! - `workflow`: Deal status and vendor pipeline state machines
//! - `notify`: Email and SMS transports
//! - `pack`: Investor pack assembly and PDF rendering
//! - `property_data`: Third-party property data client and usage metering
//! - `seed`: Bootstrap admin account

pub mod auth;
pub mod db;
pub mod models;
pub mod notify;
pub mod pack;
pub mod property_data;
pub mod seed;
pub mod workflow;

/// Current version of the DealSource shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
