//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the admin core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the API, auth and service
//! crates depend on. It establishes the logging conventions, the fail-fast
//! configuration builder, and the event broadcasting used to notify hosts of
//! session and user-management changes.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
