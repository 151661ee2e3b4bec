//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (e.g., `core-service` and its desktop adapters). Host
//! applications can depend on `urban-sole-admin` and enable the documented
//! features without needing to wire each crate individually.
//!
//! - `desktop-shims` (default): reqwest transport and SQLite session storage.
//! - `headless`: the core only; the host injects every bridge itself.

#[cfg(any(feature = "desktop-shims", feature = "headless"))]
pub use core_service::{bootstrap, AdminCore, CoreError};
