//! # Store API Client
//!
//! Single entry point for talking to the store backend. Every call goes
//! through [`ApiClient::execute`], which takes an [`ApiRequest`] descriptor and
//! an optional session token and returns either the decoded body or a
//! classified [`ApiError`].
//!
//! ## Behaviour
//!
//! - Requests that require authentication fail with
//!   [`ApiError::SessionExpired`] before any network call if no token is given.
//! - Each attempt is bounded by the configured timeout (default 15 s).
//! - Transient failures (timeout, network, server errors) are retried up to
//!   the retry policy's attempt count with a linearly growing delay.
//! - 401/403 responses are classified as `SessionExpired` for authenticated
//!   requests and `AuthenticationFailed` for public ones; neither is retried.
//!
//! The client never touches persisted session state. Reacting to
//! `SessionExpired` is the caller's job.

pub mod client;
pub mod error;
pub mod request;

pub use client::ApiClient;
pub use error::{ApiError, Result, UserMessage};
pub use request::ApiRequest;
