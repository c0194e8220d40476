//! REST API client module for the recipebox backend.
//!
//! This module provides the `ApiClient` request pipeline, which attaches
//! the session's bearer token to every call and recovers once from an
//! expired token via the cookie-backed refresh endpoint, plus the
//! sign-in/sign-up/sign-out flows that create and end sessions.

mod auth;
pub mod client;
pub mod error;
pub mod request;

pub use client::{ApiClient, TokenGrant};
pub use error::ApiError;
pub use request::PendingRequest;
