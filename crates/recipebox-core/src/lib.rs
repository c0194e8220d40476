//! Core library for recipebox.
//!
//! - [`auth`]: the session store owning the bearer token, and its durable storage
//! - [`api`]: the authenticated request pipeline and auth flows
//! - [`config`]: persisted settings and client configuration

pub mod api;
pub mod auth;
pub mod config;

pub use api::{ApiClient, ApiError, PendingRequest, TokenGrant};
pub use auth::{KeyringStorage, MemoryStorage, SessionStore, Subscription, TokenStorage};
pub use config::{ClientConfig, Config};
