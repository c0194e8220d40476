//! Session ownership for the API client.
//!
//! This module provides:
//! - `SessionStore`: cached bearer token mirrored to durable storage, plus
//!   session-expired notifications
//! - `TokenStorage`: the durable slot, backed by the OS keychain
//!   (`KeyringStorage`) or process memory (`MemoryStorage`)

pub mod session;
pub mod storage;

pub use session::{SessionStore, Subscription};
pub use storage::{KeyringStorage, MemoryStorage, TokenStorage};
