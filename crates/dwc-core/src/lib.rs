//! DWC Core Library
//!
//! Shared functionality for the DWC state coordinator:
//! - `SQLite` pool helpers and the shared `DatabaseError`
//! - Configuration resolution and hierarchy
//! - Liveness clock and fixed online/active windows
//! - Friend code derivation and display format
//! - Tracing initialisation

pub mod config;
pub mod db;
pub mod error;
pub mod friend_code;
pub mod liveness;
pub mod tracing_init;

pub use config::Config;
pub use error::{Error, Result};
pub use friend_code::{FriendCode, FriendCodeCodec, FriendCodeError, LegacyCodec};
pub use liveness::{Clock, LivenessWindow, ManualClock, Presence, SystemClock};
