//! DWC State Coordinator Library
//!
//! State-coordination layer for a retro game-network emulator:
//! - SQLite storage for consoles, profiles, sessions and access lists
//! - Console and profile registries with cached friend codes
//! - Session issue/expiry and the NAS login log
//! - Matchmaking membership and NAT negotiation cookies
//! - Heartbeat-driven game server registry
//! - Allow-list, deny-list and ban evaluation
//! - Statistics snapshots and background maintenance

pub mod access;
pub mod coordinator;
pub mod error;
pub mod maintenance;
pub mod matchmaking;
pub mod natneg;
pub mod registry;
pub mod servers;
pub mod session;
pub mod stats;
pub mod storage;

pub use coordinator::{Coordinator, LoginOutcome, LoginRequest};
pub use error::{CoordinatorError, Result};
