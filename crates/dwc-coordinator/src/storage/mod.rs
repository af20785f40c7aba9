//! `SQLite` storage for the DWC coordinator.
//!
//! One `impl StateDatabase` block per entity family. Queries that write or
//! compare timestamps take `now` from the caller so liveness stays driven by
//! the injected clock.

mod db;
mod models;
mod queries_access;
mod queries_consoles;
mod queries_matchmaking;
mod queries_nas;
mod queries_natneg;
mod queries_profiles;
mod queries_servers;
mod queries_sessions;
mod queries_stats;


pub use db::{DatabaseError, StateDatabase};
pub use models::*;
pub use queries_access::BanParams;
pub use queries_consoles::ConsoleParams;
pub use queries_profiles::{ProfileAttrs, ProfilePatch};
pub use queries_servers::GameServerParams;
pub use queries_stats::StatisticCounts;
