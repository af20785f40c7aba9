//! GP login sessions and the NAS login log.

mod manager;
mod nas;

pub use manager::{SESSION_KEY_LEN, SessionManager, generate_session_key, validate_session_key};
pub use nas::NasLoginLog;
