//! Console and profile registries.

mod consoles;
mod profiles;

pub use consoles::{ConsoleAttrs, ConsoleRegistry, normalize_mac};
pub use profiles::ProfileRegistry;
