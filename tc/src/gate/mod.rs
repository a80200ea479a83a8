//! Synchronization gates that hold instrumented calls back

mod pause;
mod read;

pub use pause::{ALL_SCOPES, PauseGates};
pub use read::ReadGate;
