//! Runtime core: module lifecycle and process shutdown.
//!
//! - [`loader`]: loads modules in order (init, register) and tears them down;
//! - [`shutdown`]: cross-platform termination signal handling.

mod loader;
mod shutdown;

pub use loader::{ModuleLoader, ModuleState};
pub use shutdown::{ShutdownSignal, wait_for_shutdown_signal};
