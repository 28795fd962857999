//! # Module capabilities.
//!
//! A module is an independently pluggable unit that reacts to bus events and
//! performs a real-world side effect. It may implement any subset of three
//! capabilities:
//!
//! | Capability        | Trait          | Hook                     | When                           |
//! |-------------------|----------------|--------------------------|--------------------------------|
//! | **Initializable** | [`Initialize`] | `init().await`           | once, before event wiring      |
//! | **EventAware**    | [`EventAware`] | `register(bus)`          | once, right after init         |
//! | **Closable**      | [`Close`]      | `close().await`          | once, at shutdown              |
//!
//! Which capabilities a module has is declared explicitly in its
//! [`ModuleSpec`](crate::modules::ModuleSpec), not detected at runtime.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use docker_certs::events::{Bus, ContainerStarted, Event};
//! use docker_certs::modules::{Close, EventAware};
//! use docker_certs::ModuleError;
//!
//! struct Audit;
//!
//! impl EventAware for Audit {
//!     fn register(self: Arc<Self>, bus: &Bus) {
//!         bus.subscribe_as("audit", ContainerStarted, |ev: Arc<Event<ContainerStarted>>| async move {
//!             println!("container {} is up", ev.payload.id);
//!             Ok(())
//!         });
//!     }
//! }
//!
//! #[async_trait]
//! impl Close for Audit {
//!     async fn close(&self) -> Result<(), ModuleError> {
//!         Ok(())
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ModuleError;
use crate::events::Bus;

/// Startup hook, run once before event wiring.
///
/// An error aborts process startup.
#[async_trait]
pub trait Initialize: Send + Sync + 'static {
    async fn init(&self) -> Result<(), ModuleError>;
}

/// Registration hook: subscribes the module's handlers to the bus.
///
/// Must not block; bus wiring only.
pub trait EventAware: Send + Sync + 'static {
    fn register(self: Arc<Self>, bus: &Bus);
}

/// Teardown hook, run once at shutdown.
///
/// Errors are logged by the loader and never stop sibling teardown.
#[async_trait]
pub trait Close: Send + Sync + 'static {
    async fn close(&self) -> Result<(), ModuleError>;
}

/// Capabilities declared by a module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub init: bool,
    pub events: bool,
    pub close: bool,
}

impl Capabilities {
    /// True if the module declares no capability at all.
    pub fn is_empty(&self) -> bool {
        !(self.init || self.events || self.close)
    }
}
