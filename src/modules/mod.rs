//! Modules: capability traits, descriptors and the built-in side effects.
//!
//! - [`Initialize`], [`EventAware`], [`Close`] the three optional capabilities
//! - [`ModuleSpec`] explicit declaration of which capabilities a module has
//! - [`builtin`] certificate issuance, dynamic config writing, mDNS advertising

pub mod builtin;
mod module;
mod spec;

pub use module::{Capabilities, Close, EventAware, Initialize};
pub use spec::{ModuleSpec, ModuleSpecBuilder};
