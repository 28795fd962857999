//! Events: types and the typed publish/subscribe bus.
//!
//! This module groups the event **data model** and the **bus** used to route
//! events between ingestion and modules.
//!
//! ## Contents
//! - [`EventKind`], [`Topic`], [`Event`] event classification and typed envelope
//! - [`ContainerEvent`], [`CertPair`], [`ConfigUpdate`] payloads
//! - [`Bus`] kind-keyed router with per-handler worker queues
//!
//! ## Quick reference
//! - **Publishers**: `Ingestor` (container started/stopped), `certs` (cert created),
//!   `config-writer` (config updated).
//! - **Consumers**: module handlers registered from `EventAware::register`.

mod bus;
mod event;
mod listener;
mod payload;

pub use bus::Bus;
pub use event::{
    CertCreated, ConfigUpdated, ContainerStarted, ContainerStopped, Event, EventKind, Topic,
};
pub use listener::{Handler, HandlerFuture};
pub use payload::{CertPair, ConfigUpdate, ContainerAction, ContainerEvent};
