//! # Event kinds, topics and the typed envelope.
//!
//! The [`EventKind`] enum is the closed set of event categories flowing
//! through the [`Bus`](crate::events::Bus):
//! - **Container events**: `ContainerStarted`, `ContainerStopped` (from ingestion)
//! - **Certificate events**: `CertCreated` (from the certs module)
//! - **Config events**: `ConfigUpdated` (from the config-writer module)
//!
//! Every kind has a matching zero-sized *topic* type implementing [`Topic`].
//! A topic fixes the payload type of its kind, so a publisher and a subscriber
//! of the same kind always agree on the payload at compile time:
//!
//! ```text
//! Topic              KIND                          Payload
//! ContainerStarted   EventKind::ContainerStarted   ContainerEvent
//! ContainerStopped   EventKind::ContainerStopped   ContainerEvent
//! CertCreated        EventKind::CertCreated        CertPair
//! ConfigUpdated      EventKind::ConfigUpdated      ConfigUpdate
//! ```
//!
//! [`Topic`] is sealed: the set of kinds is closed and one kind maps to exactly
//! one payload type.
//!
//! ## Example
//! ```rust
//! use std::collections::HashMap;
//! use docker_certs::events::{ContainerAction, ContainerEvent, ContainerStarted, Event, EventKind};
//!
//! let ev = Event::new(
//!     ContainerStarted,
//!     ContainerEvent::new("abc123", ContainerAction::Start, HashMap::new()),
//! );
//!
//! assert_eq!(ev.kind(), EventKind::ContainerStarted);
//! assert_eq!(ev.payload.id, "abc123");
//! ```

use std::fmt;

use super::payload::{CertPair, ConfigUpdate, ContainerEvent};

/// Classification of events flowing through the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A container is running (initial scan or live `start`).
    ///
    /// Payload: [`ContainerEvent`] with `action = start`.
    ContainerStarted,

    /// A container stopped (live `stop`).
    ///
    /// Payload: [`ContainerEvent`] with `action = stop`.
    ContainerStopped,

    /// A certificate/key pair was written for a host.
    ///
    /// Payload: [`CertPair`].
    CertCreated,

    /// The reverse-proxy dynamic config now references a certificate pair.
    ///
    /// Payload: [`ConfigUpdate`].
    ConfigUpdated,
}

impl EventKind {
    /// All kinds, in declaration order.
    pub const ALL: [EventKind; 4] = [
        EventKind::ContainerStarted,
        EventKind::ContainerStopped,
        EventKind::CertCreated,
        EventKind::ConfigUpdated,
    ];

    /// Stable dotted name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ContainerStarted => "docker.container.started",
            EventKind::ContainerStopped => "docker.container.stopped",
            EventKind::CertCreated => "cert.created",
            EventKind::ConfigUpdated => "config.updated",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Binds one [`EventKind`] to its payload type.
///
/// Implemented only by the topic markers of this module.
pub trait Topic: sealed::Sealed + Copy + Send + Sync + 'static {
    /// Kind used as the registry key on the bus.
    const KIND: EventKind;

    /// Payload carried by events of this kind.
    type Payload: Clone + fmt::Debug + Send + Sync + 'static;
}

macro_rules! topic {
    ($(#[$meta:meta])* $name:ident => $payload:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name;

        impl sealed::Sealed for $name {}

        impl Topic for $name {
            const KIND: EventKind = EventKind::$name;
            type Payload = $payload;
        }
    };
}

topic!(
    /// Topic for [`EventKind::ContainerStarted`].
    ContainerStarted => ContainerEvent
);
topic!(
    /// Topic for [`EventKind::ContainerStopped`].
    ContainerStopped => ContainerEvent
);
topic!(
    /// Topic for [`EventKind::CertCreated`].
    CertCreated => CertPair
);
topic!(
    /// Topic for [`EventKind::ConfigUpdated`].
    ConfigUpdated => ConfigUpdate
);

/// Typed event envelope: `{ kind, payload }`.
///
/// The kind is derived from the topic and cannot drift from the payload type.
pub struct Event<T: Topic> {
    kind: EventKind,
    /// Data carried by the event.
    pub payload: T::Payload,
}

impl<T: Topic> Event<T> {
    /// Creates an event for `topic` carrying `payload`.
    #[inline]
    pub fn new(_topic: T, payload: T::Payload) -> Self {
        Self {
            kind: T::KIND,
            payload,
        }
    }

    /// Kind of this event.
    #[inline]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Consumes the envelope and returns the payload.
    #[inline]
    pub fn into_payload(self) -> T::Payload {
        self.payload
    }
}

impl<T: Topic> Clone for Event<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            payload: self.payload.clone(),
        }
    }
}

impl<T: Topic> fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("kind", &self.kind)
            .field("payload", &self.payload)
            .finish()
    }
}
