//! # Typed in-process event bus.
//!
//! [`Bus`] routes events from publishers (ingestion, modules) to the handlers
//! registered for their kind. It is a cheaply cloneable handle; all clones share
//! one listener registry.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                      Handlers (per kind):
//!   Ingestion ──┐                          ┌──► [queue] ─► worker ─► handler A
//!   certs     ──┼──► Bus ── snapshot(kind) ┼──► [queue] ─► worker ─► handler B
//!   config    ──┘   (RwLock<registry>)     └──► [queue] ─► worker ─► handler C
//! ```
//!
//! ## Rules
//! - **Typed**: `subscribe`/`publish` are generic over a [`Topic`]; the compiler
//!   checks that a handler and a publisher of one kind agree on the payload.
//! - **Shared read, exclusive write**: `publish` snapshots the handlers of one kind
//!   under the read lock, `subscribe`/`close` take the write lock.
//! - **Dispatch outside the lock**: a handler may itself `subscribe` or `publish`.
//! - **Fire-and-forget**: `publish` returns once the event is enqueued to every
//!   matching handler; it never waits for handler completion.
//! - **No persistence**: publishing a kind with no handlers is a silent no-op.
//! - **Runtime required**: `subscribe` spawns the handler's worker on the current
//!   tokio runtime.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use docker_certs::events::{Bus, CertCreated, CertPair, Event};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let bus = Bus::new();
//!     bus.subscribe(CertCreated, |ev: Arc<Event<CertCreated>>| async move {
//!         println!("new certificate for {}", ev.payload.host);
//!         Ok(())
//!     });
//!
//!     let pair = CertPair {
//!         host: "app.local".into(),
//!         cert_file: "certs/app.local.pem".into(),
//!         key_file: "certs/app.local-key.pem".into(),
//!     };
//!     assert_eq!(bus.publish(Event::new(CertCreated, pair)), 1);
//! }
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{BusError, ModuleError};
use crate::events::listener::{Handler, Listener};
use crate::events::{Event, EventKind, Topic};

/// Type-erased list of listeners for one kind.
trait ListenerSlot: Send + Sync {
    fn len(&self) -> usize;
    fn names(&self) -> Vec<&'static str>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Topic> ListenerSlot for Vec<Arc<Listener<T>>> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn names(&self) -> Vec<&'static str> {
        self.iter().map(|l| l.name()).collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

type Registry = HashMap<EventKind, Box<dyn ListenerSlot>>;

struct BusInner {
    listeners: RwLock<Registry>,
}

/// Publish/subscribe router keyed by [`EventKind`].
///
/// ### Properties
/// - **Cloneable**: clones share the same registry (`Arc`-backed).
/// - **Non-blocking publish**: events are handed to unbounded per-handler queues.
/// - **Per-handler FIFO**: a handler observes events of its kind in publish order.
#[derive(Clone)]
pub struct Bus {
    inner: Arc<BusInner>,
}

impl Bus {
    /// Creates a bus with no subscriptions.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                listeners: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Registers an anonymous handler for `topic`.
    ///
    /// Shorthand for [`subscribe_as`](Self::subscribe_as) with the name `"anonymous"`.
    pub fn subscribe<T, F, Fut>(&self, topic: T, handler: F)
    where
        T: Topic,
        F: Fn(Arc<Event<T>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ModuleError>> + Send + 'static,
    {
        self.subscribe_as("anonymous", topic, handler);
    }

    /// Registers a handler for `topic`, labelled `name` in logs.
    ///
    /// Never fails. Spawns the handler's worker on the current tokio runtime.
    pub fn subscribe_as<T, F, Fut>(&self, name: &'static str, _topic: T, handler: F)
    where
        T: Topic,
        F: Fn(Arc<Event<T>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ModuleError>> + Send + 'static,
    {
        let handler: Arc<dyn Handler<T>> = Arc::new(handler);
        let listener = Arc::new(Listener::spawn(name, handler));

        let mut registry = self.write();
        let slot = registry
            .entry(T::KIND)
            .or_insert_with(|| Box::new(Vec::<Arc<Listener<T>>>::new()));

        match slot.as_any_mut().downcast_mut::<Vec<Arc<Listener<T>>>>() {
            Some(list) => {
                list.push(listener);
                tracing::debug!(
                    subscriber = name,
                    kind = %T::KIND,
                    total = list.len(),
                    "handler subscribed"
                );
            }
            None => {
                let err = mismatch::<T>();
                tracing::error!(
                    subscriber = name,
                    label = err.as_label(),
                    error = %err,
                    "subscription rejected"
                );
            }
        }
    }

    /// Dispatches `event` to every handler registered for its kind.
    ///
    /// Returns the number of handlers the event was enqueued to (0 when nobody
    /// listens). Handlers run concurrently and are not awaited.
    pub fn publish<T: Topic>(&self, event: Event<T>) -> usize {
        let snapshot = match self.snapshot::<T>() {
            Ok(listeners) => listeners,
            Err(err) => {
                tracing::error!(label = err.as_label(), error = %err, "event not dispatched");
                return 0;
            }
        };
        if snapshot.is_empty() {
            tracing::trace!(kind = %T::KIND, "no handlers for event");
            return 0;
        }

        let event = Arc::new(event);
        let delivered = snapshot
            .iter()
            .filter(|listener| listener.dispatch(Arc::clone(&event)))
            .count();

        tracing::trace!(kind = %T::KIND, handlers = snapshot.len(), delivered, "event published");
        delivered
    }

    /// Discards all registrations.
    ///
    /// Subsequent publishes are no-ops until new subscriptions occur. Events
    /// already queued are still handled by their workers, which then exit.
    pub fn close(&self) {
        let dropped = std::mem::take(&mut *self.write());
        let total: usize = dropped.values().map(|slot| slot.len()).sum();
        tracing::debug!(handlers = total, "bus closed");
    }

    /// Number of handlers registered for `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.read().get(&kind).map_or(0, |slot| slot.len())
    }

    /// Names of the handlers registered for `kind`, in registration order.
    pub fn listener_names(&self, kind: EventKind) -> Vec<&'static str> {
        self.read().get(&kind).map_or_else(Vec::new, |slot| slot.names())
    }

    /// Copies the handler list for `T` under the read lock.
    fn snapshot<T: Topic>(&self) -> Result<Vec<Arc<Listener<T>>>, BusError> {
        let registry = self.read();
        match registry.get(&T::KIND) {
            None => Ok(Vec::new()),
            Some(slot) => slot
                .as_any()
                .downcast_ref::<Vec<Arc<Listener<T>>>>()
                .cloned()
                .ok_or_else(mismatch::<T>),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.inner
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.read();
        let mut map = f.debug_map();
        for (kind, slot) in registry.iter() {
            map.entry(kind, &slot.len());
        }
        map.finish()
    }
}

fn mismatch<T: Topic>() -> BusError {
    BusError::PayloadMismatch {
        kind: T::KIND,
        expected: std::any::type_name::<T::Payload>(),
    }
}
