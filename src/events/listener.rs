//! # Per-subscription queue and worker.
//!
//! Every [`Bus::subscribe`](crate::events::Bus::subscribe) call creates one
//! [`Listener`]: an unbounded queue feeding a dedicated worker task that invokes
//! the handler.
//!
//! ## Architecture
//! ```text
//! publish(event)
//!     │
//!     ├──► [queue 1] ──► worker 1 ──► handler1(event)
//!     │   (unbounded)        ├──────► Err   → warn, continue
//!     │                      └──────► panic → error, continue
//!     └──► [queue N] ──► worker N ──► handlerN(event)
//! ```
//!
//! ## Rules
//! - **Non-blocking**: `dispatch()` enqueues and returns immediately
//! - **Lossless**: a slow handler accumulates a backlog; events are never dropped
//! - **Per-subscription FIFO**: one handler sees events of its kind in publish order
//! - **No cross-subscription ordering**: handler A may run event N while B runs N+5
//! - **Isolation**: a failing or panicking handler does not affect the others
//!
//! Workers stop once their queue is closed, i.e. when the bus drops the
//! listener (`Bus::close`) and the queued events are drained.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::mpsc;

use crate::error::ModuleError;
use crate::events::{Event, Topic};

/// Boxed future returned by [`Handler::call`].
pub type HandlerFuture = BoxFuture<'static, Result<(), ModuleError>>;

/// Async callback invoked for each event of topic `T`.
///
/// Implemented for every `Fn(Arc<Event<T>>) -> impl Future<Output = Result<(), ModuleError>>`.
pub trait Handler<T: Topic>: Send + Sync + 'static {
    fn call(&self, event: Arc<Event<T>>) -> HandlerFuture;
}

impl<T, F, Fut> Handler<T> for F
where
    T: Topic,
    F: Fn(Arc<Event<T>>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ModuleError>> + Send + 'static,
{
    fn call(&self, event: Arc<Event<T>>) -> HandlerFuture {
        Box::pin((self)(event))
    }
}

/// Queue handle of one subscription.
pub(crate) struct Listener<T: Topic> {
    name: &'static str,
    sender: mpsc::UnboundedSender<Arc<Event<T>>>,
}

impl<T: Topic> Listener<T> {
    /// Creates the queue and spawns the worker.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn spawn(name: &'static str, handler: Arc<dyn Handler<T>>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Arc<Event<T>>>();

        tokio::spawn(async move {
            while let Some(ev) = rx.recv().await {
                let fut = handler.call(ev);

                match std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::warn!(
                            subscriber = name,
                            kind = %T::KIND,
                            label = e.as_label(),
                            error = %e,
                            "event handler failed"
                        );
                    }
                    Err(panic_err) => {
                        let info = {
                            let any = &*panic_err;
                            if let Some(msg) = any.downcast_ref::<&'static str>() {
                                (*msg).to_string()
                            } else if let Some(msg) = any.downcast_ref::<String>() {
                                msg.clone()
                            } else {
                                "unknown panic".to_string()
                            }
                        };
                        tracing::error!(
                            subscriber = name,
                            kind = %T::KIND,
                            panic = %info,
                            "event handler panicked"
                        );
                    }
                }
            }
            tracing::trace!(subscriber = name, kind = %T::KIND, "listener worker stopped");
        });

        Self { name, sender: tx }
    }

    /// Enqueues the event for this subscription.
    ///
    /// Returns `false` only if the worker is gone.
    pub(crate) fn dispatch(&self, event: Arc<Event<T>>) -> bool {
        if self.sender.send(event).is_err() {
            tracing::warn!(
                subscriber = self.name,
                kind = %T::KIND,
                "listener dropped event: worker closed"
            );
            return false;
        }
        true
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }
}
