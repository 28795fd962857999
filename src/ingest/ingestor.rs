//! # Container event ingestion.
//!
//! [`Ingestor`] turns container runtime observations into bus events:
//!
//! ```text
//! scan():  list_running() ──► publish ContainerStarted × N
//!
//! run(token):
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │ Connected ── item ──► publish ContainerStarted/Stopped       │
//!   │     │                                                        │
//!   │     └── end of stream / Err ──► Backoff(reconnect_delay) ──┐ │
//!   │                                                            │ │
//!   └──────────────────────── reconnect ◄────────────────────────┘ │
//!   token.cancelled() ──► return   (checked mid-read and mid-backoff)
//! ```
//!
//! ## Rules
//! - The reconnect loop never gives up; only cancellation stops it.
//! - Events emitted while disconnected are lost; nothing is replayed on reconnect.
//! - Publishing never blocks ingestion (see [`Bus::publish`]).

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use super::runtime::ContainerRuntime;
use crate::error::RuntimeError;
use crate::events::{
    Bus, ContainerAction, ContainerEvent, ContainerStarted, ContainerStopped, Event,
};

/// Feeds the bus from a [`ContainerRuntime`].
pub struct Ingestor {
    runtime: Arc<dyn ContainerRuntime>,
    bus: Bus,
    reconnect_delay: Duration,
}

impl Ingestor {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, bus: Bus, reconnect_delay: Duration) -> Self {
        Self {
            runtime,
            bus,
            reconnect_delay,
        }
    }

    /// Publishes one `ContainerStarted` per currently running container.
    ///
    /// Returns the number of containers found.
    pub async fn scan(&self) -> Result<usize, RuntimeError> {
        let running = self.runtime.list_running().await?;
        let count = running.len();

        for mut container in running {
            container.action = ContainerAction::Start;
            self.bus.publish(Event::new(ContainerStarted, container));
        }

        tracing::info!(containers = count, "initial scan published running containers");
        Ok(count)
    }

    /// Streams live events until `token` is cancelled, reconnecting forever.
    pub async fn run(&self, token: CancellationToken) {
        let mut session: u64 = 0;

        loop {
            if token.is_cancelled() {
                break;
            }
            session += 1;

            let mut stream = self.runtime.events();
            tracing::info!(session, "listening for container events");

            loop {
                let next = select! {
                    _ = token.cancelled() => {
                        tracing::info!(session, "ingestion cancelled");
                        return;
                    }
                    next = stream.next() => next,
                };

                match next {
                    Some(Ok(event)) => self.dispatch(event),
                    Some(Err(e)) => {
                        tracing::warn!(
                            session,
                            label = e.as_label(),
                            transient = e.is_transient(),
                            error = %e,
                            "event stream error"
                        );
                        break;
                    }
                    None => {
                        tracing::warn!(session, "event stream closed");
                        break;
                    }
                }
            }
            drop(stream);

            tracing::debug!(session, delay = ?self.reconnect_delay, "reconnecting after delay");
            select! {
                _ = time::sleep(self.reconnect_delay) => {}
                _ = token.cancelled() => {
                    tracing::info!(session, "ingestion cancelled during backoff");
                    break;
                }
            }
        }
    }

    fn dispatch(&self, event: ContainerEvent) {
        tracing::debug!(id = %event.id, action = %event.action, "container event received");
        match event.action {
            ContainerAction::Start => self.bus.publish(Event::new(ContainerStarted, event)),
            ContainerAction::Stop => self.bus.publish(Event::new(ContainerStopped, event)),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::EventStream;
    use async_trait::async_trait;
    use futures::stream;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    type Session = Vec<Result<ContainerEvent, RuntimeError>>;

    /// Replays scripted sessions; once exhausted, streams stay open forever.
    struct ScriptedRuntime {
        running: Vec<ContainerEvent>,
        sessions: Mutex<VecDeque<Session>>,
        connects: AtomicUsize,
    }

    impl ScriptedRuntime {
        fn new(running: Vec<ContainerEvent>, sessions: Vec<Session>) -> Arc<Self> {
            Arc::new(Self {
                running,
                sessions: Mutex::new(sessions.into()),
                connects: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ContainerRuntime for ScriptedRuntime {
        async fn list_running(&self) -> Result<Vec<ContainerEvent>, RuntimeError> {
            Ok(self.running.clone())
        }

        fn events(&self) -> EventStream {
            self.connects.fetch_add(1, Ordering::SeqCst);
            match self.sessions.lock().unwrap().pop_front() {
                Some(items) => stream::iter(items).boxed(),
                None => stream::pending().boxed(),
            }
        }
    }

    fn container(id: &str, action: ContainerAction) -> ContainerEvent {
        ContainerEvent::new(id, action, HashMap::new())
    }

    fn forward<T: crate::events::Topic<Payload = ContainerEvent>>(
        bus: &Bus,
        topic: T,
        tx: mpsc::UnboundedSender<String>,
    ) {
        bus.subscribe(topic, move |ev: Arc<Event<T>>| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(format!("{}:{}", ev.kind(), ev.payload.id));
                Ok(())
            }
        });
    }

    async fn recv(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
        time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("no event in time")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn test_scan_publishes_one_event_per_container() {
        let bus = Bus::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        forward(&bus, ContainerStarted, tx);

        let runtime = ScriptedRuntime::new(
            vec![
                container("a", ContainerAction::Start),
                container("b", ContainerAction::Start),
            ],
            vec![],
        );
        let ingestor = Ingestor::new(runtime, bus, Duration::ZERO);

        assert_eq!(ingestor.scan().await.unwrap(), 2);
        assert_eq!(recv(&mut rx).await, "docker.container.started:a");
        assert_eq!(recv(&mut rx).await, "docker.container.started:b");

        time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reconnects_after_closed_stream() {
        let bus = Bus::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        forward(&bus, ContainerStarted, tx.clone());
        forward(&bus, ContainerStopped, tx);

        let runtime = ScriptedRuntime::new(
            vec![],
            vec![
                vec![Ok(container("first", ContainerAction::Start))],
                vec![],
                vec![
                    Err(RuntimeError::Stream("connection reset".into())),
                    Ok(container("lost", ContainerAction::Start)),
                ],
                vec![Ok(container("after", ContainerAction::Stop))],
            ],
        );
        let ingestor = Arc::new(Ingestor::new(runtime.clone(), bus, Duration::from_millis(5)));

        let token = CancellationToken::new();
        let handle = tokio::spawn({
            let ingestor = Arc::clone(&ingestor);
            let token = token.clone();
            async move { ingestor.run(token).await }
        });

        assert_eq!(recv(&mut rx).await, "docker.container.started:first");
        assert_eq!(recv(&mut rx).await, "docker.container.stopped:after");
        assert!(runtime.connects.load(Ordering::SeqCst) >= 4);

        token.cancel();
        time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("ingestion did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancel_during_backoff_stops_immediately() {
        let runtime = ScriptedRuntime::new(vec![], vec![vec![]]);
        let ingestor = Ingestor::new(runtime.clone(), Bus::new(), Duration::from_secs(3600));

        let token = CancellationToken::new();
        let stopper = token.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(50)).await;
            stopper.cancel();
        });

        time::timeout(Duration::from_secs(2), ingestor.run(token))
            .await
            .expect("backoff ignored cancellation");
        assert_eq!(runtime.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_during_read_stops_immediately() {
        let runtime = ScriptedRuntime::new(vec![], vec![]);
        let ingestor = Ingestor::new(runtime, Bus::new(), Duration::ZERO);

        let token = CancellationToken::new();
        token.cancel();
        time::timeout(Duration::from_secs(1), ingestor.run(token))
            .await
            .expect("pre-cancelled run must return");

        let token = CancellationToken::new();
        let stopper = token.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(20)).await;
            stopper.cancel();
        });
        time::timeout(Duration::from_secs(2), ingestor.run(token))
            .await
            .expect("pending read ignored cancellation");
    }
}
