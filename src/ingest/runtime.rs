//! Container runtime seam.
//!
//! [`ContainerRuntime`] is everything ingestion needs from a container engine:
//! a snapshot of running containers and a live lifecycle stream. The production
//! implementation is [`DockerRuntime`](super::DockerRuntime); tests plug in
//! in-memory fakes.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::RuntimeError;
use crate::events::ContainerEvent;

/// Live lifecycle stream.
///
/// End of stream means the connection closed; an `Err` item means it broke.
/// Both end the current session and make ingestion reconnect.
pub type EventStream = BoxStream<'static, Result<ContainerEvent, RuntimeError>>;

/// Source of container lifecycle observations.
#[async_trait]
pub trait ContainerRuntime: Send + Sync + 'static {
    /// Containers currently running, each as a `start` observation carrying its labels.
    async fn list_running(&self) -> Result<Vec<ContainerEvent>, RuntimeError>;

    /// Opens a new live stream of `start`/`stop` observations.
    fn events(&self) -> EventStream;
}
