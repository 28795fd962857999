//! Container event ingestion: runtime client and the reconnecting event loop.

mod docker;
mod ingestor;
mod runtime;

pub use docker::DockerRuntime;
pub use ingestor::Ingestor;
pub use runtime::{ContainerRuntime, EventStream};
