//! # docker-certs
//!
//! **docker-certs** watches the local Docker daemon and gives every
//! Traefik-routed container a locally trusted TLS certificate, a matching entry
//! in Traefik's dynamic configuration and, for `.local` hosts, an mDNS
//! announcement on the LAN.
//!
//! The crate is an event pipeline: ingestion turns container lifecycle changes
//! into typed bus events, and independently pluggable modules react to them.
//!
//! ## Architecture
//! ```text
//!      Docker daemon
//!            │ list(status=running) / events(type=container, start|stop)
//!            ▼
//! ┌─────────────────────────────────┐
//! │ Ingestor (scan + reconnect loop)│
//! └──────────────┬──────────────────┘
//!                │ ContainerStarted / ContainerStopped
//!                ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │ Bus (kind-keyed registry, one FIFO worker per subscription)     │
//! └──────┬──────────────────────┬───────────────────────┬───────────┘
//!        ▼                      ▼                       ▼
//!  ┌────────────┐  CertCreated ┌───────────────┐   ┌────────────┐
//!  │   certs    │─────────────►│ config-writer │   │    mdns    │
//!  │  (mkcert)  │   (via bus)  │ dynamic.yaml  │   │ _https._tcp│
//!  └────────────┘              └───────┬───────┘   └────────────┘
//!                                      │ ConfigUpdated
//!                                      ▼
//!                                     Bus
//! ```
//!
//! ### Lifecycle
//! ```text
//! ModuleLoader::load([certs, config-writer, mdns?])
//!   ├─► init()       (Initializable; error aborts startup)
//!   ├─► register(bus)(EventAware)
//!   └─► roster       (Closable)
//! Ingestor::scan()   ──► ContainerStarted × running containers
//! Ingestor::run(tok) ──► live events until shutdown
//! shutdown signal    ──► cancel ─► join ─► close_all() ─► bus.close()
//! ```
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use docker_certs::events::{Bus, ConfigUpdated, Event};
//! use docker_certs::{ModuleLoader, ModuleSpec};
//! use docker_certs::modules::builtin::ConfigWriter;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dir = std::env::temp_dir().join("docker-certs-doc");
//!     let bus = Bus::default();
//!     bus.subscribe(ConfigUpdated, |ev: Arc<Event<ConfigUpdated>>| async move {
//!         println!("traefik config now lists {}", ev.payload.cert_file);
//!         Ok(())
//!     });
//!
//!     let writer = Arc::new(ConfigWriter::new(dir.join("dynamic.yaml")));
//!     let mut loader = ModuleLoader::new(bus.clone());
//!     loader
//!         .load(vec![
//!             ModuleSpec::builder("config-writer", writer)
//!                 .initializable()
//!                 .event_aware()
//!                 .build(),
//!         ])
//!         .await?;
//!
//!     loader.close_all().await;
//!     bus.close();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod events;
pub mod hosts;
pub mod ingest;
pub mod modules;

mod error;

// ---- Public re-exports ----

pub use config::{Cli, Config};
pub use core::{ModuleLoader, ModuleState, ShutdownSignal, wait_for_shutdown_signal};
pub use error::{BusError, ConfigError, LifecycleError, ModuleError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use ingest::{ContainerRuntime, DockerRuntime, Ingestor};
pub use modules::{ModuleSpec, ModuleSpecBuilder};
