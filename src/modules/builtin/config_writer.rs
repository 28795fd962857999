//! # Traefik dynamic configuration writer.
//!
//! Keeps `<certs_dir>/dynamic.yaml` in sync with the issued certificates so the
//! reverse proxy picks them up:
//!
//! ```yaml
//! tls:
//!   certificates:
//!     - certFile: certs/app.local.pem
//!       keyFile: certs/app.local-key.pem
//! ```
//!
//! ## Rules
//! - `init` creates the directory and an empty file when missing; never truncates.
//! - Updates are read-modify-write under one async mutex, so concurrent
//!   `CertCreated` events never lose entries.
//! - Entries are keyed by `certFile`; a repeated certificate is not appended again.
//! - Every processed `CertCreated` is followed by a `ConfigUpdated`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::ModuleError;
use crate::events::{Bus, CertCreated, CertPair, ConfigUpdate, ConfigUpdated, Event};
use crate::modules::{EventAware, Initialize};

/// Root of the dynamic configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicConfig {
    #[serde(default)]
    pub tls: TlsSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsSection {
    #[serde(default)]
    pub certificates: Vec<CertificateEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateEntry {
    pub cert_file: String,
    pub key_file: String,
}

impl DynamicConfig {
    /// Parses a document; an empty file is an empty config.
    pub fn parse(text: &str) -> Result<Self, ModuleError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Appends the pair unless its certificate is already listed.
    ///
    /// Returns `true` when an entry was added.
    pub fn upsert(&mut self, cert_file: &str, key_file: &str) -> bool {
        let certs = &mut self.tls.certificates;
        if certs.iter().any(|c| c.cert_file == cert_file) {
            return false;
        }
        certs.push(CertificateEntry {
            cert_file: cert_file.to_string(),
            key_file: key_file.to_string(),
        });
        true
    }
}

/// Maintains the dynamic configuration file.
pub struct ConfigWriter {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ConfigWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records `pair` in the file; returns `true` if it was not there yet.
    pub async fn record(&self, pair: &CertPair) -> Result<bool, ModuleError> {
        let _guard = self.lock.lock().await;

        self.ensure_file().await?;
        let text = tokio::fs::read_to_string(&self.path).await?;
        let mut config = DynamicConfig::parse(&text)?;

        let added = config.upsert(&pair.cert_file, &pair.key_file);
        let yaml = serde_yaml::to_string(&config)?;
        tokio::fs::write(&self.path, yaml).await?;

        tracing::info!(
            host = %pair.host,
            cert_file = %pair.cert_file,
            added,
            total = config.tls.certificates.len(),
            "dynamic config written"
        );
        Ok(added)
    }

    async fn on_cert_created(&self, bus: &Bus, pair: &CertPair) -> Result<(), ModuleError> {
        self.record(pair).await?;
        bus.publish(Event::new(ConfigUpdated, ConfigUpdate::from(pair.clone())));
        Ok(())
    }

    async fn ensure_file(&self) -> Result<(), ModuleError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Initialize for ConfigWriter {
    async fn init(&self) -> Result<(), ModuleError> {
        let _guard = self.lock.lock().await;
        self.ensure_file().await?;
        tracing::info!(path = %self.path.display(), "dynamic config ready");
        Ok(())
    }
}

impl EventAware for ConfigWriter {
    fn register(self: Arc<Self>, bus: &Bus) {
        let publisher = bus.clone();
        bus.subscribe_as("config-writer", CertCreated, move |ev: Arc<Event<CertCreated>>| {
            let writer = Arc::clone(&self);
            let bus = publisher.clone();
            async move { writer.on_cert_created(&bus, &ev.payload).await }
        });
    }
}
