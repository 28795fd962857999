//! # Certificate issuance.
//!
//! On every `ContainerStarted`, the certs module makes sure each routed host has
//! a locally trusted certificate:
//!
//! ```text
//! ContainerStarted ─► extract_hosts(labels) ─► for each host:
//!     <certs_dir>/<host>.pem valid? ── yes ─► skip
//!            │ no
//!            ▼
//!     issuer.issue(host) ─► publish CertCreated { host, cert_file, key_file }
//! ```
//!
//! An existing certificate is reused only if [`verify_certificate`] accepts it:
//! the first PEM `CERTIFICATE` block parses as X.509, the current time lies in
//! its validity period, and its signature checks out against a currently valid
//! certificate of the CA root (`rootCA.pem`) whose subject is its issuer.
//! Anything else (corrupt, expired, or minted by a rotated CA) is reissued.
//!
//! Issuing goes through the [`CertIssuer`] seam; [`Mkcert`] shells out to
//! `mkcert`.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use x509_parser::certificate::X509Certificate;

use crate::error::ModuleError;
use crate::events::{Bus, CertCreated, CertPair, ContainerStarted, Event};
use crate::hosts::extract_hosts;
use crate::modules::EventAware;

/// File name of the CA certificate inside the CA root directory.
pub const ROOT_CA_FILE: &str = "rootCA.pem";

/// Produces certificate/key pairs for host names.
#[async_trait]
pub trait CertIssuer: Send + Sync + 'static {
    /// Directory holding the issuing CA's `rootCA.pem`.
    async fn ca_root(&self) -> PathBuf;

    /// Writes a certificate and key for `host` to the given paths.
    async fn issue(
        &self,
        host: &str,
        cert_file: &Path,
        key_file: &Path,
    ) -> Result<(), ModuleError>;
}

/// [`CertIssuer`] backed by the `mkcert` binary.
#[derive(Debug, Clone, Default)]
pub struct Mkcert {
    /// Let the child inherit stdout/stderr.
    verbose: bool,
}

impl Mkcert {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

#[async_trait]
impl CertIssuer for Mkcert {
    /// `$CAROOT` if set, else `mkcert -CAROOT`, else the working directory.
    async fn ca_root(&self) -> PathBuf {
        if let Some(root) = std::env::var_os("CAROOT").filter(|r| !r.is_empty()) {
            return PathBuf::from(root);
        }

        match Command::new("mkcert").arg("-CAROOT").output().await {
            Ok(out) if out.status.success() => {
                PathBuf::from(String::from_utf8_lossy(&out.stdout).trim())
            }
            Ok(out) => {
                tracing::warn!(status = %out.status, "mkcert -CAROOT failed");
                PathBuf::from(".")
            }
            Err(e) => {
                tracing::warn!(error = %e, "mkcert not runnable");
                PathBuf::from(".")
            }
        }
    }

    async fn issue(
        &self,
        host: &str,
        cert_file: &Path,
        key_file: &Path,
    ) -> Result<(), ModuleError> {
        let mut cmd = Command::new("mkcert");
        cmd.arg("-cert-file")
            .arg(cert_file)
            .arg("-key-file")
            .arg(key_file)
            .arg(host);
        if !self.verbose {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }

        let status = cmd.status().await.map_err(|e| ModuleError::Command {
            program: "mkcert".into(),
            reason: e.to_string(),
        })?;
        if !status.success() {
            return Err(ModuleError::Command {
                program: "mkcert".into(),
                reason: status.to_string(),
            });
        }
        Ok(())
    }
}

/// Issues certificates for routed hosts and announces them.
pub struct CertsModule {
    certs_dir: PathBuf,
    issuer: Arc<dyn CertIssuer>,
}

impl CertsModule {
    pub fn new(certs_dir: impl Into<PathBuf>, issuer: Arc<dyn CertIssuer>) -> Self {
        Self {
            certs_dir: certs_dir.into(),
            issuer,
        }
    }

    /// Certificate and key paths for `host`.
    pub fn paths(&self, host: &str) -> (PathBuf, PathBuf) {
        (
            self.certs_dir.join(format!("{host}.pem")),
            self.certs_dir.join(format!("{host}-key.pem")),
        )
    }

    /// Issues a certificate for `host` unless a valid one exists.
    ///
    /// Publishes `CertCreated` and returns `true` when a certificate was issued.
    pub async fn ensure(&self, host: &str, bus: &Bus) -> Result<bool, ModuleError> {
        let (cert_file, key_file) = self.paths(host);

        if self.is_valid(&cert_file).await {
            tracing::info!(host, "certificate already present and valid");
            return Ok(false);
        }

        tracing::info!(host, "creating certificate");
        tokio::fs::create_dir_all(&self.certs_dir).await?;
        self.issuer.issue(host, &cert_file, &key_file).await?;

        let pair = CertPair {
            host: host.to_string(),
            cert_file: slash_path(&cert_file),
            key_file: slash_path(&key_file),
        };
        bus.publish(Event::new(CertCreated, pair));
        Ok(true)
    }

    async fn is_valid(&self, cert_file: &Path) -> bool {
        let cert = match tokio::fs::read(cert_file).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return false,
            Err(e) => {
                tracing::warn!(path = %cert_file.display(), error = %e, "certificate unreadable");
                return false;
            }
        };

        let root = self.issuer.ca_root().await.join(ROOT_CA_FILE);
        let roots = match tokio::fs::read(&root).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(path = %root.display(), error = %e, "CA root unreadable");
                return false;
            }
        };

        match verify_certificate(&cert, &roots) {
            Ok(()) => true,
            Err(e) => {
                tracing::info!(
                    path = %cert_file.display(),
                    label = e.as_label(),
                    error = %e,
                    "existing certificate rejected"
                );
                false
            }
        }
    }
}

impl EventAware for CertsModule {
    fn register(self: Arc<Self>, bus: &Bus) {
        let publisher = bus.clone();
        bus.subscribe_as("certs", ContainerStarted, move |ev: Arc<Event<ContainerStarted>>| {
            let module = Arc::clone(&self);
            let bus = publisher.clone();
            async move {
                for host in extract_hosts(&ev.payload.attributes) {
                    if let Err(e) = module.ensure(&host, &bus).await {
                        tracing::warn!(
                            host = %host,
                            label = e.as_label(),
                            error = %e,
                            "certificate not created"
                        );
                    }
                }
                Ok(())
            }
        });
    }
}

/// Verifies the first certificate of `cert_pem` against the CA certificates in `roots_pem`.
///
/// Succeeds when the certificate is inside its validity period and is signed by
/// a root that is itself currently valid and whose subject matches the issuer.
pub fn verify_certificate(cert_pem: &[u8], roots_pem: &[u8]) -> Result<(), ModuleError> {
    let der = pem_certificates(cert_pem)?
        .into_iter()
        .next()
        .ok_or_else(|| ModuleError::Certificate("no PEM certificate block".into()))?;
    let cert = parse_der(&der)?;

    if !cert.validity().is_valid() {
        return Err(ModuleError::Certificate("outside its validity period".into()));
    }

    let roots = pem_certificates(roots_pem)?;
    if roots.is_empty() {
        return Err(ModuleError::Certificate("CA root holds no certificate".into()));
    }

    for der in &roots {
        let root = match parse_der(der) {
            Ok(root) => root,
            Err(e) => {
                tracing::debug!(error = %e, "skipping unparsable CA root entry");
                continue;
            }
        };
        if root.subject().as_raw() != cert.issuer().as_raw() || !root.validity().is_valid() {
            continue;
        }
        if cert.verify_signature(Some(root.public_key())).is_ok() {
            return Ok(());
        }
    }
    Err(ModuleError::Certificate("not signed by the CA root".into()))
}

fn pem_certificates(pem: &[u8]) -> Result<Vec<Vec<u8>>, ModuleError> {
    Ok(rustls_pemfile::certs(&mut &pem[..])?)
}

fn parse_der(der: &[u8]) -> Result<X509Certificate<'_>, ModuleError> {
    x509_parser::parse_x509_certificate(der)
        .map(|(_, cert)| cert)
        .map_err(|e| ModuleError::Certificate(format!("malformed X.509: {e}")))
}

fn slash_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
