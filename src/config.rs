//! # Process configuration.
//!
//! [`Config`] holds everything the binary needs to wire the pipeline: where
//! certificates live, whether mDNS advertising is on, and how fast ingestion
//! reconnects.
//!
//! Values come from CLI flags or `APP_*` environment variables through [`Cli`];
//! library users may build a [`Config`] directly.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use docker_certs::Config;
//!
//! let mut cfg = Config::default();
//! cfg.certs_dir = "/var/lib/certs".into();
//! cfg.reconnect_delay = Duration::from_millis(250);
//!
//! assert!(cfg.validate().is_ok());
//! assert_eq!(cfg.dynamic_config_path().to_str(), Some("/var/lib/certs/dynamic.yaml"));
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::error::ConfigError;

/// File name of the Traefik dynamic configuration inside the certs directory.
pub const DYNAMIC_CONFIG_FILE: &str = "dynamic.yaml";

/// Upper bound for the reconnect delay.
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(3600);

/// Runtime configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Application name (log context only).
    pub name: String,
    /// Verbose logging and child process output.
    pub debug: bool,
    /// Advertise `.local` hosts over mDNS.
    pub mdns_publishing: bool,
    /// Directory holding certificates, keys and `dynamic.yaml`.
    pub certs_dir: PathBuf,
    /// Fixed delay between container event stream reconnects.
    pub reconnect_delay: Duration,
}

impl Default for Config {
    /// - `name = "docker-certs"`
    /// - `debug = false`
    /// - `mdns_publishing = true`
    /// - `certs_dir = "certs"`
    /// - `reconnect_delay = 1s`
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            debug: false,
            mdns_publishing: true,
            certs_dir: PathBuf::from("certs"),
            reconnect_delay: Duration::from_secs(1),
        }
    }
}

impl Config {
    /// Path of the Traefik dynamic configuration file.
    pub fn dynamic_config_path(&self) -> PathBuf {
        self.certs_dir.join(DYNAMIC_CONFIG_FILE)
    }

    /// Checks field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "name",
                reason: "must not be empty".into(),
            });
        }
        if self.certs_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "certs_dir",
                reason: "must not be empty".into(),
            });
        }
        if self.reconnect_delay > MAX_RECONNECT_DELAY {
            return Err(ConfigError::ReconnectDelay(self.reconnect_delay));
        }
        Ok(())
    }
}

/// Command line interface; every flag can also be set from the environment.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "docker-certs",
    version,
    about = "Local TLS certificates and mDNS names for Traefik-routed Docker containers"
)]
pub struct Cli {
    /// Application name used in logs.
    #[arg(long, env = "APP_NAME", default_value = "docker-certs")]
    pub name: String,

    /// Enable debug logging and show mkcert output.
    #[arg(long, env = "APP_DEBUG", default_value_t = false)]
    pub debug: bool,

    /// Advertise `.local` hosts over mDNS.
    #[arg(
        long,
        env = "APP_MDNS_PUBLISHING",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub mdns_publishing: bool,

    /// Directory for certificates, keys and dynamic.yaml.
    #[arg(long, env = "APP_CERTS_DIR", default_value = "certs")]
    pub certs_dir: PathBuf,

    /// Delay between event stream reconnects, in milliseconds.
    #[arg(long, env = "APP_RECONNECT_DELAY_MS", default_value_t = 1000)]
    pub reconnect_delay_ms: u64,
}

impl Cli {
    /// Converts parsed arguments into a validated [`Config`].
    pub fn into_config(self) -> Result<Config, ConfigError> {
        let cfg = Config {
            name: self.name,
            debug: self.debug,
            mdns_publishing: self.mdns_publishing,
            certs_dir: self.certs_dir,
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
        };
        cfg.validate()?;
        Ok(cfg)
    }
}
