//! Error types used by the bus, the module lifecycle and ingestion.
//!
//! - [`BusError`]: registry inconsistencies detected by the event bus.
//! - [`ModuleError`]: failures raised by module hooks and event handlers.
//! - [`LifecycleError`]: fatal startup errors from the module loader.
//! - [`RuntimeError`]: container runtime connection/stream failures.
//! - [`ConfigError`]: invalid process configuration.
//!
//! Each type provides `as_label` returning a short stable snake_case label for logs.

use std::time::Duration;

use thiserror::Error;

use crate::events::EventKind;

/// # Errors produced by the event bus.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BusError {
    /// The listeners stored for a kind do not carry the payload type of its topic.
    ///
    /// Indicates a publisher/subscriber contract break; never expected at runtime.
    #[error("payload mismatch for {kind}: expected listeners of {expected}")]
    PayloadMismatch {
        /// Kind whose registry entry is inconsistent.
        kind: EventKind,
        /// Payload type the caller used.
        expected: &'static str,
    },
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::PayloadMismatch { .. } => "bus_payload_mismatch",
        }
    }
}

/// # Errors produced by modules (hooks and event handlers).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ModuleError {
    /// Filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Dynamic config could not be (de)serialized.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// An external command exited unsuccessfully.
    #[error("command `{program}` failed: {reason}")]
    Command {
        /// Program name.
        program: String,
        /// Exit status or spawn error.
        reason: String,
    },

    /// Service advertisement failure.
    #[error("mdns error: {0}")]
    Mdns(String),

    /// A certificate is unusable (malformed, expired or not issued by the CA root).
    #[error("invalid certificate: {0}")]
    Certificate(String),

    /// Any other failure.
    #[error("{0}")]
    Fail(String),
}

impl ModuleError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use docker_certs::ModuleError;
    ///
    /// let err = ModuleError::Mdns("daemon stopped".into());
    /// assert_eq!(err.as_label(), "module_mdns");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ModuleError::Io(_) => "module_io",
            ModuleError::Yaml(_) => "module_yaml",
            ModuleError::Command { .. } => "module_command",
            ModuleError::Mdns(_) => "module_mdns",
            ModuleError::Certificate(_) => "module_certificate",
            ModuleError::Fail(_) => "module_failed",
        }
    }
}

/// # Fatal errors raised while loading modules.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// A module's init hook failed; loading stopped at this module.
    #[error("module `{module}` failed to initialize: {source}")]
    InitFailed {
        /// Name of the failing module.
        module: String,
        /// Underlying hook error.
        #[source]
        source: ModuleError,
    },
}

impl LifecycleError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            LifecycleError::InitFailed { .. } => "lifecycle_init_failed",
        }
    }
}

/// # Errors produced by the container runtime client.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Could not connect to the runtime.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Listing containers failed.
    #[error("list containers failed: {0}")]
    List(String),

    /// The live event stream reported an error.
    #[error("event stream error: {0}")]
    Stream(String),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Connect(_) => "runtime_connect",
            RuntimeError::List(_) => "runtime_list",
            RuntimeError::Stream(_) => "runtime_stream",
        }
    }

    /// Transient errors end the current stream and trigger a reconnect.
    pub fn is_transient(&self) -> bool {
        matches!(self, RuntimeError::Stream(_))
    }
}

/// # Invalid process configuration.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A field failed validation.
    #[error("invalid config `{field}`: {reason}")]
    Invalid {
        /// Field name.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// The reconnect delay does not fit the supported range.
    #[error("reconnect delay {0:?} out of range")]
    ReconnectDelay(Duration),
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Invalid { .. } => "config_invalid",
            ConfigError::ReconnectDelay(_) => "config_reconnect_delay",
        }
    }
}
