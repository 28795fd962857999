//! Payload types carried by bus events.

use std::collections::HashMap;
use std::fmt;

/// Native container action relevant to ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerAction {
    Start,
    Stop,
}

impl ContainerAction {
    /// Maps a runtime-native action string; anything but `start`/`stop` is `None`.
    pub fn from_native(action: &str) -> Option<Self> {
        match action {
            "start" => Some(ContainerAction::Start),
            "stop" => Some(ContainerAction::Stop),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerAction::Start => "start",
            ContainerAction::Stop => "stop",
        }
    }
}

impl fmt::Display for ContainerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A container lifecycle observation.
///
/// `attributes` is the container's label set (plus whatever extra actor
/// attributes the runtime attaches to live events).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerEvent {
    /// Container id.
    pub id: String,
    /// What happened to the container.
    pub action: ContainerAction,
    /// Flat label map; keys unique, order irrelevant.
    pub attributes: HashMap<String, String>,
}

impl ContainerEvent {
    pub fn new(
        id: impl Into<String>,
        action: ContainerAction,
        attributes: HashMap<String, String>,
    ) -> Self {
        Self {
            id: id.into(),
            action,
            attributes,
        }
    }
}

/// Certificate/key file pair written for one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertPair {
    pub host: String,
    /// Certificate path, forward-slash separated.
    pub cert_file: String,
    /// Private key path, forward-slash separated.
    pub key_file: String,
}

/// Descriptor of a dynamic-config update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigUpdate {
    pub host: String,
    pub cert_file: String,
    pub key_file: String,
}

impl From<CertPair> for ConfigUpdate {
    fn from(pair: CertPair) -> Self {
        Self {
            host: pair.host,
            cert_file: pair.cert_file,
            key_file: pair.key_file,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_native_only_maps_start_and_stop() {
        assert_eq!(ContainerAction::from_native("start"), Some(ContainerAction::Start));
        assert_eq!(ContainerAction::from_native("stop"), Some(ContainerAction::Stop));
        assert_eq!(ContainerAction::from_native("die"), None);
        assert_eq!(ContainerAction::from_native("Start"), None);
    }
}
