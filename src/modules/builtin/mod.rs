//! Built-in modules.
//!
//! | Module          | Capabilities                        | Reacts to                              | Emits           |
//! |-----------------|-------------------------------------|----------------------------------------|-----------------|
//! | `certs`         | EventAware                          | `ContainerStarted`                     | `CertCreated`   |
//! | `config-writer` | Initializable, EventAware           | `CertCreated`                          | `ConfigUpdated` |
//! | `mdns`          | Initializable, EventAware, Closable | `ContainerStarted`, `ContainerStopped` | -               |

pub mod certs;
pub mod config_writer;
pub mod mdns;

use std::sync::Arc;

use crate::config::Config;
use crate::modules::ModuleSpec;

pub use certs::{CertIssuer, CertsModule, Mkcert, verify_certificate};
pub use config_writer::{ConfigWriter, DynamicConfig};
pub use mdns::{Advertiser, MdnsModule, MdnsResponder};

/// Descriptors of the built-in modules in load order, as selected by `config`.
pub fn standard_modules(config: &Config) -> Vec<ModuleSpec> {
    let certs = Arc::new(CertsModule::new(
        config.certs_dir.clone(),
        Arc::new(Mkcert::new(config.debug)),
    ));
    let writer = Arc::new(ConfigWriter::new(config.dynamic_config_path()));

    let mut modules = vec![
        ModuleSpec::builder("certs", certs).event_aware().build(),
        ModuleSpec::builder("config-writer", writer)
            .initializable()
            .event_aware()
            .build(),
    ];

    if config.mdns_publishing {
        let mdns = Arc::new(MdnsModule::new(Arc::new(MdnsResponder::new())));
        modules.push(
            ModuleSpec::builder("mdns", mdns)
                .initializable()
                .event_aware()
                .closable()
                .build(),
        );
    }

    modules
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mdns_follows_config() {
        let mut cfg = Config::default();
        let names: Vec<_> = standard_modules(&cfg).iter().map(|m| m.name().to_string()).collect();
        assert_eq!(names, ["certs", "config-writer", "mdns"]);

        cfg.mdns_publishing = false;
        let specs = standard_modules(&cfg);
        assert_eq!(specs.len(), 2);
        assert!(specs[1].capabilities().init && !specs[1].capabilities().close);
    }
}
