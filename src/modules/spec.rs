//! # Module descriptor.
//!
//! [`ModuleSpec`] bundles a module's name with the hooks it implements. It is
//! built once, at registration, through [`ModuleSpecBuilder`]; each builder
//! method is only available when the module type implements the matching
//! capability trait, so a spec can never claim a hook the module lacks.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use docker_certs::modules::{Close, ModuleSpec};
//! use docker_certs::ModuleError;
//!
//! struct Cleanup;
//!
//! #[async_trait]
//! impl Close for Cleanup {
//!     async fn close(&self) -> Result<(), ModuleError> { Ok(()) }
//! }
//!
//! let spec = ModuleSpec::builder("cleanup", Arc::new(Cleanup)).closable().build();
//! let caps = spec.capabilities();
//! assert!(caps.close && !caps.init && !caps.events);
//! ```

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use super::module::{Capabilities, Close, EventAware, Initialize};

/// Explicit capability descriptor of one module.
#[derive(Clone)]
pub struct ModuleSpec {
    name: Cow<'static, str>,
    init: Option<Arc<dyn Initialize>>,
    events: Option<Arc<dyn EventAware>>,
    close: Option<Arc<dyn Close>>,
}

impl ModuleSpec {
    /// Starts describing `module` under `name`.
    pub fn builder<M>(name: impl Into<Cow<'static, str>>, module: Arc<M>) -> ModuleSpecBuilder<M>
    where
        M: Send + Sync + 'static,
    {
        ModuleSpecBuilder {
            spec: ModuleSpec {
                name: name.into(),
                init: None,
                events: None,
                close: None,
            },
            module,
        }
    }

    /// Module name (for logs).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Capabilities declared by this spec.
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            init: self.init.is_some(),
            events: self.events.is_some(),
            close: self.close.is_some(),
        }
    }

    pub(crate) fn init_hook(&self) -> Option<&Arc<dyn Initialize>> {
        self.init.as_ref()
    }

    pub(crate) fn events_hook(&self) -> Option<&Arc<dyn EventAware>> {
        self.events.as_ref()
    }

    pub(crate) fn close_hook(&self) -> Option<&Arc<dyn Close>> {
        self.close.as_ref()
    }
}

impl fmt::Debug for ModuleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleSpec")
            .field("name", &self.name)
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

/// Fluent builder for [`ModuleSpec`].
pub struct ModuleSpecBuilder<M> {
    spec: ModuleSpec,
    module: Arc<M>,
}

impl<M> ModuleSpecBuilder<M>
where
    M: Send + Sync + 'static,
{
    /// Declares the startup hook.
    pub fn initializable(mut self) -> Self
    where
        M: Initialize,
    {
        self.spec.init = Some(self.module.clone() as Arc<dyn Initialize>);
        self
    }

    /// Declares the registration hook.
    pub fn event_aware(mut self) -> Self
    where
        M: EventAware,
    {
        self.spec.events = Some(self.module.clone() as Arc<dyn EventAware>);
        self
    }

    /// Declares the teardown hook.
    pub fn closable(mut self) -> Self
    where
        M: Close,
    {
        self.spec.close = Some(self.module.clone() as Arc<dyn Close>);
        self
    }

    pub fn build(self) -> ModuleSpec {
        self.spec
    }
}
