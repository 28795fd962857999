//! # Module loader - capability-driven lifecycle manager.
//!
//! [`ModuleLoader`] owns the modules for the lifetime of the process and drives
//! their hooks:
//!
//! ```text
//! load([m1, m2, ...])        for each module, in order:
//!   ├─► init().await         (Initializable) ── Err ─► abort: LifecycleError
//!   ├─► register(bus)        (EventAware)
//!   └─► roster.push(m)       (Closable)
//!
//! close_all()                for each roster entry, in load order:
//!   └─► close().await        Err ─► warn, continue with the next module
//! ```
//!
//! ## State per module
//! ```text
//! Unloaded ─► Initialized ─► Registered ─► Closed
//! ```
//! `Initialized` / `Registered` are skipped for modules lacking the capability.
//! There is no failed state: a module whose teardown errors is still `Closed`.
//!
//! ## Rules
//! - A failed init hook stops loading immediately; later modules are untouched.
//! - Modules are loaded once; `close_all` drains the roster, so a second call is a no-op.
//! - Registration is synchronous bus wiring only.

use crate::error::{LifecycleError, ModuleError};
use crate::events::Bus;
use crate::modules::{Capabilities, ModuleSpec};

/// Lifecycle state of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Unloaded,
    Initialized,
    Registered,
    Closed,
}

struct Entry {
    spec: ModuleSpec,
    state: ModuleState,
}

/// Loads modules in order and tears them down at shutdown.
pub struct ModuleLoader {
    bus: Bus,
    entries: Vec<Entry>,
    /// Indices into `entries` of closable modules, in load order.
    roster: Vec<usize>,
}

impl ModuleLoader {
    /// Creates a loader wiring modules to `bus`.
    pub fn new(bus: Bus) -> Self {
        Self {
            bus,
            entries: Vec::new(),
            roster: Vec::new(),
        }
    }

    /// Loads `modules` in order.
    ///
    /// ### Flow per module
    /// 1. `Initialize::init` (if declared); an error is returned immediately
    /// 2. `EventAware::register` with the bus (if declared)
    /// 3. append to the shutdown roster (if closable)
    ///
    /// Modules after a failing one are recorded as `Unloaded` and none of their
    /// hooks run. Modules loaded before the failure stay on the roster, so the
    /// caller may still `close_all`.
    pub async fn load(&mut self, modules: Vec<ModuleSpec>) -> Result<(), LifecycleError> {
        let first = self.entries.len();
        self.entries.extend(modules.into_iter().map(|spec| Entry {
            spec,
            state: ModuleState::Unloaded,
        }));

        for idx in first..self.entries.len() {
            let entry = &mut self.entries[idx];
            let name = entry.spec.name().to_string();

            if let Some(hook) = entry.spec.init_hook() {
                tracing::info!(module = %name, "initializing module");
                if let Err(source) = hook.init().await {
                    tracing::error!(
                        module = %name,
                        label = source.as_label(),
                        error = %source,
                        "module init failed"
                    );
                    return Err(LifecycleError::InitFailed {
                        module: name,
                        source,
                    });
                }
                entry.state = ModuleState::Initialized;
            }

            if let Some(hook) = entry.spec.events_hook() {
                tracing::info!(module = %name, "registering module listeners");
                hook.clone().register(&self.bus);
                entry.state = ModuleState::Registered;
            }

            if entry.spec.close_hook().is_some() {
                self.roster.push(idx);
            }

            tracing::debug!(
                module = %name,
                state = ?entry.state,
                capabilities = ?entry.spec.capabilities(),
                "module loaded"
            );
        }

        Ok(())
    }

    /// Runs every roster module's teardown hook, in load order.
    ///
    /// Best-effort: errors are logged and returned, never raised, and never
    /// prevent the remaining modules from closing.
    pub async fn close_all(&mut self) -> Vec<(String, ModuleError)> {
        let mut failures = Vec::new();

        for idx in std::mem::take(&mut self.roster) {
            let entry = &mut self.entries[idx];
            let name = entry.spec.name().to_string();

            if let Some(hook) = entry.spec.close_hook() {
                tracing::info!(module = %name, "closing module");
                if let Err(e) = hook.close().await {
                    tracing::warn!(
                        module = %name,
                        label = e.as_label(),
                        error = %e,
                        "module close failed"
                    );
                    failures.push((name, e));
                }
            }
            entry.state = ModuleState::Closed;
        }

        failures
    }

    /// Current state of the module named `name`.
    pub fn state(&self, name: &str) -> Option<ModuleState> {
        self.entries
            .iter()
            .find(|e| e.spec.name() == name)
            .map(|e| e.state)
    }

    /// Snapshot of all module states, in load order.
    pub fn states(&self) -> Vec<(String, ModuleState)> {
        self.entries
            .iter()
            .map(|e| (e.spec.name().to_string(), e.state))
            .collect()
    }

    /// Capabilities of the module named `name`.
    pub fn capabilities(&self, name: &str) -> Option<Capabilities> {
        self.entries
            .iter()
            .find(|e| e.spec.name() == name)
            .map(|e| e.spec.capabilities())
    }

    /// Names of the modules on the shutdown roster, in teardown order.
    pub fn roster(&self) -> Vec<String> {
        self.roster
            .iter()
            .map(|&idx| self.entries[idx].spec.name().to_string())
            .collect()
    }

    /// The bus modules are wired to.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ContainerStarted, Event, EventKind};
    use crate::modules::{Close, EventAware, Initialize};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    type Journal = Arc<Mutex<Vec<String>>>;

    /// Records every hook call into a shared journal.
    struct Recorder {
        name: &'static str,
        journal: Journal,
        fail_init: bool,
        fail_close: bool,
    }

    impl Recorder {
        fn new(name: &'static str, journal: &Journal) -> Arc<Self> {
            Arc::new(Self {
                name,
                journal: Arc::clone(journal),
                fail_init: false,
                fail_close: false,
            })
        }

        fn failing_init(name: &'static str, journal: &Journal) -> Arc<Self> {
            Arc::new(Self {
                fail_init: true,
                ..Self::into_inner(Self::new(name, journal))
            })
        }

        fn failing_close(name: &'static str, journal: &Journal) -> Arc<Self> {
            Arc::new(Self {
                fail_close: true,
                ..Self::into_inner(Self::new(name, journal))
            })
        }

        fn into_inner(me: Arc<Self>) -> Self {
            Arc::try_unwrap(me).ok().expect("fresh recorder")
        }

        fn log(&self, hook: &str) {
            self.journal.lock().unwrap().push(format!("{}:{hook}", self.name));
        }
    }

    #[async_trait]
    impl Initialize for Recorder {
        async fn init(&self) -> Result<(), ModuleError> {
            self.log("init");
            if self.fail_init {
                return Err(ModuleError::Fail("init refused".into()));
            }
            Ok(())
        }
    }

    impl EventAware for Recorder {
        fn register(self: Arc<Self>, bus: &Bus) {
            self.log("register");
            let noop = |_ev: Arc<Event<ContainerStarted>>| async { Ok(()) };
            bus.subscribe_as(self.name, ContainerStarted, noop);
        }
    }

    #[async_trait]
    impl Close for Recorder {
        async fn close(&self) -> Result<(), ModuleError> {
            self.log("close");
            if self.fail_close {
                return Err(ModuleError::Fail("close refused".into()));
            }
            Ok(())
        }
    }

    fn full(recorder: Arc<Recorder>) -> ModuleSpec {
        let name = recorder.name;
        ModuleSpec::builder(name, recorder)
            .initializable()
            .event_aware()
            .closable()
            .build()
    }

    fn journal() -> Journal {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn entries(j: &Journal) -> Vec<String> {
        j.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_hooks_run_in_order() {
        let j = journal();
        let mut loader = ModuleLoader::new(Bus::new());

        loader
            .load(vec![full(Recorder::new("a", &j)), full(Recorder::new("b", &j))])
            .await
            .unwrap();

        assert_eq!(entries(&j), ["a:init", "a:register", "b:init", "b:register"]);
        assert_eq!(loader.state("a"), Some(ModuleState::Registered));
        assert_eq!(loader.roster(), ["a", "b"]);
        assert_eq!(loader.bus().listener_count(EventKind::ContainerStarted), 2);
    }

    #[tokio::test]
    async fn test_closable_only_module_is_only_closed() {
        let j = journal();
        let mut loader = ModuleLoader::new(Bus::new());
        let recorder = Recorder::new("closer", &j);
        let spec = ModuleSpec::builder("closer", recorder).closable().build();

        loader.load(vec![spec]).await.unwrap();
        assert!(entries(&j).is_empty());
        assert_eq!(loader.state("closer"), Some(ModuleState::Unloaded));
        assert_eq!(loader.roster(), ["closer"]);
        assert_eq!(loader.bus().listener_count(EventKind::ContainerStarted), 0);

        let failures = loader.close_all().await;
        assert!(failures.is_empty());
        assert_eq!(entries(&j), ["closer:close"]);
        assert_eq!(loader.state("closer"), Some(ModuleState::Closed));
    }

    #[tokio::test]
    async fn test_init_failure_stops_later_modules() {
        let j = journal();
        let mut loader = ModuleLoader::new(Bus::new());

        let err = loader
            .load(vec![
                full(Recorder::new("first", &j)),
                full(Recorder::failing_init("broken", &j)),
                full(Recorder::new("later", &j)),
            ])
            .await
            .unwrap_err();

        match err {
            LifecycleError::InitFailed { module, .. } => assert_eq!(module, "broken"),
        }
        assert_eq!(entries(&j), ["first:init", "first:register", "broken:init"]);
        assert_eq!(loader.state("broken"), Some(ModuleState::Unloaded));
        assert_eq!(loader.state("later"), Some(ModuleState::Unloaded));
        assert_eq!(loader.roster(), ["first"]);
    }

    #[tokio::test]
    async fn test_close_failure_does_not_stop_siblings() {
        let j = journal();
        let mut loader = ModuleLoader::new(Bus::new());

        loader
            .load(vec![
                full(Recorder::failing_close("flaky", &j)),
                full(Recorder::new("steady", &j)),
            ])
            .await
            .unwrap();
        j.lock().unwrap().clear();

        let failures = loader.close_all().await;
        assert_eq!(entries(&j), ["flaky:close", "steady:close"]);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "flaky");
        assert_eq!(loader.state("flaky"), Some(ModuleState::Closed));
        assert_eq!(loader.state("steady"), Some(ModuleState::Closed));

        assert!(loader.close_all().await.is_empty());
        assert_eq!(entries(&j).len(), 2, "second close_all must be a no-op");
    }

    #[tokio::test]
    async fn test_module_without_capabilities_is_tracked() {
        let j = journal();
        let mut loader = ModuleLoader::new(Bus::new());
        let spec = ModuleSpec::builder("inert", Recorder::new("inert", &j)).build();

        loader.load(vec![spec]).await.unwrap();
        assert!(loader.capabilities("inert").unwrap().is_empty());
        assert_eq!(loader.states(), vec![("inert".to_string(), ModuleState::Unloaded)]);
        assert!(loader.roster().is_empty());
    }
}
