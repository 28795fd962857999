//! # mDNS advertising of `.local` hosts.
//!
//! Makes routed `.local` hosts resolvable on the LAN without DNS setup:
//!
//! ```text
//! ContainerStarted ─► extract_hosts ─► *.local, not yet advertised ─► advertise
//! ContainerStopped ─► extract_hosts ─► advertised                  ─► withdraw
//! close()          ─► withdraw all ─► shut the responder down
//! ```
//!
//! Each host `app.local` is announced as instance `app` of `_https._tcp.local.`
//! on port 443, host name `app.local.`, with TXT `path=/` and the machine's
//! private LAN IPv4 addresses (`10.0.0.0/8`, `192.168.0.0/16`).
//!
//! The network side sits behind [`Advertiser`]; [`MdnsResponder`] drives an
//! `mdns-sd` daemon.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use mdns_sd::{ServiceDaemon, ServiceInfo};

use crate::error::ModuleError;
use crate::events::{Bus, ContainerStarted, ContainerStopped, Event};
use crate::hosts::extract_hosts;
use crate::modules::{Close, EventAware, Initialize};

pub const SERVICE_TYPE: &str = "_https._tcp.local.";
pub const SERVICE_PORT: u16 = 443;
const LOCAL_SUFFIX: &str = ".local";

/// One service announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub host: String,
    /// First label of the host.
    pub instance: String,
    /// Fully qualified host name (trailing dot).
    pub host_name: String,
    pub addresses: Vec<Ipv4Addr>,
}

impl Advertisement {
    /// Builds the announcement for `host`; `None` unless it ends in `.local`.
    pub fn for_host(host: &str, addresses: Vec<Ipv4Addr>) -> Option<Self> {
        if !host.ends_with(LOCAL_SUFFIX) {
            return None;
        }
        let instance = host.split('.').next().unwrap_or(host).to_string();
        Some(Self {
            host: host.to_string(),
            instance,
            host_name: format!("{host}."),
            addresses,
        })
    }
}

/// Network side of service advertisement.
pub trait Advertiser: Send + Sync + 'static {
    /// Prepares the responder.
    fn start(&self) -> Result<(), ModuleError>;

    /// Announces `ad`; returns the registered full service name.
    fn advertise(&self, ad: &Advertisement) -> Result<String, ModuleError>;

    /// Withdraws a previously announced service.
    fn withdraw(&self, fullname: &str) -> Result<(), ModuleError>;

    /// Stops the responder.
    fn shutdown(&self) -> Result<(), ModuleError>;
}

/// [`Advertiser`] backed by an `mdns-sd` [`ServiceDaemon`].
#[derive(Default)]
pub struct MdnsResponder {
    daemon: Mutex<Option<ServiceDaemon>>,
}

impl MdnsResponder {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_daemon<R>(
        &self,
        f: impl FnOnce(&ServiceDaemon) -> Result<R, mdns_sd::Error>,
    ) -> Result<R, ModuleError> {
        let guard = self.daemon.lock().unwrap_or_else(PoisonError::into_inner);
        let daemon = guard
            .as_ref()
            .ok_or_else(|| ModuleError::Mdns("responder not started".into()))?;
        f(daemon).map_err(|e| ModuleError::Mdns(e.to_string()))
    }
}

impl Advertiser for MdnsResponder {
    fn start(&self) -> Result<(), ModuleError> {
        let mut guard = self.daemon.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_none() {
            let daemon = ServiceDaemon::new().map_err(|e| ModuleError::Mdns(e.to_string()))?;
            *guard = Some(daemon);
        }
        Ok(())
    }

    fn advertise(&self, ad: &Advertisement) -> Result<String, ModuleError> {
        let ips = ad
            .addresses
            .iter()
            .map(Ipv4Addr::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let properties = [("path", "/")];

        let info = ServiceInfo::new(
            SERVICE_TYPE,
            &ad.instance,
            &ad.host_name,
            ips.as_str(),
            SERVICE_PORT,
            &properties[..],
        )
        .map_err(|e| ModuleError::Mdns(e.to_string()))?;
        let info = if ad.addresses.is_empty() {
            info.enable_addr_auto()
        } else {
            info
        };

        let fullname = info.get_fullname().to_string();
        self.with_daemon(|daemon| daemon.register(info))?;
        Ok(fullname)
    }

    fn withdraw(&self, fullname: &str) -> Result<(), ModuleError> {
        self.with_daemon(|daemon| daemon.unregister(fullname).map(|_| ()))
    }

    fn shutdown(&self) -> Result<(), ModuleError> {
        let taken = self
            .daemon
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match taken {
            Some(daemon) => daemon
                .shutdown()
                .map(|_| ())
                .map_err(|e| ModuleError::Mdns(e.to_string())),
            None => Ok(()),
        }
    }
}

/// Source of the addresses to announce.
pub type AddressSource = Arc<dyn Fn() -> Vec<Ipv4Addr> + Send + Sync>;

/// Advertises routed `.local` hosts while their containers run.
pub struct MdnsModule {
    advertiser: Arc<dyn Advertiser>,
    addresses: AddressSource,
    /// host -> registered full service name
    advertised: Mutex<HashMap<String, String>>,
}

impl MdnsModule {
    /// Module announcing this machine's LAN addresses.
    pub fn new(advertiser: Arc<dyn Advertiser>) -> Self {
        Self::with_addresses(advertiser, Arc::new(lan_ipv4))
    }

    pub fn with_addresses(advertiser: Arc<dyn Advertiser>, addresses: AddressSource) -> Self {
        Self {
            advertiser,
            addresses,
            advertised: Mutex::new(HashMap::new()),
        }
    }

    /// Announces `host` unless it is not `.local` or already announced.
    ///
    /// Returns `true` when a new announcement was made.
    pub fn advertise(&self, host: &str) -> Result<bool, ModuleError> {
        let Some(ad) = Advertisement::for_host(host, (self.addresses)()) else {
            tracing::debug!(host, "not a .local host, not advertised");
            return Ok(false);
        };

        let mut advertised = self.lock();
        if advertised.contains_key(host) {
            return Ok(false);
        }

        let fullname = self.advertiser.advertise(&ad)?;
        tracing::info!(
            host,
            service = %fullname,
            port = SERVICE_PORT,
            addresses = ?ad.addresses,
            "advertised service"
        );
        advertised.insert(host.to_string(), fullname);
        Ok(true)
    }

    /// Withdraws `host`'s announcement, if any.
    ///
    /// The host stays tracked when the withdrawal fails, so a later stop or
    /// `close` retries it.
    pub fn withdraw(&self, host: &str) -> Result<bool, ModuleError> {
        let mut advertised = self.lock();
        let Some(fullname) = advertised.get(host) else {
            return Ok(false);
        };

        self.advertiser.withdraw(fullname)?;
        tracing::info!(host, service = %fullname, "withdrew service");
        advertised.remove(host);
        Ok(true)
    }

    /// Hosts currently announced, sorted.
    pub fn advertised(&self) -> Vec<String> {
        let mut hosts: Vec<_> = self.lock().keys().cloned().collect();
        hosts.sort();
        hosts
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.advertised.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Initialize for MdnsModule {
    async fn init(&self) -> Result<(), ModuleError> {
        self.advertiser.start()?;
        tracing::info!(service = SERVICE_TYPE, "mdns responder started");
        Ok(())
    }
}

impl EventAware for MdnsModule {
    fn register(self: Arc<Self>, bus: &Bus) {
        let module = Arc::clone(&self);
        bus.subscribe_as("mdns", ContainerStarted, move |ev: Arc<Event<ContainerStarted>>| {
            let module = Arc::clone(&module);
            async move {
                for host in extract_hosts(&ev.payload.attributes) {
                    if let Err(e) = module.advertise(&host) {
                        tracing::warn!(
                            host = %host,
                            label = e.as_label(),
                            error = %e,
                            "mdns register failed"
                        );
                    }
                }
                Ok(())
            }
        });

        bus.subscribe_as("mdns", ContainerStopped, move |ev: Arc<Event<ContainerStopped>>| {
            let module = Arc::clone(&self);
            async move {
                for host in extract_hosts(&ev.payload.attributes) {
                    if let Err(e) = module.withdraw(&host) {
                        tracing::warn!(
                            host = %host,
                            label = e.as_label(),
                            error = %e,
                            "mdns unregister failed"
                        );
                    }
                }
                Ok(())
            }
        });
    }
}

#[async_trait]
impl Close for MdnsModule {
    /// Withdraws every announcement, then stops the responder.
    ///
    /// Reports the first failure after attempting everything.
    async fn close(&self) -> Result<(), ModuleError> {
        let drained: Vec<_> = self.lock().drain().collect();
        tracing::info!(services = drained.len(), "shutting down mdns services");

        let mut first_err = None;
        for (host, fullname) in drained {
            if let Err(e) = self.advertiser.withdraw(&fullname) {
                tracing::warn!(host = %host, error = %e, "mdns unregister failed");
                first_err.get_or_insert(e);
            }
        }
        if let Err(e) = self.advertiser.shutdown() {
            first_err.get_or_insert(e);
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Private LAN IPv4 addresses of this machine.
pub fn lan_ipv4() -> Vec<Ipv4Addr> {
    match get_if_addrs::get_if_addrs() {
        Ok(ifaces) => ifaces
            .into_iter()
            .filter_map(|iface| match iface.addr {
                get_if_addrs::IfAddr::V4(v4) => Some(v4.ip),
                get_if_addrs::IfAddr::V6(_) => None,
            })
            .filter(|ip| is_lan(*ip))
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, "cannot list network interfaces");
            Vec::new()
        }
    }
}

/// `10.0.0.0/8` or `192.168.0.0/16`.
fn is_lan(ip: Ipv4Addr) -> bool {
    let [a, b, _, _] = ip.octets();
    a == 10 || (a == 192 && b == 168)
}
