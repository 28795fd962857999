//! End-to-end event chain: container start ─► certificate ─► dynamic config ─► mDNS.

use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, stream};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use docker_certs::events::{ConfigUpdated, ContainerAction, ContainerEvent};
use docker_certs::ingest::EventStream;
use docker_certs::modules::builtin::mdns::{Advertisement, AddressSource};
use docker_certs::modules::builtin::{
    Advertiser, CertIssuer, CertsModule, ConfigWriter, DynamicConfig, MdnsModule,
};
use docker_certs::{
    Bus, ContainerRuntime, Event, Ingestor, ModuleError, ModuleLoader, ModuleSpec, ModuleState,
    RuntimeError,
};

const PEM: &str = "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n";

struct FakeDocker {
    running: Vec<ContainerEvent>,
    sessions: Mutex<VecDeque<Vec<Result<ContainerEvent, RuntimeError>>>>,
}

#[async_trait]
impl ContainerRuntime for FakeDocker {
    async fn list_running(&self) -> Result<Vec<ContainerEvent>, RuntimeError> {
        Ok(self.running.clone())
    }

    fn events(&self) -> EventStream {
        match self.sessions.lock().unwrap().pop_front() {
            Some(items) => stream::iter(items).boxed(),
            None => stream::pending().boxed(),
        }
    }
}

struct FakeIssuer {
    root: PathBuf,
}

#[async_trait]
impl CertIssuer for FakeIssuer {
    async fn ca_root(&self) -> PathBuf {
        self.root.clone()
    }

    async fn issue(
        &self,
        _host: &str,
        cert_file: &Path,
        key_file: &Path,
    ) -> Result<(), ModuleError> {
        tokio::fs::write(cert_file, PEM).await?;
        tokio::fs::write(key_file, "key").await?;
        Ok(())
    }
}

#[derive(Default)]
struct MemoryAdvertiser {
    live: Mutex<Vec<String>>,
}

impl Advertiser for MemoryAdvertiser {
    fn start(&self) -> Result<(), ModuleError> {
        Ok(())
    }

    fn advertise(&self, ad: &Advertisement) -> Result<String, ModuleError> {
        self.live.lock().unwrap().push(ad.host.clone());
        Ok(format!("{}._https._tcp.local.", ad.instance))
    }

    fn withdraw(&self, fullname: &str) -> Result<(), ModuleError> {
        let instance = fullname.split('.').next().unwrap_or_default().to_string();
        self.live
            .lock()
            .unwrap()
            .retain(|h| h.split('.').next() != Some(instance.as_str()));
        Ok(())
    }

    fn shutdown(&self) -> Result<(), ModuleError> {
        Ok(())
    }
}

fn routed(id: &str, action: ContainerAction, host: &str) -> ContainerEvent {
    let labels = HashMap::from([(
        "traefik.http.routers.r.rule".to_string(),
        format!("Host(`{host}`)"),
    )]);
    ContainerEvent::new(id, action, labels)
}

async fn next_update(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
    tokio::time::timeout(Duration::from_secs(3), rx.recv())
        .await
        .expect("no ConfigUpdated in time")
        .expect("channel closed")
}

async fn wait_for_live(advertiser: &MemoryAdvertiser, expected: &[&str]) {
    tokio::time::timeout(Duration::from_secs(3), async {
        while advertiser.live.lock().unwrap().clone() != expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("mdns state did not settle");
}

#[tokio::test]
async fn test_container_events_flow_through_all_modules() {
    let tmp = TempDir::new().unwrap();
    let ca = tmp.path().join("ca");
    std::fs::create_dir_all(&ca).unwrap();
    std::fs::write(ca.join("rootCA.pem"), PEM).unwrap();
    let certs_dir = tmp.path().join("certs");

    let bus = Bus::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    bus.subscribe(ConfigUpdated, move |ev: Arc<Event<ConfigUpdated>>| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(ev.payload.host.clone());
            Ok(())
        }
    });

    let advertiser = Arc::new(MemoryAdvertiser::default());
    let addresses: AddressSource = Arc::new(|| vec![Ipv4Addr::new(192, 168, 0, 2)]);
    let writer = Arc::new(ConfigWriter::new(certs_dir.join("dynamic.yaml")));

    let mut loader = ModuleLoader::new(bus.clone());
    loader
        .load(vec![
            ModuleSpec::builder(
                "certs",
                Arc::new(CertsModule::new(certs_dir.clone(), Arc::new(FakeIssuer { root: ca }))),
            )
            .event_aware()
            .build(),
            ModuleSpec::builder("config-writer", Arc::clone(&writer))
                .initializable()
                .event_aware()
                .build(),
            ModuleSpec::builder(
                "mdns",
                Arc::new(MdnsModule::with_addresses(advertiser.clone(), addresses)),
            )
            .initializable()
            .event_aware()
            .closable()
            .build(),
        ])
        .await
        .unwrap();
    assert!(certs_dir.join("dynamic.yaml").exists());

    let runtime = Arc::new(FakeDocker {
        running: vec![routed("boot", ContainerAction::Start, "boot.local")],
        sessions: Mutex::new(VecDeque::from([
            vec![],
            vec![
                Ok(routed("web", ContainerAction::Start, "web.local")),
                Ok(routed("boot", ContainerAction::Stop, "boot.local")),
            ],
        ])),
    });
    let ingestor = Arc::new(Ingestor::new(runtime, bus.clone(), Duration::from_millis(5)));

    assert_eq!(ingestor.scan().await.unwrap(), 1);
    assert_eq!(next_update(&mut rx).await, "boot.local");
    wait_for_live(&advertiser, &["boot.local"]).await;

    let token = CancellationToken::new();
    let handle = tokio::spawn({
        let ingestor = Arc::clone(&ingestor);
        let token = token.clone();
        async move { ingestor.run(token).await }
    });
    assert_eq!(next_update(&mut rx).await, "web.local");

    wait_for_live(&advertiser, &["web.local"]).await;

    token.cancel();
    handle.await.unwrap();

    let text = std::fs::read_to_string(writer.path()).unwrap();
    let files: Vec<_> = DynamicConfig::parse(&text)
        .unwrap()
        .tls
        .certificates
        .into_iter()
        .map(|c| c.cert_file)
        .collect();
    assert_eq!(files.len(), 2);
    assert!(files.iter().any(|f| f.ends_with("certs/boot.local.pem")));
    assert!(files.iter().any(|f| f.ends_with("certs/web.local.pem")));

    assert!(loader.close_all().await.is_empty());
    assert_eq!(loader.state("mdns"), Some(ModuleState::Closed));
    bus.close();
}

#[tokio::test]
async fn test_failed_init_leaves_later_modules_unloaded() {
    let tmp = TempDir::new().unwrap();
    let blocker = tmp.path().join("not-a-dir");
    std::fs::write(&blocker, "file").unwrap();

    let bus = Bus::new();
    let advertiser = Arc::new(MemoryAdvertiser::default());
    let mut loader = ModuleLoader::new(bus.clone());

    let err = loader
        .load(vec![
            ModuleSpec::builder(
                "config-writer",
                Arc::new(ConfigWriter::new(blocker.join("dynamic.yaml"))),
            )
            .initializable()
            .event_aware()
            .build(),
            ModuleSpec::builder("mdns", Arc::new(MdnsModule::new(advertiser)))
                .initializable()
                .event_aware()
                .closable()
                .build(),
        ])
        .await
        .unwrap_err();

    assert_eq!(err.as_label(), "lifecycle_init_failed");
    assert_eq!(loader.state("mdns"), Some(ModuleState::Unloaded));
    assert_eq!(bus.listener_count(docker_certs::EventKind::ContainerStarted), 0);
    assert!(loader.close_all().await.is_empty());
}
