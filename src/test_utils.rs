// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities: a mock Kubernetes API and in-memory fakes for the
//! controller's collaborators.

use crate::admin::Admin;
use crate::engine::{DesktopClient, DesktopSettings, EngineClient, EngineInfo, EngineVersion};
use crate::error::{DevclusterError, Result};
use crate::kubernetes::contexts::remove_entries;
use crate::kubernetes::{ClientLoader, ContextStore};
use crate::process::CommandRunner;
use crate::registry::RegistryCoordinator;
use crate::retry::{Clock, Poller};
use crate::selector::{FieldSelector, ListOptions};
use crate::types::{Cluster, LocalRegistryHostingV1, Registry, RegistryList};
use async_trait::async_trait;
use http::{Request, Response};
use kube::client::Body;
use kube::config::Kubeconfig;
use kube::Client;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::Service;

/// A mock HTTP service that returns predefined responses based on request paths.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
    requests: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses.lock().unwrap().insert(
            (method.to_string(), path.to_string()),
            (status, body.to_string()),
        );
        self
    }

    /// Add a response for GET requests matching the exact path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    pub fn on_post(self, path: &str, status: u16, body: &str) -> Self {
        self.on("POST", path, status, body)
    }

    pub fn on_patch(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PATCH", path, status, body)
    }

    /// Method and path of every request received so far
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "default")
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        self.responses
            .lock()
            .unwrap()
            .get(&(method.to_string(), path.to_string()))
            .cloned()
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();

        let response = self.find_response(&method, &path);
        self.requests.lock().unwrap().push((method, path.clone()));

        Box::pin(async move {
            let (status, body) =
                response.unwrap_or_else(|| (404, not_found_json("resource", &path)));
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))
                .unwrap())
        })
    }
}

/// Create a 404 not found response
pub fn not_found_json(resource: &str, name: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": format!("{} \"{}\" not found", resource, name),
        "reason": "NotFound",
        "code": 404
    })
    .to_string()
}

/// A NodeList with one node per creation timestamp
pub fn node_list_json(created: &[&str]) -> String {
    let items: Vec<_> = created
        .iter()
        .enumerate()
        .map(|(i, ts)| {
            serde_json::json!({
                "metadata": {
                    "name": format!("node-{}", i),
                    "creationTimestamp": ts
                }
            })
        })
        .collect();
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "NodeList",
        "metadata": {"resourceVersion": "1"},
        "items": items
    })
    .to_string()
}

/// Body of the API server's `/version` endpoint
pub fn version_json(git_version: &str) -> String {
    let minor = git_version.split('.').nth(1).unwrap_or("0");
    serde_json::json!({
        "major": "1",
        "minor": minor,
        "gitVersion": git_version,
        "gitCommit": "0000000000000000000000000000000000000000",
        "gitTreeState": "clean",
        "buildDate": "2024-04-17T17:27:03Z",
        "goVersion": "go1.22.2",
        "compiler": "gc",
        "platform": "linux/amd64"
    })
    .to_string()
}

pub fn hosting_config_map_json(host: &str) -> String {
    let payload = format!("host: \"{}\"\nhelp: \"https://kind.sigs.k8s.io/docs/user/local-registry/\"\n", host);
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": {
            "name": "local-registry-hosting",
            "namespace": "kube-public"
        },
        "data": {
            "localRegistryHosting.v1": payload
        }
    })
    .to_string()
}

/// `docker inspect` output for a registry container publishing port 5000
pub fn container_inspect_json(name: &str, host_port: u16, running: bool) -> String {
    serde_json::json!([{
        "Id": "abc123",
        "Name": format!("/{}", name),
        "Created": "2024-05-01T08:00:00Z",
        "State": {"Running": running},
        "NetworkSettings": {
            "Networks": {
                "bridge": {"IPAddress": "172.17.0.2"},
                "kind": {"IPAddress": "172.18.0.3"}
            },
            "Ports": {
                "5000/tcp": [{"HostIp": "127.0.0.1", "HostPort": host_port.to_string()}]
            }
        }
    }])
    .to_string()
}

/// A kubeconfig with one context, cluster and user per `(context, cluster)` pair
pub fn kubeconfig_with(current: Option<&str>, contexts: &[(&str, &str)]) -> Kubeconfig {
    let doc = serde_json::json!({
        "apiVersion": "v1",
        "kind": "Config",
        "current-context": current,
        "clusters": contexts.iter().map(|(_, cluster)| serde_json::json!({
            "name": cluster,
            "cluster": {"server": format!("http://{}.localhost:8080", cluster)}
        })).collect::<Vec<_>>(),
        "users": contexts.iter().map(|(context, _)| serde_json::json!({
            "name": context,
            "user": {}
        })).collect::<Vec<_>>(),
        "contexts": contexts.iter().map(|(context, cluster)| serde_json::json!({
            "name": context,
            "context": {"cluster": cluster, "user": context}
        })).collect::<Vec<_>>(),
    });
    serde_json::from_value(doc).unwrap()
}

pub fn registry_on(name: &str, host_port: u16, networks: &[&str]) -> Registry {
    let mut registry = Registry::new(name);
    registry.status.host_port = host_port;
    registry.status.container_port = 5000;
    registry.status.ip_address = "172.17.0.2".to_string();
    registry.status.container_id = format!("{}-id", name);
    registry.status.networks = networks.iter().map(|n| n.to_string()).collect();
    registry
}

/// Writer whose output can be read back
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Ordered record of side effects across fakes
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Clock that records requested sleeps and returns immediately
#[derive(Default)]
pub struct RecordingClock {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingClock {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for RecordingClock {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

pub fn instant_poller() -> Poller {
    Poller::new(
        5,
        Duration::from_secs(1),
        Arc::new(RecordingClock::default()),
        CancellationToken::new(),
    )
}

struct CannedOutput {
    prefix: String,
    output: std::result::Result<String, String>,
    once: bool,
}

/// Command runner that records command lines instead of running them.
///
/// Output is canned per command-line prefix; unmatched commands print nothing.
#[derive(Default)]
pub struct RecordingRunner {
    commands: Mutex<Vec<(String, Option<String>)>>,
    canned: Mutex<Vec<CannedOutput>>,
}

impl RecordingRunner {
    fn can(self, prefix: &str, output: std::result::Result<String, String>, once: bool) -> Self {
        self.canned.lock().unwrap().push(CannedOutput {
            prefix: prefix.to_string(),
            output,
            once,
        });
        self
    }

    pub fn respond(self, prefix: &str, stdout: &str) -> Self {
        self.can(prefix, Ok(stdout.to_string()), false)
    }

    pub fn fail(self, prefix: &str, stderr: &str) -> Self {
        self.can(prefix, Err(stderr.to_string()), false)
    }

    /// Fail the first matching command only
    pub fn fail_once(self, prefix: &str, stderr: &str) -> Self {
        self.can(prefix, Err(stderr.to_string()), true)
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .map(|(line, _)| line.clone())
            .collect()
    }

    /// Standard input passed to the first command starting with `prefix`
    pub fn stdin_for(&self, prefix: &str) -> Option<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .find(|(line, _)| line.starts_with(prefix))
            .and_then(|(_, stdin)| stdin.clone())
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, program: &str, args: &[String], stdin: Option<&[u8]>) -> Result<String> {
        let line = std::iter::once(program.to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        self.commands.lock().unwrap().push((
            line.clone(),
            stdin.map(|s| String::from_utf8_lossy(s).into_owned()),
        ));

        let mut canned = self.canned.lock().unwrap();
        let Some(index) = canned.iter().position(|c| line.starts_with(&c.prefix)) else {
            return Ok(String::new());
        };
        let output = if canned[index].once {
            canned.remove(index).output
        } else {
            canned[index].output.clone()
        };
        output.map_err(|message| DevclusterError::Command {
            program: program.to_string(),
            message,
        })
    }
}

/// Container engine that is up once started, with a settable CPU count
pub struct FakeEngine {
    started: AtomicBool,
    ncpu: AtomicU32,
    operating_system: Mutex<String>,
}

impl FakeEngine {
    pub fn new(ncpu: u32) -> Self {
        Self {
            started: AtomicBool::new(false),
            ncpu: AtomicU32::new(ncpu),
            operating_system: Mutex::new("Docker Desktop".to_string()),
        }
    }

    pub fn set_operating_system(&self, os: &str) {
        *self.operating_system.lock().unwrap() = os.to_string();
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn set_started(&self, started: bool) {
        self.started.store(started, Ordering::SeqCst);
    }

    pub fn ncpu(&self) -> u32 {
        self.ncpu.load(Ordering::SeqCst)
    }

    pub fn set_ncpu(&self, ncpu: u32) {
        self.ncpu.store(ncpu, Ordering::SeqCst);
    }

    fn check_started(&self) -> Result<()> {
        if self.is_started() {
            Ok(())
        } else {
            Err(DevclusterError::Engine("connection refused".to_string()))
        }
    }
}

#[async_trait]
impl EngineClient for FakeEngine {
    async fn server_version(&self) -> Result<EngineVersion> {
        self.check_started()?;
        Ok(EngineVersion {
            version: "26.1.1".to_string(),
            api_version: "1.45".to_string(),
            os: "linux".to_string(),
        })
    }

    async fn info(&self) -> Result<EngineInfo> {
        self.check_started()?;
        Ok(EngineInfo {
            ncpu: self.ncpu(),
            operating_system: self.operating_system.lock().unwrap().clone(),
        })
    }
}

/// Docker Desktop whose settings drive a [`FakeEngine`]
pub struct FakeDesktop {
    engine: Arc<FakeEngine>,
    settings: Mutex<DesktopSettings>,
    started: AtomicBool,
    start_launches_engine: AtomicBool,
    unreachable: AtomicBool,
    resets: AtomicUsize,
    contexts: Mutex<Option<Arc<FakeContextStore>>>,
}

impl FakeDesktop {
    pub fn new(engine: Arc<FakeEngine>) -> Self {
        let settings = DesktopSettings::new()
            .with_cpus(engine.ncpu())
            .with_cpu_max(8)
            .with_k8s_enabled(false);
        Self {
            engine,
            settings: Mutex::new(settings),
            started: AtomicBool::new(false),
            start_launches_engine: AtomicBool::new(true),
            unreachable: AtomicBool::new(false),
            resets: AtomicUsize::new(0),
            contexts: Mutex::new(None),
        }
    }

    /// Fail every settings call as if the settings socket were missing
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Write the docker-desktop context into `contexts` whenever Kubernetes
    /// gets switched on
    pub fn record_contexts_in(&self, contexts: Arc<FakeContextStore>) {
        *self.contexts.lock().unwrap() = Some(contexts);
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(DevclusterError::Engine(
                "connecting to backend.native.sock: No such file".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn set_start_launches_engine(&self, launches: bool) {
        self.start_launches_engine.store(launches, Ordering::SeqCst);
    }

    pub fn current_settings(&self) -> DesktopSettings {
        self.settings.lock().unwrap().clone()
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DesktopClient for FakeDesktop {
    /// Reports the CPU count the engine actually runs with
    async fn settings(&self) -> Result<DesktopSettings> {
        self.check_reachable()?;
        let settings = self.settings.lock().unwrap().clone();
        Ok(settings.with_cpus(self.engine.ncpu()))
    }

    async fn write_settings(&self, settings: &DesktopSettings) -> Result<()> {
        self.check_reachable()?;
        if let Some(cpus) = settings.cpus() {
            self.engine.set_ncpu(cpus);
        }
        *self.settings.lock().unwrap() = settings.clone();

        let contexts = self.contexts.lock().unwrap().clone();
        if let Some(contexts) = contexts {
            let recorded = contexts.load()?.contexts.iter().any(|c| c.name == "docker-desktop");
            if settings.k8s_enabled() && !recorded {
                contexts.add_context("docker-desktop", "docker-desktop");
            }
        }
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        self.started.store(true, Ordering::SeqCst);
        if self.start_launches_engine.load(Ordering::SeqCst) {
            self.engine.set_started(true);
        }
        Ok(())
    }

    async fn reset_kubernetes(&self) -> Result<()> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory kubeconfig
pub struct FakeContextStore {
    kubeconfig: Mutex<Kubeconfig>,
}

impl FakeContextStore {
    pub fn new(kubeconfig: Kubeconfig) -> Self {
        Self {
            kubeconfig: Mutex::new(kubeconfig),
        }
    }

    pub fn set(&self, kubeconfig: Kubeconfig) {
        *self.kubeconfig.lock().unwrap() = kubeconfig;
    }

    /// Record a context the way a cluster tool would
    pub fn add_context(&self, context: &str, cluster: &str) {
        let mut kubeconfig = self.kubeconfig.lock().unwrap();
        let added = kubeconfig_with(Some(context), &[(context, cluster)]);
        kubeconfig.contexts.extend(added.contexts);
        kubeconfig.clusters.extend(added.clusters);
        kubeconfig.auth_infos.extend(added.auth_infos);
        kubeconfig.current_context = added.current_context;
    }

    pub fn has_context(&self, context: &str) -> bool {
        self.kubeconfig
            .lock()
            .unwrap()
            .contexts
            .iter()
            .any(|c| c.name == context)
    }
}

impl ContextStore for FakeContextStore {
    fn load(&self) -> Result<Kubeconfig> {
        Ok(self.kubeconfig.lock().unwrap().clone())
    }

    fn remove_context(&self, name: &str) -> Result<bool> {
        Ok(remove_entries(&mut self.kubeconfig.lock().unwrap(), name))
    }
}

/// Hands out clients backed by [`MockService`]s and records what was loaded
pub struct MockLoader {
    default: MockService,
    clients: Mutex<HashMap<String, MockService>>,
    loads: Mutex<Vec<String>>,
}

impl MockLoader {
    pub fn new(default: MockService) -> Self {
        Self {
            default,
            clients: Mutex::new(HashMap::new()),
            loads: Mutex::new(Vec::new()),
        }
    }

    /// Serve `context` from its own mock API
    pub fn set_client(&self, context: &str, service: MockService) {
        self.clients
            .lock()
            .unwrap()
            .insert(context.to_string(), service);
    }

    pub fn loads(&self) -> Vec<String> {
        self.loads.lock().unwrap().clone()
    }
}

impl Default for MockLoader {
    fn default() -> Self {
        Self::new(MockService::new())
    }
}

#[async_trait]
impl ClientLoader for MockLoader {
    async fn load(&self, _kubeconfig: &Kubeconfig, context: &str) -> Result<Client> {
        self.loads.lock().unwrap().push(context.to_string());
        let service = self
            .clients
            .lock()
            .unwrap()
            .get(context)
            .cloned()
            .unwrap_or_else(|| self.default.clone());
        Ok(service.into_client())
    }
}

/// Backend that records creates and deletes and keeps the kubeconfig in step
pub struct FakeAdmin {
    events: EventLog,
    contexts: Arc<FakeContextStore>,
    installed: AtomicBool,
    fail_next_create: AtomicBool,
    install_checks: AtomicUsize,
    creates: AtomicUsize,
}

impl FakeAdmin {
    pub fn new(events: EventLog, contexts: Arc<FakeContextStore>) -> Self {
        Self {
            events,
            contexts,
            installed: AtomicBool::new(true),
            fail_next_create: AtomicBool::new(false),
            install_checks: AtomicUsize::new(0),
            creates: AtomicUsize::new(0),
        }
    }

    pub fn set_installed(&self, installed: bool) {
        self.installed.store(installed, Ordering::SeqCst);
    }

    pub fn fail_next_create(&self) {
        self.fail_next_create.store(true, Ordering::SeqCst);
    }

    pub fn install_checks(&self) -> usize {
        self.install_checks.load(Ordering::SeqCst)
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Admin for FakeAdmin {
    async fn ensure_installed(&self) -> Result<()> {
        self.install_checks.fetch_add(1, Ordering::SeqCst);
        if self.installed.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DevclusterError::NotInstalled {
                tool: "fake".to_string(),
                help: "https://example.invalid/fake".to_string(),
            })
        }
    }

    async fn create(&self, desired: &Cluster, _registry: Option<&Registry>) -> Result<()> {
        if self.fail_next_create.swap(false, Ordering::SeqCst) {
            return Err(DevclusterError::Command {
                program: "fake".to_string(),
                message: "create failed".to_string(),
            });
        }
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.events.push(format!("create {}", desired.name));
        self.contexts.add_context(&desired.name, &desired.name);
        Ok(())
    }

    async fn delete(&self, cluster: &Cluster) -> Result<()> {
        self.events.push(format!("delete {}", cluster.name));
        self.contexts.remove_context(&cluster.name)?;
        Ok(())
    }

    fn local_registry_hosting(&self, registry: &Registry) -> LocalRegistryHostingV1 {
        LocalRegistryHostingV1 {
            host: format!("localhost:{}", registry.status.host_port),
            host_from_cluster_network: Some(format!(
                "{}:{}",
                registry.name, registry.status.container_port
            )),
            ..Default::default()
        }
    }
}

/// Registries kept in memory; `apply` creates them on port 5000
pub struct FakeRegistryCoordinator {
    events: EventLog,
    registries: Mutex<BTreeMap<String, Registry>>,
}

impl FakeRegistryCoordinator {
    pub fn new(events: EventLog) -> Self {
        Self {
            events,
            registries: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn insert(&self, registry: Registry) {
        self.registries
            .lock()
            .unwrap()
            .insert(registry.name.clone(), registry);
    }
}

#[async_trait]
impl RegistryCoordinator for FakeRegistryCoordinator {
    async fn apply(&self, desired: &Registry) -> Result<Registry> {
        self.events.push(format!("registry apply {}", desired.name));
        let mut registries = self.registries.lock().unwrap();
        let registry = registries
            .entry(desired.name.clone())
            .or_insert_with(|| registry_on(&desired.name, 5000, &["bridge"]));
        Ok(registry.clone())
    }

    async fn list(&self, options: &ListOptions) -> Result<RegistryList> {
        let selector = FieldSelector::from_options(options, &["name"])?;
        let items = self
            .registries
            .lock()
            .unwrap()
            .values()
            .filter(|r| selector.matches(|k| (k == "name").then_some(r.name.as_str())))
            .cloned()
            .collect();
        Ok(RegistryList::new(items))
    }

    async fn get(&self, name: &str) -> Result<Registry> {
        self.registries
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| DevclusterError::registry_not_found(name))
    }
}
