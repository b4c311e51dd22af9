//! Shared fixtures for the integration suites: component traits, their
//! stub/spy decorators, and program definitions.

// Each integration binary pulls in the subset it needs.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use axum::{Json, Router, routing::get};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use stagehand::{
    ComponentLifecycle, ComponentSet, ConfigComponent, InMemoryConfig, LocalFetch, PortAllocator,
    ProgramDefinition, SpyDecorator, SpyMethod, StubDecorator, StubEntry, StubMethod,
    create_local_fetch,
};

/// One allocator per test process, so suites never collide on a port.
pub fn test_ports() -> &'static PortAllocator {
    static PORTS: OnceLock<PortAllocator> = OnceLock::new();
    PORTS.get_or_init(PortAllocator::process_scoped)
}

/// Installs a subscriber once per test binary; later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Counter component
// ============================================================================

pub trait Counter: Send + Sync {
    fn increment(&self) -> u64;
    fn value(&self) -> u64;
}

/// A counter whose state lives in the program, not in any wrapper: the
/// suites use it to prove that program state persists across tests while
/// mock bookkeeping resets.
#[derive(Default)]
pub struct SharedCounter {
    count: AtomicU64,
}

impl Counter for SharedCounter {
    fn increment(&self) -> u64 {
        self.count.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn value(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }
}

pub struct CounterStub {
    inner: Arc<dyn Counter>,
    pub increment: StubMethod<(), u64>,
    pub value: StubMethod<(), u64>,
}

impl CounterStub {
    /// The unmocked component, for assertions that must bypass
    /// interception.
    pub fn original(&self) -> &Arc<dyn Counter> {
        &self.inner
    }
}

impl Counter for CounterStub {
    fn increment(&self) -> u64 {
        self.increment.invoke((), || self.inner.increment())
    }

    fn value(&self) -> u64 {
        self.value.invoke((), || self.inner.value())
    }
}

impl StubEntry for CounterStub {
    fn reset_behavior(&self) {
        self.increment.reset();
        self.value.reset();
    }
}

impl StubDecorator for CounterStub {
    type Target = Arc<dyn Counter>;

    fn wrap(target: Self::Target) -> Self {
        Self {
            inner: target,
            increment: StubMethod::new(),
            value: StubMethod::new(),
        }
    }

    fn as_target(this: &Arc<Self>) -> Self::Target {
        Arc::clone(this) as Arc<dyn Counter>
    }
}

pub struct CounterSpy {
    inner: Arc<dyn Counter>,
    pub increment: SpyMethod<()>,
    pub value: SpyMethod<()>,
}

impl Counter for CounterSpy {
    fn increment(&self) -> u64 {
        self.increment.invoke((), || self.inner.increment())
    }

    fn value(&self) -> u64 {
        self.value.invoke((), || self.inner.value())
    }
}

impl SpyDecorator for CounterSpy {
    type Target = Arc<dyn Counter>;

    fn wrap(target: Self::Target) -> Self {
        Self {
            inner: target,
            increment: SpyMethod::new(),
            value: SpyMethod::new(),
        }
    }
}

/// A program with a single `counter` component.
pub struct CounterProgram;

#[async_trait]
impl ProgramDefinition for CounterProgram {
    async fn init_components(&self) -> anyhow::Result<ComponentSet> {
        let mut set = ComponentSet::new();
        set.register::<Arc<dyn Counter>>("counter", Arc::new(SharedCounter::default()));
        Ok(set)
    }
}

// ============================================================================
// Adder + faulty components (the smoke-suite pair)
// ============================================================================

pub trait Adder: Send + Sync {
    /// Adds, counting every call in the component's own state.
    fn sum(&self, a: i64, b: i64) -> i64;
    fn calls(&self) -> u64;
}

#[derive(Default)]
pub struct CountingAdder {
    calls: AtomicU64,
}

impl Adder for CountingAdder {
    fn sum(&self, a: i64, b: i64) -> i64 {
        self.calls.fetch_add(1, Ordering::SeqCst);
        a + b
    }

    fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

pub struct AdderStub {
    inner: Arc<dyn Adder>,
    pub sum: StubMethod<(i64, i64), i64>,
    pub calls: StubMethod<(), u64>,
}

impl AdderStub {
    pub fn original(&self) -> &Arc<dyn Adder> {
        &self.inner
    }
}

impl Adder for AdderStub {
    fn sum(&self, a: i64, b: i64) -> i64 {
        self.sum.invoke((a, b), || self.inner.sum(a, b))
    }

    fn calls(&self) -> u64 {
        self.calls.invoke((), || self.inner.calls())
    }
}

impl StubEntry for AdderStub {
    fn reset_behavior(&self) {
        self.sum.reset();
        self.calls.reset();
    }
}

impl StubDecorator for AdderStub {
    type Target = Arc<dyn Adder>;

    fn wrap(target: Self::Target) -> Self {
        Self {
            inner: target,
            sum: StubMethod::new(),
            calls: StubMethod::new(),
        }
    }

    fn as_target(this: &Arc<Self>) -> Self::Target {
        Arc::clone(this) as Arc<dyn Adder>
    }
}

/// Error type for the always-failing component; `Clone` so a stub can be
/// configured to return it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PokeError(pub String);

impl std::fmt::Display for PokeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for PokeError {}

pub trait Faulty: Send + Sync {
    fn poke(&self) -> Result<(), PokeError>;
}

pub struct AlwaysFails;

impl Faulty for AlwaysFails {
    fn poke(&self) -> Result<(), PokeError> {
        Err(PokeError("ABC".into()))
    }
}

pub struct FaultyStub {
    inner: Arc<dyn Faulty>,
    pub poke: StubMethod<(), Result<(), PokeError>>,
}

impl Faulty for FaultyStub {
    fn poke(&self) -> Result<(), PokeError> {
        self.poke.invoke((), || self.inner.poke())
    }
}

impl StubEntry for FaultyStub {
    fn reset_behavior(&self) {
        self.poke.reset();
    }
}

impl StubDecorator for FaultyStub {
    type Target = Arc<dyn Faulty>;

    fn wrap(target: Self::Target) -> Self {
        Self {
            inner: target,
            poke: StubMethod::new(),
        }
    }

    fn as_target(this: &Arc<Self>) -> Self::Target {
        Arc::clone(this) as Arc<dyn Faulty>
    }
}

/// The smoke program: a faulty component and a counting adder.
pub struct SmokeProgram;

#[async_trait]
impl ProgramDefinition for SmokeProgram {
    async fn init_components(&self) -> anyhow::Result<ComponentSet> {
        let mut set = ComponentSet::new();
        set.register::<Arc<dyn Faulty>>("faulty", Arc::new(AlwaysFails));
        set.register::<Arc<dyn Adder>>("adder", Arc::new(CountingAdder::default()));
        Ok(set)
    }
}

// ============================================================================
// Lifecycle-tracking component
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerState {
    pub started: bool,
    pub stopped: bool,
    pub calls: u64,
}

pub trait Tracker: Send + Sync {
    fn sum(&self, a: i64, b: i64) -> i64;
    fn read(&self) -> TrackerState;
}

#[derive(Default)]
pub struct LifecycleTracker {
    started: Mutex<bool>,
    stopped: Mutex<bool>,
    calls: AtomicU64,
}

impl Tracker for LifecycleTracker {
    fn sum(&self, a: i64, b: i64) -> i64 {
        self.calls.fetch_add(1, Ordering::SeqCst);
        a + b
    }

    fn read(&self) -> TrackerState {
        TrackerState {
            started: *self.started.lock(),
            stopped: *self.stopped.lock(),
            calls: self.calls.load(Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl ComponentLifecycle for LifecycleTracker {
    async fn start(&self) -> anyhow::Result<()> {
        *self.started.lock() = true;
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        *self.stopped.lock() = true;
        Ok(())
    }
}

pub struct TrackerStub {
    inner: Arc<dyn Tracker>,
    pub sum: StubMethod<(i64, i64), i64>,
    pub read: StubMethod<(), TrackerState>,
}

impl TrackerStub {
    pub fn original(&self) -> &Arc<dyn Tracker> {
        &self.inner
    }
}

impl Tracker for TrackerStub {
    fn sum(&self, a: i64, b: i64) -> i64 {
        self.sum.invoke((a, b), || self.inner.sum(a, b))
    }

    fn read(&self) -> TrackerState {
        self.read.invoke((), || self.inner.read())
    }
}

impl StubEntry for TrackerStub {
    fn reset_behavior(&self) {
        self.sum.reset();
        self.read.reset();
    }
}

impl StubDecorator for TrackerStub {
    type Target = Arc<dyn Tracker>;

    fn wrap(target: Self::Target) -> Self {
        Self {
            inner: target,
            sum: StubMethod::new(),
            read: StubMethod::new(),
        }
    }

    fn as_target(this: &Arc<Self>) -> Self::Target {
        Arc::clone(this) as Arc<dyn Tracker>
    }
}

/// A program whose single component participates in the lifecycle.
pub struct TrackerProgram;

#[async_trait]
impl ProgramDefinition for TrackerProgram {
    async fn init_components(&self) -> anyhow::Result<ComponentSet> {
        let tracker = Arc::new(LifecycleTracker::default());
        let mut set = ComponentSet::new();
        set.register::<Arc<dyn Tracker>>("tracker", Arc::clone(&tracker) as Arc<dyn Tracker>);
        set.register_lifecycle("tracker", tracker);
        Ok(set)
    }
}

// ============================================================================
// Echo HTTP server (local-fetch suite)
// ============================================================================

pub const ECHO_ROUTE: &str = "/some-route";

struct RunningServer {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<std::io::Result<()>>,
}

/// Minimal axum server component: one JSON route, started and stopped by
/// the program lifecycle.
pub struct EchoServer {
    config: InMemoryConfig,
    running: Mutex<Option<RunningServer>>,
}

impl EchoServer {
    pub fn new(config: InMemoryConfig) -> Self {
        Self {
            config,
            running: Mutex::new(None),
        }
    }
}

#[async_trait]
impl ComponentLifecycle for EchoServer {
    async fn start(&self) -> anyhow::Result<()> {
        let host = self.config.require_string(stagehand::HTTP_SERVER_HOST).await?;
        let port = self.config.require_number(stagehand::HTTP_SERVER_PORT).await?;
        let listener = tokio::net::TcpListener::bind(format!("{host}:{port}")).await?;

        let app = Router::new().route(
            ECHO_ROUTE,
            get(|| async { Json(serde_json::json!({ "someProp": true })) }),
        );

        let (shutdown, on_shutdown) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = on_shutdown.await;
                })
                .await
        });

        *self.running.lock() = Some(RunningServer { shutdown, handle });
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        let running = self.running.lock().take();
        if let Some(running) = running {
            let _ = running.shutdown.send(());
            running.handle.await??;
        }
        Ok(())
    }
}

/// A program wiring config, the echo server, and a local-fetch component
/// from the same configuration.
pub struct FetchProgram {
    pub config: InMemoryConfig,
}

impl FetchProgram {
    pub fn on_fresh_port() -> Self {
        Self {
            config: stagehand::default_server_config(test_ports()),
        }
    }
}

#[async_trait]
impl ProgramDefinition for FetchProgram {
    async fn init_components(&self) -> anyhow::Result<ComponentSet> {
        let server = Arc::new(EchoServer::new(self.config.clone()));
        let fetch = create_local_fetch(&self.config).await?;

        let mut set = ComponentSet::new();
        set.register::<Arc<dyn ConfigComponent>>("config", Arc::new(self.config.clone()));
        set.register::<LocalFetch>("fetch", fetch);
        set.register::<Arc<EchoServer>>("server", Arc::clone(&server));
        set.register_lifecycle("server", server);
        Ok(set)
    }
}
