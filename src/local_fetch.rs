//! Local-fetch shim: call the server under test by path.
//!
//! Suites that boot an HTTP server register a [`LocalFetch`] component
//! built from the same configuration the server reads, so test bodies hit
//! `/some-route` without knowing host or port. Only local paths are
//! accepted; an absolute URL in a test is almost always a mistake, and it
//! is rejected before any network activity.
//!
//! Ports come from an explicit [`PortAllocator`] with process-scoped
//! state: a monotonic counter starting from a base derived from the
//! process id, so concurrently running test processes hand out disjoint
//! ranges.

use std::sync::atomic::{AtomicU16, Ordering};

use crate::config::{ConfigComponent, InMemoryConfig};

/// Config key for the server bind host.
pub const HTTP_SERVER_HOST: &str = "HTTP_SERVER_HOST";
/// Config key for the server bind port.
pub const HTTP_SERVER_PORT: &str = "HTTP_SERVER_PORT";

const PORT_BASE: u16 = 19000;
const PORTS_PER_PROCESS: u16 = 1000;
const PROCESS_SLOTS: u32 = 40;

/// Hands out listener ports, monotonically from a fixed base.
#[derive(Debug)]
pub struct PortAllocator {
    next: AtomicU16,
}

impl PortAllocator {
    /// An allocator starting at `base`.
    pub fn new(base: u16) -> Self {
        Self {
            next: AtomicU16::new(base),
        }
    }

    /// An allocator whose base is derived from the process id, so
    /// concurrent test processes allocate from disjoint ranges.
    pub fn process_scoped() -> Self {
        let slot = (std::process::id() % PROCESS_SLOTS) as u16;
        Self::new(PORT_BASE + slot * PORTS_PER_PROCESS)
    }

    /// The next unused port.
    pub fn next_port(&self) -> u16 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}

/// Server config for one suite: loopback host plus a fresh port from the
/// allocator.
pub fn default_server_config(ports: &PortAllocator) -> InMemoryConfig {
    InMemoryConfig::new()
        .with(HTTP_SERVER_HOST, "127.0.0.1")
        .with(HTTP_SERVER_PORT, ports.next_port().to_string())
}

/// HTTP client bound to the locally running server under test.
#[derive(Debug, Clone)]
pub struct LocalFetch {
    base_url: String,
    client: reqwest::Client,
}

impl LocalFetch {
    /// Requests `path` against the local server.
    ///
    /// Fails without touching the network for anything that is not a
    /// local path (no leading `/`).
    pub async fn fetch(&self, path: &str) -> anyhow::Result<reqwest::Response> {
        if !path.starts_with('/') {
            anyhow::bail!("local fetch only accepts local testing paths, got `{path}`");
        }
        let response = self.client.get(format!("{}{path}", self.base_url)).send().await?;
        Ok(response)
    }

    /// The `http://host:port` prefix requests are resolved against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Builds a [`LocalFetch`] from the host/port the configuration names.
pub async fn create_local_fetch(config: &dyn ConfigComponent) -> anyhow::Result<LocalFetch> {
    let host = config.require_string(HTTP_SERVER_HOST).await?;
    let port = config.require_number(HTTP_SERVER_PORT).await?;
    Ok(LocalFetch {
        base_url: format!("http://{host}:{port}"),
        client: reqwest::Client::new(),
    })
}
