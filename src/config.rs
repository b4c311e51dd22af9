//! Configuration component.
//!
//! Test programs that need configuration register a [`ConfigComponent`];
//! the local-fetch shim consumes one to find the server under test. The
//! `require_*` accessors fail when a key is missing, which is the right
//! default in tests: a missing key is a fixture bug, not a condition to
//! paper over.

use std::collections::HashMap;

use async_trait::async_trait;

/// Key/value configuration with string and numeric accessors.
#[async_trait]
pub trait ConfigComponent: Send + Sync {
    /// The raw value under `key`, if present.
    async fn get_string(&self, key: &str) -> Option<String>;

    /// The value under `key`; fails when absent.
    async fn require_string(&self, key: &str) -> anyhow::Result<String> {
        self.get_string(key)
            .await
            .ok_or_else(|| anyhow::anyhow!("config key `{key}` is not set"))
    }

    /// The value under `key` parsed as an integer; fails when absent or
    /// non-numeric.
    async fn require_number(&self, key: &str) -> anyhow::Result<i64> {
        let raw = self.require_string(key).await?;
        raw.parse()
            .map_err(|_| anyhow::anyhow!("config key `{key}` is not a number: `{raw}`"))
    }
}

/// In-memory configuration, built fixture-style.
#[derive(Debug, Default, Clone)]
pub struct InMemoryConfig {
    values: HashMap<String, String>,
}

impl InMemoryConfig {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one key/value pair.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Sets one key/value pair in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }
}

#[async_trait]
impl ConfigComponent for InMemoryConfig {
    async fn get_string(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}
