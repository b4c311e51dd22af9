//! The component registry a test program is assembled from.
//!
//! A [`ComponentSet`] maps string keys to type-erased component values.
//! Components are conventionally registered as `Arc<dyn Trait>` so the
//! harness can hand out cheap clones, and so stub/spy decorators can
//! implement the same trait and stand in for the original.
//!
//! Components that need to participate in the program lifecycle register a
//! [`ComponentLifecycle`] alongside their value; the program starts them in
//! registration order and stops them in reverse.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

/// Start/stop hooks for one component.
///
/// Both hooks default to no-ops so purely passive components only register
/// their value.
#[async_trait]
pub trait ComponentLifecycle: Send + Sync {
    /// Called once when the program starts, in registration order.
    async fn start(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called once when the program stops, in reverse registration order.
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

type ComponentSlot = Box<dyn Any + Send + Sync>;

/// The named set of components a program runs with.
///
/// Keys are fixed by the test author's `init_components`; the harness never
/// creates or destroys them at runtime.
#[derive(Default)]
pub struct ComponentSet {
    slots: HashMap<String, ComponentSlot>,
    lifecycles: Vec<(String, Arc<dyn ComponentLifecycle>)>,
}

impl ComponentSet {
    /// Creates an empty component set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a component under `key`.
    ///
    /// `component` is stored type-erased; retrieval downcasts back to the
    /// registered type, so register the exact type you intend to resolve
    /// (typically `Arc<dyn Trait>`). Registering the same key twice
    /// replaces the earlier value.
    pub fn register<T>(&mut self, key: impl Into<String>, component: T)
    where
        T: Clone + Send + Sync + 'static,
    {
        self.slots.insert(key.into(), Box::new(component));
    }

    /// Registers start/stop hooks for the component under `key`.
    ///
    /// The value and its lifecycle are registered separately because the
    /// registry stores values type-erased; pass the same instance coerced
    /// to [`ComponentLifecycle`].
    pub fn register_lifecycle(
        &mut self,
        key: impl Into<String>,
        lifecycle: Arc<dyn ComponentLifecycle>,
    ) {
        self.lifecycles.push((key.into(), lifecycle));
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Registered keys, in arbitrary order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    /// Number of registered components.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Type-erased access to one slot.
    pub(crate) fn get_raw(&self, key: &str) -> Option<&(dyn Any + Send + Sync)> {
        self.slots.get(key).map(|slot| slot.as_ref())
    }

    /// Lifecycles in registration order.
    pub(crate) fn lifecycles(&self) -> &[(String, Arc<dyn ComponentLifecycle>)] {
        &self.lifecycles
    }
}

impl std::fmt::Debug for ComponentSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&str> = self.keys().collect();
        keys.sort_unstable();
        f.debug_struct("ComponentSet")
            .field("keys", &keys)
            .field("lifecycles", &self.lifecycles.len())
            .finish()
    }
}
