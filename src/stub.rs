//! Stub decorators: active mock wrappers that can override behavior.
//!
//! A stub decorator implements the same capability trait as the component
//! it wraps and holds a reference to the original. Each intercepted method
//! is backed by a [`StubMethod`] cell that records calls and, unless
//! configured otherwise, delegates to the original implementation.
//!
//! The [`StubCache`] creates one decorator per key for the lifetime of the
//! suite. Between tests only the recorded behavior is reset
//! ([`StubCache::reset_all`]); the decorator instances survive, so
//! references held by earlier tests stay valid and observe the reset state.
//!
//! A decorator looks like this:
//!
//! ```ignore
//! struct CounterStub {
//!     inner: Arc<dyn Counter>,
//!     increment: StubMethod<(), u64>,
//! }
//!
//! impl Counter for CounterStub {
//!     fn increment(&self) -> u64 {
//!         self.increment.invoke((), || self.inner.increment())
//!     }
//! }
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::errors::{HarnessError, HarnessResult};

// ============================================================================
// Per-method cell
// ============================================================================

struct MethodState<A, R> {
    calls: Vec<A>,
    matchers: Vec<(A, R)>,
    default: Option<R>,
    engaged: bool,
}

impl<A, R> Default for MethodState<A, R> {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            matchers: Vec::new(),
            default: None,
            engaged: true,
        }
    }
}

enum Decision<R> {
    Configured(R),
    Original,
}

/// One interceptable method: records calls, optionally overrides results.
///
/// Behavior is passthrough until configured. [`restore`](Self::restore)
/// disengages the cell entirely (calls flow to the original, unrecorded)
/// and the cell stays disengaged across per-test resets until a new
/// behavior is configured.
pub struct StubMethod<A, R> {
    state: Mutex<MethodState<A, R>>,
}

impl<A, R> Default for StubMethod<A, R> {
    fn default() -> Self {
        Self {
            state: Mutex::new(MethodState::default()),
        }
    }
}

impl<A, R> StubMethod<A, R>
where
    A: Clone + PartialEq + Send,
    R: Clone + Send,
{
    /// Creates an unconfigured (passthrough) cell.
    pub fn new() -> Self {
        Self::default()
    }

    fn decide(&self, args: &A) -> Decision<R> {
        let mut state = self.state.lock();
        if !state.engaged {
            return Decision::Original;
        }
        state.calls.push(args.clone());
        if let Some((_, result)) = state.matchers.iter().find(|(wanted, _)| wanted == args) {
            return Decision::Configured(result.clone());
        }
        match &state.default {
            Some(result) => Decision::Configured(result.clone()),
            None => Decision::Original,
        }
    }

    /// Routes one call: records it, then returns the configured result or
    /// delegates to `original`.
    pub fn invoke(&self, args: A, original: impl FnOnce() -> R) -> R {
        match self.decide(&args) {
            Decision::Configured(result) => result,
            Decision::Original => original(),
        }
    }

    /// Async flavor of [`invoke`](Self::invoke); the original future is
    /// only constructed (and awaited) when no override applies.
    pub async fn invoke_async<F>(&self, args: A, original: impl FnOnce() -> F) -> R
    where
        F: Future<Output = R>,
    {
        match self.decide(&args) {
            Decision::Configured(result) => result,
            Decision::Original => original().await,
        }
    }

    /// Overrides every call to return `result`. Re-engages a restored cell.
    pub fn returns(&self, result: R) {
        let mut state = self.state.lock();
        state.default = Some(result);
        state.engaged = true;
    }

    /// Overrides calls whose arguments equal `args`. Matchers are checked
    /// in configuration order, before the unconditional override.
    /// Re-engages a restored cell.
    pub fn returns_for(&self, args: A, result: R) {
        let mut state = self.state.lock();
        state.matchers.push((args, result));
        state.engaged = true;
    }

    /// Recovers the original behavior: overrides are dropped and calls are
    /// no longer recorded. Survives per-test resets until a new behavior
    /// is configured.
    pub fn restore(&self) {
        let mut state = self.state.lock();
        state.matchers.clear();
        state.default = None;
        state.engaged = false;
    }

    /// Clears recorded calls and configured overrides, keeping the cell's
    /// engaged/restored flag. Invoked for every cell at per-test setup.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.calls.clear();
        state.matchers.clear();
        state.default = None;
    }

    /// Number of recorded calls.
    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// Whether exactly one call was recorded.
    pub fn called_once(&self) -> bool {
        self.call_count() == 1
    }

    /// Whether any recorded call had these arguments.
    pub fn called_with(&self, args: &A) -> bool {
        self.state.lock().calls.iter().any(|call| call == args)
    }

    /// Recorded arguments, in call order.
    pub fn calls(&self) -> Vec<A> {
        self.state.lock().calls.clone()
    }
}

// ============================================================================
// Decorator traits
// ============================================================================

/// The facet of a stub decorator the cache uses for per-test resets.
pub trait StubEntry: Send + Sync + 'static {
    /// Resets every [`StubMethod`] cell of this decorator.
    fn reset_behavior(&self);
}

/// A stub decorator for one component type.
///
/// `Target` is the value registered in the component set (typically
/// `Arc<dyn Trait>`); `as_target` re-erases the decorator into that same
/// capability type, which is what the live view serves once a stub exists.
pub trait StubDecorator: StubEntry + Sized {
    /// The registered component value this decorator wraps and stands in
    /// for.
    type Target: Clone + Send + Sync + 'static;

    /// Wraps the live component.
    fn wrap(target: Self::Target) -> Self;

    /// The decorator viewed as the component's capability type.
    fn as_target(this: &Arc<Self>) -> Self::Target;
}

// ============================================================================
// Suite-scoped cache
// ============================================================================

struct StubSlot {
    // One decorator instance under three facets: reset, typed retrieval,
    // and the component view served to live resolution.
    entry: Arc<dyn StubEntry>,
    instance: Arc<dyn Any + Send + Sync>,
    component_view: Box<dyn Fn() -> Box<dyn Any + Send + Sync> + Send + Sync>,
}

/// Lazily built map of stub decorators, one per key, suite-scoped.
#[derive(Default)]
pub(crate) struct StubCache {
    slots: Mutex<HashMap<String, StubSlot>>,
}

impl StubCache {
    /// Returns the cached decorator for `key`, wrapping the live component
    /// on first access. Resolution errors from `target` propagate
    /// unchanged.
    pub(crate) fn get_or_insert<S>(
        &self,
        key: &str,
        target: impl FnOnce() -> HarnessResult<S::Target>,
    ) -> HarnessResult<Arc<S>>
    where
        S: StubDecorator,
    {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(key) {
            return Arc::clone(&slot.instance)
                .downcast::<S>()
                .map_err(|_| HarnessError::ComponentType {
                    key: key.to_string(),
                    expected: std::any::type_name::<S>(),
                });
        }

        let stub = Arc::new(S::wrap(target()?));
        let view_source = Arc::clone(&stub);
        slots.insert(
            key.to_string(),
            StubSlot {
                entry: Arc::clone(&stub) as Arc<dyn StubEntry>,
                instance: Arc::clone(&stub) as Arc<dyn Any + Send + Sync>,
                component_view: Box::new(move || Box::new(S::as_target(&view_source))),
            },
        );
        Ok(stub)
    }

    /// The decorator for `key` viewed as its component type, if one exists.
    /// Live resolution consults this before the raw component set.
    pub(crate) fn component_view(&self, key: &str) -> Option<Box<dyn Any + Send + Sync>> {
        self.slots.lock().get(key).map(|slot| (slot.component_view)())
    }

    /// Per-test reset: clears behavior and counters on every cached
    /// decorator without discarding the instances.
    pub(crate) fn reset_all(&self) {
        for slot in self.slots.lock().values() {
            slot.entry.reset_behavior();
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().len()
    }
}
