//! Spy decorators: passive wrappers that record and always forward.
//!
//! A spy never overrides results; every call reaches the original
//! implementation, which is why rebuilding spies from scratch is
//! behavior-neutral. The [`SpyCache`] exploits that: instead of resetting
//! entries between tests it is discarded wholesale at every per-test
//! setup, so call history cannot leak and spy identity only holds within
//! one test.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::errors::{HarnessError, HarnessResult};

/// One observed method: records arguments, forwards unconditionally.
pub struct SpyMethod<A> {
    calls: Mutex<Vec<A>>,
}

impl<A> Default for SpyMethod<A> {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl<A> SpyMethod<A>
where
    A: Clone + Send,
{
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one call and forwards to the original implementation.
    pub fn invoke<R>(&self, args: A, original: impl FnOnce() -> R) -> R {
        self.calls.lock().push(args);
        original()
    }

    /// Async flavor of [`invoke`](Self::invoke).
    pub async fn invoke_async<R, F>(&self, args: A, original: impl FnOnce() -> F) -> R
    where
        F: Future<Output = R>,
    {
        self.calls.lock().push(args);
        original().await
    }

    /// Number of recorded calls.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Whether exactly one call was recorded.
    pub fn called_once(&self) -> bool {
        self.call_count() == 1
    }

    /// Whether any recorded call had these arguments.
    pub fn called_with(&self, args: &A) -> bool
    where
        A: PartialEq,
    {
        self.calls.lock().iter().any(|call| call == args)
    }

    /// Recorded arguments, in call order.
    pub fn calls(&self) -> Vec<A> {
        self.calls.lock().clone()
    }
}

/// A spy decorator for one component type.
///
/// `Target` is the value served by the live view (the stub decorator, if
/// one exists for the key), so a spy observes exactly what a test body
/// calling the live component would trigger.
pub trait SpyDecorator: Send + Sync + Sized + 'static {
    /// The component value this decorator wraps.
    type Target: Clone + Send + Sync + 'static;

    /// Wraps the resolved component.
    fn wrap(target: Self::Target) -> Self;
}

/// Lazily built map of spy decorators; discarded wholesale between tests.
#[derive(Default)]
pub(crate) struct SpyCache {
    slots: Mutex<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl SpyCache {
    /// Returns the spy for `key`, wrapping the resolved component on first
    /// access within the current test. Resolution errors propagate
    /// unchanged.
    pub(crate) fn get_or_insert<S>(
        &self,
        key: &str,
        target: impl FnOnce() -> HarnessResult<S::Target>,
    ) -> HarnessResult<Arc<S>>
    where
        S: SpyDecorator,
    {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(key) {
            return Arc::clone(slot)
                .downcast::<S>()
                .map_err(|_| HarnessError::ComponentType {
                    key: key.to_string(),
                    expected: std::any::type_name::<S>(),
                });
        }

        let spy = Arc::new(S::wrap(target()?));
        slots.insert(key.to_string(), Arc::clone(&spy) as Arc<dyn Any + Send + Sync>);
        Ok(spy)
    }

    /// Per-test setup: discards every cached spy. The next access within
    /// the new test re-wraps from scratch.
    pub(crate) fn clear(&self) {
        self.slots.lock().clear();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().len()
    }
}
