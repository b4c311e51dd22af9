//! Component resolution: the single source of truth for lookups.
//!
//! Every view funnels through here, and the program slot is re-read on
//! every access; closures referencing a resolver are created at
//! suite-declaration time, before the program exists, and must start
//! failing again the moment teardown takes the program away.

use std::sync::Arc;

use crate::errors::{HarnessError, HarnessResult};
use crate::lifecycle::ProgramLifecycle;
use crate::stub::StubCache;

/// Resolves components by key against the current program.
///
/// Live resolution is stub-aware: once a stub decorator exists for a key,
/// it is served in place of the original so every alias of the component
/// observes the same (possibly overridden) behavior.
#[derive(Clone)]
pub(crate) struct ComponentResolver {
    lifecycle: Arc<ProgramLifecycle>,
    stubs: Arc<StubCache>,
}

impl ComponentResolver {
    pub(crate) fn new(lifecycle: Arc<ProgramLifecycle>, stubs: Arc<StubCache>) -> Self {
        Self { lifecycle, stubs }
    }

    /// Fails unless the program exists right now. The caches consult this
    /// before serving an entry: a cached decorator outlives teardown,
    /// access rights do not.
    pub(crate) fn ensure_initialized(&self, key: &str) -> HarnessResult<()> {
        if self.lifecycle.program().is_none() {
            return Err(HarnessError::NotInitialized {
                key: key.to_string(),
            });
        }
        Ok(())
    }

    /// Resolves the component under `key`, serving the stub decorator if
    /// one exists.
    pub(crate) fn resolve<T>(&self, key: &str) -> HarnessResult<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        // The program must exist even when a decorator is cached: stubs
        // outlive teardown, access rights do not.
        let program = self.lifecycle.program().ok_or_else(|| HarnessError::NotInitialized {
            key: key.to_string(),
        })?;

        if let Some(view) = self.stubs.component_view(key) {
            return view
                .downcast::<T>()
                .map(|boxed| *boxed)
                .map_err(|_| HarnessError::ComponentType {
                    key: key.to_string(),
                    expected: std::any::type_name::<T>(),
                });
        }

        Self::from_program(&program, key)
    }

    /// Resolves the original component, bypassing any stub decorator.
    /// This is what the caches use when wrapping.
    pub(crate) fn resolve_original<T>(&self, key: &str) -> HarnessResult<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let program = self.lifecycle.program().ok_or_else(|| HarnessError::NotInitialized {
            key: key.to_string(),
        })?;
        Self::from_program(&program, key)
    }

    fn from_program<T>(program: &crate::lifecycle::Program, key: &str) -> HarnessResult<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let raw = program
            .components()
            .get_raw(key)
            .ok_or_else(|| HarnessError::UnknownComponent {
                key: key.to_string(),
            })?;
        raw.downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| HarnessError::ComponentType {
                key: key.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }
}
