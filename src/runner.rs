//! The suite orchestrator: `create_runner` and the objects it hands out.
//!
//! A [`Runner`] binds one program definition to the hook machinery. Each
//! [`Runner::suite`] call declares and runs one suite: the declaration
//! closure runs synchronously, before the program exists, with a
//! [`SuiteContext`] exposing the three component views, `before_start`
//! registration, and test declaration; the orchestrator then compiles the
//! suite into a [`SuiteSchedule`](crate::hooks::SuiteSchedule) wiring:
//!
//! 1. one-time setup: drain pre-start callbacks, run the program;
//! 2. per-test setup: fresh sandbox, stub behavior reset, spy cache
//!    discarded;
//! 3. per-test teardown: sandbox restore;
//! 4. one-time teardown: stop the program.
//!
//! Exactly one program per suite invocation: tests within a suite share
//! the program and the stub identity per key, but never call history.

use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;

use crate::errors::HarnessResult;
use crate::hooks::{self, ContextFactory, HookAdapter, OneTimeHook, PerTestHook, TestCase};
use crate::lifecycle::{ProgramDefinition, ProgramLifecycle};
use crate::report::{SuiteReport, SuiteReporter, TracingReporter};
use crate::resolver::ComponentResolver;
use crate::sandbox::Sandbox;
use crate::spy::{SpyCache, SpyDecorator};
use crate::stub::{StubCache, StubDecorator};

/// Suite-scoped mutable state shared by the views and the hook closures.
#[derive(Default)]
pub(crate) struct SuiteState {
    lifecycle: Arc<ProgramLifecycle>,
    stubs: Arc<StubCache>,
    spies: Arc<SpyCache>,
    sandbox: Mutex<Option<Arc<Sandbox>>>,
}

impl SuiteState {
    fn resolver(&self) -> ComponentResolver {
        ComponentResolver::new(Arc::clone(&self.lifecycle), Arc::clone(&self.stubs))
    }
}

// ============================================================================
// Component views
// ============================================================================

/// Read-only view of the live components.
///
/// Resolution happens on every access, never at view creation: views exist
/// at suite-declaration time, before the program does. Once a stub
/// decorator exists for a key this view serves it, so live and stubbed
/// access observe one behavior.
#[derive(Clone)]
pub struct LiveComponents {
    state: Arc<SuiteState>,
}

impl LiveComponents {
    /// Resolves the component registered under `key` as type `T`.
    pub fn resolve<T>(&self, key: &str) -> HarnessResult<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.state.resolver().resolve(key)
    }
}

/// View handing out stub decorators, one per key per suite.
#[derive(Clone)]
pub struct StubComponents {
    state: Arc<SuiteState>,
}

impl StubComponents {
    /// Resolves the stub decorator for `key`, wrapping the live component
    /// on first access. The same instance is returned for the whole suite;
    /// its recorded behavior resets between tests.
    pub fn resolve<S>(&self, key: &str) -> HarnessResult<Arc<S>>
    where
        S: StubDecorator,
    {
        let resolver = self.state.resolver();
        resolver.ensure_initialized(key)?;
        self.state
            .stubs
            .get_or_insert::<S>(key, || resolver.resolve_original(key))
    }
}

/// View handing out spy decorators, rebuilt from scratch for every test.
#[derive(Clone)]
pub struct SpyComponents {
    state: Arc<SuiteState>,
}

impl SpyComponents {
    /// Resolves the spy decorator for `key`, wrapping on first access
    /// within the current test. Spies observe whatever the live view
    /// serves (the stub decorator, if one exists).
    pub fn resolve<S>(&self, key: &str) -> HarnessResult<Arc<S>>
    where
        S: SpyDecorator,
    {
        let resolver = self.state.resolver();
        resolver.ensure_initialized(key)?;
        self.state
            .spies
            .get_or_insert::<S>(key, || resolver.resolve(key))
    }
}

// ============================================================================
// Contexts
// ============================================================================

/// What a test body receives: the three views plus the test's sandbox.
#[derive(Clone)]
pub struct TestContext {
    state: Arc<SuiteState>,
}

impl TestContext {
    pub(crate) fn new(state: Arc<SuiteState>) -> Self {
        Self { state }
    }

    /// The live-component view.
    pub fn components(&self) -> LiveComponents {
        LiveComponents {
            state: Arc::clone(&self.state),
        }
    }

    /// The stubbed-component view.
    pub fn stub_components(&self) -> StubComponents {
        StubComponents {
            state: Arc::clone(&self.state),
        }
    }

    /// The spied-component view.
    pub fn spy_components(&self) -> SpyComponents {
        SpyComponents {
            state: Arc::clone(&self.state),
        }
    }

    /// The sandbox owned by the currently running test.
    pub fn sandbox(&self) -> Arc<Sandbox> {
        self.state
            .sandbox
            .lock()
            .clone()
            .expect("INVARIANT: a sandbox is installed for the duration of every test body")
    }
}

/// What the suite declaration closure receives.
///
/// Views obtained here may be moved into test closures; resolving through
/// them only succeeds once the program is running. `before_start` is only
/// reachable from this context, so registering a callback after one-time
/// setup is unrepresentable.
pub struct SuiteContext {
    state: Arc<SuiteState>,
    tests: Vec<TestCase>,
}

impl SuiteContext {
    /// The live-component view.
    pub fn components(&self) -> LiveComponents {
        LiveComponents {
            state: Arc::clone(&self.state),
        }
    }

    /// The stubbed-component view.
    pub fn stub_components(&self) -> StubComponents {
        StubComponents {
            state: Arc::clone(&self.state),
        }
    }

    /// The spied-component view.
    pub fn spy_components(&self) -> SpyComponents {
        SpyComponents {
            state: Arc::clone(&self.state),
        }
    }

    /// Queues a callback to run before the program is constructed.
    ///
    /// Callbacks run during one-time setup, strictly in registration
    /// order, each fully awaited before the next: a later callback may
    /// depend on an earlier one's side effect.
    pub fn before_start<F, Fut>(&self, callback: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.state
            .lifecycle
            .register_pre_start(Box::new(move || callback().boxed()));
    }

    /// Declares one test case. Bodies run in declaration order, each
    /// bracketed by per-test setup and teardown.
    pub fn test<F, Fut>(&mut self, name: impl Into<String>, body: F)
    where
        F: FnOnce(TestContext) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.tests.push(TestCase::new(
            name,
            Box::new(move |context| body(context).boxed()),
        ));
    }
}

// ============================================================================
// Runner
// ============================================================================

/// Binds a program definition to hook and reporting machinery.
pub struct Runner<D: ProgramDefinition> {
    definition: Arc<D>,
    hooks: Arc<dyn HookAdapter>,
    reporter: tokio::sync::Mutex<Box<dyn SuiteReporter>>,
}

/// Creates a test runner for `definition` with the default hook adapter
/// and reporter.
pub fn create_runner<D: ProgramDefinition>(definition: D) -> Runner<D> {
    Runner {
        definition: Arc::new(definition),
        hooks: Arc::new(hooks::SequentialHooks),
        reporter: tokio::sync::Mutex::new(Box::new(TracingReporter)),
    }
}

impl<D: ProgramDefinition> Runner<D> {
    /// Replaces the hook adapter.
    pub fn with_hooks(mut self, hooks: Arc<dyn HookAdapter>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Selects the hook adapter by name or alias; unknown names are a
    /// fatal configuration error.
    pub fn with_hooks_named(self, name: &str) -> HarnessResult<Self> {
        let hooks = hooks::select(name)?;
        Ok(self.with_hooks(hooks))
    }

    /// Replaces the reporter.
    pub fn with_reporter(self, reporter: impl SuiteReporter + 'static) -> Self {
        Runner {
            reporter: tokio::sync::Mutex::new(Box::new(reporter)),
            ..self
        }
    }

    /// Declares and runs one suite.
    ///
    /// `declare` runs synchronously, before the program exists; resolving
    /// any view inside it fails with
    /// [`NotInitialized`](crate::HarnessError::NotInitialized). A setup
    /// failure aborts the suite before any test body runs (teardown still
    /// attempts the program stop).
    pub async fn suite(
        &self,
        name: impl Into<String>,
        declare: impl FnOnce(&mut SuiteContext),
    ) -> HarnessResult<SuiteReport> {
        let state = Arc::new(SuiteState::default());

        let mut context = SuiteContext {
            state: Arc::clone(&state),
            tests: Vec::new(),
        };
        declare(&mut context);
        let SuiteContext { tests, .. } = context;

        let setup_state = Arc::clone(&state);
        let definition = Arc::clone(&self.definition);
        let one_time_setup: OneTimeHook = Box::new(move || {
            async move { setup_state.lifecycle.start(definition.as_ref()).await }.boxed()
        });

        let bracket_state = Arc::clone(&state);
        let per_test_setup: PerTestHook = Box::new(move || {
            // Fresh isolation for the incoming test: new sandbox, stub
            // behavior reset (instances survive), spy cache discarded.
            *bracket_state.sandbox.lock() = Some(Arc::new(Sandbox::new()));
            bracket_state.stubs.reset_all();
            bracket_state.spies.clear();
        });

        let restore_state = Arc::clone(&state);
        let per_test_teardown: PerTestHook = Box::new(move || {
            if let Some(sandbox) = restore_state.sandbox.lock().take() {
                sandbox.restore();
            }
        });

        let stop_state = Arc::clone(&state);
        let one_time_teardown: OneTimeHook =
            Box::new(move || async move { stop_state.lifecycle.stop().await }.boxed());

        let factory_state = Arc::clone(&state);
        let context_factory: ContextFactory =
            Box::new(move || TestContext::new(Arc::clone(&factory_state)));

        let schedule = hooks::SuiteSchedule::new(
            name,
            one_time_setup,
            per_test_setup,
            per_test_teardown,
            one_time_teardown,
            tests,
            context_factory,
        );

        let mut reporter = self.reporter.lock().await;
        self.hooks.run_suite(schedule, reporter.as_mut()).await
    }
}
