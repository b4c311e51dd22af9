//! Program lifecycle: construction, start, and stop.
//!
//! A [`ProgramDefinition`] describes how to build and boot the program
//! under test; [`run`] turns it into a live [`Program`]. The harness-side
//! [`ProgramLifecycle`] adapter owns the one program slot per suite plus
//! the queue of pre-start callbacks, and maps failures into the harness
//! error kinds.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::components::ComponentSet;
use crate::errors::{HarnessError, HarnessResult};

/// How to construct and boot the program under test.
///
/// This is the boundary to the component-lifecycle runner: the harness only
/// ever calls `init_components` and `main`, in that order, once per suite.
#[async_trait]
pub trait ProgramDefinition: Send + Sync + 'static {
    /// Builds the component set the program runs with.
    async fn init_components(&self) -> anyhow::Result<ComponentSet>;

    /// Entry point invoked with the constructed program. The default
    /// starts every registered component lifecycle.
    async fn main(&self, program: &Program) -> anyhow::Result<()> {
        program.start_components().await
    }
}

/// The running program: a component set plus stop semantics.
pub struct Program {
    components: ComponentSet,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl Program {
    fn new(components: ComponentSet) -> Self {
        Self {
            components,
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    /// The program's component set.
    pub fn components(&self) -> &ComponentSet {
        &self.components
    }

    /// Starts every registered component lifecycle, in registration order.
    /// A second call is a no-op.
    pub async fn start_components(&self) -> anyhow::Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        for (key, lifecycle) in self.components.lifecycles() {
            tracing::debug!(component = %key, "starting component");
            lifecycle.start().await?;
        }
        Ok(())
    }

    /// Stops component lifecycles in reverse registration order.
    ///
    /// A no-op when the components never started or were already stopped.
    pub async fn stop(&self) -> anyhow::Result<()> {
        if !self.started.load(Ordering::SeqCst) {
            return Ok(());
        }
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        for (key, lifecycle) in self.components.lifecycles().iter().rev() {
            tracing::debug!(component = %key, "stopping component");
            lifecycle.stop().await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("components", &self.components)
            .field("started", &self.started.load(Ordering::SeqCst))
            .field("stopped", &self.stopped.load(Ordering::SeqCst))
            .finish()
    }
}

/// Constructs and boots a program from its definition.
pub async fn run<D: ProgramDefinition + ?Sized>(definition: &D) -> anyhow::Result<Program> {
    let components = definition.init_components().await?;
    let program = Program::new(components);
    definition.main(&program).await?;
    Ok(program)
}

/// A queued callback that runs before the program is constructed.
pub(crate) type PreStartCallback = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

/// Owns the suite's single program slot and its pre-start queue.
///
/// The slot is re-read on every component access, never cached by callers:
/// views exist at suite-declaration time, before the program does.
#[derive(Default)]
pub(crate) struct ProgramLifecycle {
    pre_start: Mutex<Vec<PreStartCallback>>,
    program: Mutex<Option<Arc<Program>>>,
}

impl ProgramLifecycle {
    /// Appends a callback to the pre-start queue.
    pub(crate) fn register_pre_start(&self, callback: PreStartCallback) {
        self.pre_start.lock().push(callback);
    }

    /// One-time setup: drains the pre-start queue strictly in registration
    /// order, each fully awaited before the next (a later callback may depend
    /// on an earlier one's side effect), then runs the
    /// program and stores it.
    pub(crate) async fn start<D: ProgramDefinition + ?Sized>(
        &self,
        definition: &D,
    ) -> HarnessResult<()> {
        let callbacks = std::mem::take(&mut *self.pre_start.lock());
        let count = callbacks.len();
        for (index, callback) in callbacks.into_iter().enumerate() {
            tracing::debug!(index, count, "running pre-start callback");
            callback()
                .await
                .map_err(|source| HarnessError::SuiteSetup { source })?;
        }

        let program = run(definition)
            .await
            .map_err(|source| HarnessError::SuiteSetup { source })?;
        *self.program.lock() = Some(Arc::new(program));
        Ok(())
    }

    /// One-time teardown: stops the program if one was stored. A missing
    /// program (start failed or never ran) is a no-op, never an error.
    pub(crate) async fn stop(&self) -> HarnessResult<()> {
        let program = self.program.lock().take();
        if let Some(program) = program {
            program
                .stop()
                .await
                .map_err(|source| HarnessError::SuiteTeardown { source })?;
        }
        Ok(())
    }

    /// The current program, if one-time setup has completed.
    pub(crate) fn program(&self) -> Option<Arc<Program>> {
        self.program.lock().clone()
    }
}
