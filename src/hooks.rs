//! Hook adapters: how a suite's lifecycle is driven.
//!
//! The orchestrator compiles a suite into a [`SuiteSchedule`] (four hook
//! points plus the declared test cases) and hands it to a [`HookAdapter`].
//! Adapters are explicit and caller-selected; [`select`] resolves one by
//! name (or its alias) and fails fast with a configuration error when no
//! adapter is registered under that name.
//!
//! Two adapters ship with the crate:
//! - [`SequentialHooks`] (default): runs every test in declaration order.
//! - [`FailFastHooks`]: stops scheduling after the first failure and marks
//!   the remaining tests skipped; one-time teardown still runs.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::errors::{HarnessError, HarnessResult};
use crate::report::{SuiteReport, SuiteReporter, TestOutcome, TestStatus};
use crate::runner::TestContext;

pub(crate) type OneTimeHook = Box<dyn FnOnce() -> BoxFuture<'static, HarnessResult<()>> + Send>;
pub(crate) type PerTestHook = Box<dyn Fn() + Send + Sync>;
pub(crate) type TestBody =
    Box<dyn FnOnce(TestContext) -> BoxFuture<'static, anyhow::Result<()>> + Send>;
pub(crate) type ContextFactory = Box<dyn Fn() -> TestContext + Send + Sync>;

/// One declared test case.
pub struct TestCase {
    name: String,
    body: TestBody,
}

impl TestCase {
    pub(crate) fn new(name: impl Into<String>, body: TestBody) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }

    /// Test name as declared.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the body to completion, isolated in its own task so a panic is
    /// recorded as a failure instead of tearing down the suite.
    pub async fn execute(self, context: TestContext) -> TestOutcome {
        let started = Instant::now();
        let status = match tokio::spawn((self.body)(context)).await {
            Ok(Ok(())) => TestStatus::Passed,
            Ok(Err(error)) => TestStatus::Failed(format!("{error:#}")),
            Err(join_error) => TestStatus::Failed(panic_message(join_error)),
        };
        TestOutcome {
            name: self.name,
            status,
            duration: started.elapsed(),
        }
    }

    /// Marks the case skipped without running it.
    pub fn skip(self) -> TestOutcome {
        TestOutcome {
            name: self.name,
            status: TestStatus::Skipped,
            duration: std::time::Duration::ZERO,
        }
    }
}

fn panic_message(join_error: tokio::task::JoinError) -> String {
    if join_error.is_panic() {
        let payload = join_error.into_panic();
        if let Some(message) = payload.downcast_ref::<&str>() {
            format!("test body panicked: {message}")
        } else if let Some(message) = payload.downcast_ref::<String>() {
            format!("test body panicked: {message}")
        } else {
            "test body panicked".to_string()
        }
    } else {
        "test task was cancelled".to_string()
    }
}

/// A compiled suite: hook points, test cases, and a context factory,
/// exposed through methods so external [`HookAdapter`] implementations can
/// drive it.
pub struct SuiteSchedule {
    suite: String,
    one_time_setup: Option<OneTimeHook>,
    per_test_setup: PerTestHook,
    per_test_teardown: PerTestHook,
    one_time_teardown: Option<OneTimeHook>,
    tests: Vec<TestCase>,
    context_factory: ContextFactory,
}

impl SuiteSchedule {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        suite: impl Into<String>,
        one_time_setup: OneTimeHook,
        per_test_setup: PerTestHook,
        per_test_teardown: PerTestHook,
        one_time_teardown: OneTimeHook,
        tests: Vec<TestCase>,
        context_factory: ContextFactory,
    ) -> Self {
        Self {
            suite: suite.into(),
            one_time_setup: Some(one_time_setup),
            per_test_setup,
            per_test_teardown,
            one_time_teardown: Some(one_time_teardown),
            tests,
            context_factory,
        }
    }

    /// Suite name as declared.
    pub fn suite_name(&self) -> &str {
        &self.suite
    }

    /// Number of declared tests.
    pub fn test_count(&self) -> usize {
        self.tests.len()
    }

    /// Runs one-time setup. Consumed on first call; later calls are no-ops.
    pub async fn one_time_setup(&mut self) -> HarnessResult<()> {
        match self.one_time_setup.take() {
            Some(hook) => hook().await,
            None => Ok(()),
        }
    }

    /// Runs one-time teardown. Consumed on first call; later calls are
    /// no-ops.
    pub async fn one_time_teardown(&mut self) -> HarnessResult<()> {
        match self.one_time_teardown.take() {
            Some(hook) => hook().await,
            None => Ok(()),
        }
    }

    /// Runs the per-test setup bracket.
    pub fn per_test_setup(&self) {
        (self.per_test_setup)();
    }

    /// Runs the per-test teardown bracket.
    pub fn per_test_teardown(&self) {
        (self.per_test_teardown)();
    }

    /// Takes ownership of the declared tests.
    pub fn take_tests(&mut self) -> Vec<TestCase> {
        std::mem::take(&mut self.tests)
    }

    /// Builds a context for one test body.
    pub fn test_context(&self) -> TestContext {
        (self.context_factory)()
    }
}

/// Drives one suite's lifecycle.
#[async_trait]
pub trait HookAdapter: Send + Sync {
    /// Adapter name, as resolvable through [`select`].
    fn name(&self) -> &'static str;

    /// Sequences setup, test brackets, bodies, and teardown for one suite.
    async fn run_suite(
        &self,
        schedule: SuiteSchedule,
        reporter: &mut dyn SuiteReporter,
    ) -> HarnessResult<SuiteReport>;
}

async fn drive(
    mut schedule: SuiteSchedule,
    reporter: &mut dyn SuiteReporter,
    bail_on_failure: bool,
) -> HarnessResult<SuiteReport> {
    let suite_started = Instant::now();
    reporter.on_suite_start(schedule.suite_name(), schedule.test_count());

    if let Err(setup_error) = schedule.one_time_setup().await {
        // The suite is aborted, but teardown still gets its chance: stopping
        // a never-started program is a no-op, a half-started one is not.
        if let Err(teardown_error) = schedule.one_time_teardown().await {
            tracing::error!(error = %teardown_error, "teardown failed after setup failure");
        }
        return Err(setup_error);
    }

    let mut outcomes = Vec::new();
    let mut failed = false;
    for test in schedule.take_tests() {
        if bail_on_failure && failed {
            let outcome = test.skip();
            reporter.on_test_complete(&outcome);
            outcomes.push(outcome);
            continue;
        }

        schedule.per_test_setup();
        reporter.on_test_start(test.name());
        let outcome = test.execute(schedule.test_context()).await;
        schedule.per_test_teardown();

        failed |= matches!(outcome.status, TestStatus::Failed(_));
        reporter.on_test_complete(&outcome);
        outcomes.push(outcome);
    }

    schedule.one_time_teardown().await?;

    let report = SuiteReport {
        suite: schedule.suite_name().to_string(),
        outcomes,
        duration: suite_started.elapsed(),
    };
    reporter.on_suite_complete(&report);
    Ok(report)
}

/// Default adapter: every declared test runs, in declaration order.
#[derive(Debug, Default)]
pub struct SequentialHooks;

#[async_trait]
impl HookAdapter for SequentialHooks {
    fn name(&self) -> &'static str {
        "sequential"
    }

    async fn run_suite(
        &self,
        schedule: SuiteSchedule,
        reporter: &mut dyn SuiteReporter,
    ) -> HarnessResult<SuiteReport> {
        drive(schedule, reporter, false).await
    }
}

/// Adapter that stops scheduling after the first failure; the remaining
/// tests are reported as skipped and teardown still runs.
#[derive(Debug, Default)]
pub struct FailFastHooks;

#[async_trait]
impl HookAdapter for FailFastHooks {
    fn name(&self) -> &'static str {
        "fail-fast"
    }

    async fn run_suite(
        &self,
        schedule: SuiteSchedule,
        reporter: &mut dyn SuiteReporter,
    ) -> HarnessResult<SuiteReport> {
        drive(schedule, reporter, true).await
    }
}

/// Resolves a hook adapter by name or alias.
///
/// `"sequential"`/`"inline"` and `"fail-fast"`/`"bail"` are registered;
/// any other name is a fatal [`HarnessError::Configuration`].
pub fn select(name: &str) -> HarnessResult<Arc<dyn HookAdapter>> {
    match name {
        "sequential" | "inline" => Ok(Arc::new(SequentialHooks)),
        "fail-fast" | "bail" => Ok(Arc::new(FailFastHooks)),
        other => Err(HarnessError::Configuration(other.to_string())),
    }
}
