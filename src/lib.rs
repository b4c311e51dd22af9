#![forbid(unsafe_code)]
//! Stagehand: a suite-scoped test harness for component-based programs.
//!
//! A suite boots exactly one program (a named set of components), runs its
//! tests against it, and stops it afterwards. Test bodies reach the
//! components through three lazily-resolving views:
//!
//! - **live**: the component as registered (or its stub decorator, once
//!   one exists for the key);
//! - **stubbed**: an active mock wrapper that records calls and can
//!   override results, one instance per key for the whole suite;
//! - **spied**: a passive wrapper that records and always forwards,
//!   rebuilt from scratch for every test.
//!
//! Between tests the harness resets stub behavior, discards the spy cache,
//! and restores the test's sandbox, so call history never leaks while the
//! program (and its state) lives on.
//!
//! ```ignore
//! let runner = create_runner(MyProgram);
//! let report = runner
//!     .suite("counter behavior", |suite| {
//!         suite.before_start(|| async { /* runs before the program boots */ Ok(()) });
//!
//!         suite.test("increments", |t| async move {
//!             let counter: Arc<dyn Counter> = t.components().resolve("counter")?;
//!             anyhow::ensure!(counter.increment() == 1);
//!             Ok(())
//!         });
//!     })
//!     .await?;
//! assert!(report.ok());
//! ```
//!
//! ## Panic Policy
//!
//! Harness code propagates failures as `Result`; the only `expect` is on a
//! documented invariant (a sandbox exists while a test body runs). Test
//! bodies may panic freely; each runs in its own task and a panic is
//! recorded as that test's failure, never the suite's.

pub mod components;
pub mod config;
pub mod errors;
pub mod hooks;
pub mod lifecycle;
pub mod local_fetch;
pub mod report;
pub mod runner;
pub mod sandbox;
pub mod spy;
pub mod stub;

mod resolver;

pub use components::{ComponentLifecycle, ComponentSet};
pub use config::{ConfigComponent, InMemoryConfig};
pub use errors::{HarnessError, HarnessResult};
pub use hooks::{FailFastHooks, HookAdapter, SequentialHooks, SuiteSchedule, TestCase};
pub use lifecycle::{Program, ProgramDefinition};
pub use local_fetch::{
    HTTP_SERVER_HOST, HTTP_SERVER_PORT, LocalFetch, PortAllocator, create_local_fetch,
    default_server_config,
};
pub use report::{SuiteReport, SuiteReporter, TestOutcome, TestStatus, TracingReporter};
pub use runner::{
    LiveComponents, Runner, SpyComponents, StubComponents, SuiteContext, TestContext,
    create_runner,
};
pub use sandbox::Sandbox;
pub use spy::{SpyDecorator, SpyMethod};
pub use stub::{StubDecorator, StubEntry, StubMethod};
