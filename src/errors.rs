//! Harness-level errors.
//!
//! Everything the harness itself can fail with lives in [`HarnessError`].
//! Errors raised by a component's own methods are never intercepted or
//! translated; they propagate to the calling test body, which is the
//! expected mechanism for testing failure paths.

use thiserror::Error;

/// Errors produced by the harness coordination layer.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// No usable hook adapter for the requested name. Fatal: raised while a
    /// runner is being configured, before any suite runs.
    #[error("no hook adapter is registered under the name `{0}`")]
    Configuration(String),

    /// A component view was accessed before the program under test started
    /// (or after its teardown began).
    #[error("cannot resolve component `{key}` before the test program is initialized")]
    NotInitialized {
        /// Key the caller asked for.
        key: String,
    },

    /// The key is not present in the program's component set.
    #[error("component `{key}` does not exist")]
    UnknownComponent {
        /// Key the caller asked for.
        key: String,
    },

    /// The component exists but is not of the type the caller requested.
    #[error("component `{key}` is not a `{expected}`")]
    ComponentType {
        /// Key the caller asked for.
        key: String,
        /// Type name the caller requested.
        expected: &'static str,
    },

    /// A pre-start callback or the program construction failed during
    /// one-time setup. The whole suite is aborted; no test bodies run.
    #[error("suite setup failed: {source}")]
    SuiteSetup {
        #[source]
        source: anyhow::Error,
    },

    /// Stopping the program failed during one-time teardown.
    #[error("suite teardown failed: {source}")]
    SuiteTeardown {
        #[source]
        source: anyhow::Error,
    },
}

/// Result alias used throughout the harness.
pub type HarnessResult<T> = Result<T, HarnessError>;
