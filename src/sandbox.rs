//! Per-test sandbox for ad hoc patches.
//!
//! Anything a test changes outside the stub/spy machinery (an environment
//! variable, a file, a manually swapped implementation) registers an undo
//! action here. The orchestrator creates a fresh sandbox at per-test setup
//! and restores it at per-test teardown, running the actions in reverse
//! registration order.

use parking_lot::Mutex;

type RestoreAction = Box<dyn FnOnce() + Send>;

/// The set of deferred restore actions owned by the currently running test.
#[derive(Default)]
pub struct Sandbox {
    restorers: Mutex<Vec<RestoreAction>>,
}

impl Sandbox {
    /// Creates an empty sandbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an undo action to run at per-test teardown.
    pub fn defer(&self, restore: impl FnOnce() + Send + 'static) {
        self.restorers.lock().push(Box::new(restore));
    }

    /// Number of pending restore actions.
    pub fn pending(&self) -> usize {
        self.restorers.lock().len()
    }

    /// Runs all registered actions, most recent first.
    pub(crate) fn restore(&self) {
        let mut restorers = std::mem::take(&mut *self.restorers.lock());
        while let Some(restore) = restorers.pop() {
            restore();
        }
    }
}

impl std::fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sandbox")
            .field("pending", &self.pending())
            .finish()
    }
}
