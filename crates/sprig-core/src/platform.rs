//! Host services the runtime delegates to.
//!
//! A host supplies a [`FlushScheduler`] that defers flushes to a later turn
//! of its event loop (a timer, a microtask, or a queue drained by tests).

use std::fmt;

use crate::error::RuntimeError;

/// Defers flush work requested by state setters.
pub trait FlushScheduler {
    /// Runs `task` on a later turn of the host event loop.
    ///
    /// A newer task supersedes older ones: implementations may drop pending
    /// tasks when a fresh one arrives, and a task that runs after being
    /// superseded does nothing.
    fn schedule(&self, task: FlushTask);
}

/// One deferred flush, tagged with the generation that requested it.
pub struct FlushTask {
    generation: u64,
    run: Box<dyn FnOnce() -> Result<(), RuntimeError> + 'static>,
}

impl FlushTask {
    pub(crate) fn new(
        generation: u64,
        run: impl FnOnce() -> Result<(), RuntimeError> + 'static,
    ) -> Self {
        Self {
            generation,
            run: Box::new(run),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn run(self) -> Result<(), RuntimeError> {
        (self.run)()
    }
}

impl fmt::Debug for FlushTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlushTask")
            .field("generation", &self.generation)
            .finish()
    }
}
