//! Standard flush scheduling for hosts without an event loop of their own.
//!
//! [`StdScheduler`] keeps the most recent [`FlushTask`] until the host drains
//! it with [`StdScheduler::run_pending`]. Native apps call that from their main
//! loop, tests call it where a browser would have fired the timer.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use sprig_core::{FlushScheduler, FlushTask, Runtime, RuntimeError, RuntimeHandle};

/// Scheduler holding at most one pending flush. A newer task replaces the
/// one waiting in the slot.
pub struct StdScheduler {
    pending: RefCell<Option<FlushTask>>,
    flush_requested: Cell<bool>,
    flush_waker: RefCell<Option<Rc<dyn Fn()>>>,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self {
            pending: RefCell::new(None),
            flush_requested: Cell::new(false),
            flush_waker: RefCell::new(None),
        }
    }

    /// Returns whether a flush has been requested since the last call.
    pub fn take_flush_request(&self) -> bool {
        self.flush_requested.replace(false)
    }

    pub fn has_pending(&self) -> bool {
        self.pending.borrow().is_some()
    }

    /// Runs pending flushes until the slot stays empty. Returns how many
    /// tasks ran, superseded ones included.
    pub fn run_pending(&self) -> Result<usize, RuntimeError> {
        let mut ran = 0;
        loop {
            let task = self.pending.borrow_mut().take();
            let Some(task) = task else {
                return Ok(ran);
            };
            task.run()?;
            ran += 1;
        }
    }

    /// Registers a waker invoked whenever a new flush is scheduled.
    pub fn set_flush_waker(&self, waker: impl Fn() + 'static) {
        self.flush_waker.replace(Some(Rc::new(waker)));
    }

    pub fn clear_flush_waker(&self) {
        self.flush_waker.replace(None);
    }

    fn wake(&self) {
        let waker = self.flush_waker.borrow().clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl Default for StdScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdScheduler")
            .field("pending", &self.pending.borrow().as_ref().map(FlushTask::generation))
            .field("flush_requested", &self.flush_requested.get())
            .finish()
    }
}

impl FlushScheduler for StdScheduler {
    fn schedule(&self, task: FlushTask) {
        if let Some(superseded) = self.pending.replace(Some(task)) {
            log::trace!("flush {} superseded", superseded.generation());
        }
        self.flush_requested.set(true);
        self.wake();
    }
}

/// Convenience container bundling the standard scheduler with a [`Runtime`].
#[derive(Clone)]
pub struct StdRuntime {
    scheduler: Rc<StdScheduler>,
    runtime: Runtime,
}

impl StdRuntime {
    pub fn new() -> Self {
        let scheduler = Rc::new(StdScheduler::default());
        let runtime = Runtime::new(scheduler.clone());
        Self { scheduler, runtime }
    }

    /// Returns a [`sprig_core::Runtime`] wired to the standard scheduler.
    pub fn runtime(&self) -> Runtime {
        self.runtime.clone()
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    pub fn scheduler(&self) -> Rc<StdScheduler> {
        Rc::clone(&self.scheduler)
    }

    /// Returns whether a flush was requested since the last poll.
    pub fn take_flush_request(&self) -> bool {
        self.scheduler.take_flush_request()
    }

    pub fn has_pending(&self) -> bool {
        self.scheduler.has_pending()
    }

    /// Drains pending flushes; see [`StdScheduler::run_pending`].
    pub fn run_pending(&self) -> Result<usize, RuntimeError> {
        self.scheduler.run_pending()
    }

    /// Registers a waker to be called when the runtime schedules a new flush.
    pub fn set_flush_waker(&self, waker: impl Fn() + 'static) {
        self.scheduler.set_flush_waker(waker);
    }

    pub fn clear_flush_waker(&self) {
        self.scheduler.clear_flush_waker();
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("scheduler", &self.scheduler)
            .field("runtime", &self.runtime)
            .finish()
    }
}

impl Default for StdRuntime {
    fn default() -> Self {
        Self::new()
    }
}
