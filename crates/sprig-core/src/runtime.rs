use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::{IndexMap, IndexSet};

use crate::error::RuntimeError;
use crate::mount::DEFAULT_FLUSH_LIMIT;
use crate::platform::{FlushScheduler, FlushTask};
use crate::tree::InstanceId;

pub(crate) type FlushListener = Rc<dyn Fn() -> Result<(), RuntimeError>>;

/// Identifies one mounted tree among those sharing a runtime.
pub(crate) type MountId = u64;

static NEXT_MOUNT: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_mount_id() -> MountId {
    NEXT_MOUNT.fetch_add(1, Ordering::Relaxed)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlushState {
    Idle,
    FlushPending,
}

struct MountSlot {
    listener: FlushListener,
    /// Instances awaiting a re-render, in request order.
    dirty: IndexSet<InstanceId>,
}

struct RuntimeInner {
    this: Weak<RuntimeInner>,
    scheduler: Rc<dyn FlushScheduler>,
    state: Cell<FlushState>,
    generation: Cell<u64>,
    mounts: RefCell<IndexMap<MountId, MountSlot>>,
}

impl RuntimeInner {
    fn request_render(&self, mount: MountId, id: InstanceId) {
        let queued = match self.mounts.borrow_mut().get_mut(&mount) {
            Some(slot) => {
                slot.dirty.insert(id);
                true
            }
            None => false,
        };
        if !queued {
            log::trace!("ignoring render request for instance {id} of unmounted tree {mount}");
            return;
        }
        self.schedule();
    }

    fn schedule(&self) {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        self.state.set(FlushState::FlushPending);
        log::trace!("scheduling flush generation {generation}");
        let runtime = self.this.clone();
        self.scheduler.schedule(FlushTask::new(generation, move || {
            match runtime.upgrade() {
                Some(inner) => inner.dispatch(generation),
                None => Ok(()),
            }
        }));
    }

    fn has_dirty(&self) -> bool {
        self.mounts.borrow().values().any(|slot| !slot.dirty.is_empty())
    }

    fn begin_flush(&self, generation: u64) -> bool {
        if generation != self.generation.get() || self.state.get() == FlushState::Idle {
            return false;
        }
        self.state.set(FlushState::Idle);
        true
    }

    /// Runs the flush for `generation`, handing each mount with dirty
    /// instances to its listener until every mount is clean.
    fn dispatch(&self, generation: u64) -> Result<(), RuntimeError> {
        if !self.begin_flush(generation) {
            log::trace!("skipping superseded flush {generation}");
            return Ok(());
        }
        let mut rounds = 0usize;
        loop {
            let ready: Vec<FlushListener> = self
                .mounts
                .borrow()
                .values()
                .filter(|slot| !slot.dirty.is_empty())
                .map(|slot| Rc::clone(&slot.listener))
                .collect();
            if ready.is_empty() {
                break;
            }
            rounds += 1;
            if rounds > DEFAULT_FLUSH_LIMIT {
                self.discard_all();
                self.settle();
                return Err(RuntimeError::FlushLimitExceeded {
                    limit: DEFAULT_FLUSH_LIMIT,
                });
            }
            for listener in ready {
                if let Err(err) = listener() {
                    self.settle();
                    return Err(err);
                }
            }
        }
        self.settle();
        Ok(())
    }

    fn discard_all(&self) {
        for slot in self.mounts.borrow_mut().values_mut() {
            slot.dirty.clear();
        }
    }

    /// Goes idle and makes tasks still queued by the host stale. Work left
    /// for other mounts gets a fresh flush instead.
    fn settle(&self) {
        if self.has_dirty() {
            self.schedule();
            return;
        }
        self.generation.set(self.generation.get() + 1);
        self.state.set(FlushState::Idle);
    }
}

/// Owner of the update scheduler state shared by setters and the mounts
/// rendering through it.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(scheduler: Rc<dyn FlushScheduler>) -> Self {
        Self {
            inner: Rc::new_cyclic(|this| RuntimeInner {
                this: this.clone(),
                scheduler,
                state: Cell::new(FlushState::Idle),
                generation: Cell::new(0),
                mounts: RefCell::new(IndexMap::new()),
            }),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle(Rc::downgrade(&self.inner))
    }

    pub fn state(&self) -> FlushState {
        self.inner.state.get()
    }

    /// Identifier of the most recent flush request.
    pub fn generation(&self) -> u64 {
        self.inner.generation.get()
    }

    pub fn has_invalid_instances(&self) -> bool {
        self.inner.has_dirty()
    }

    /// Number of live mounts flushing through this runtime.
    pub fn mount_count(&self) -> usize {
        self.inner.mounts.borrow().len()
    }

    pub(crate) fn has_invalid(&self, mount: MountId) -> bool {
        self.inner
            .mounts
            .borrow()
            .get(&mount)
            .is_some_and(|slot| !slot.dirty.is_empty())
    }

    pub(crate) fn install_flush_listener(&self, mount: MountId, listener: FlushListener) {
        self.inner.mounts.borrow_mut().insert(
            mount,
            MountSlot {
                listener,
                dirty: IndexSet::new(),
            },
        );
    }

    /// Forgets `mount` along with any re-renders it still had queued.
    pub(crate) fn clear_flush_listener(&self, mount: MountId) {
        self.inner.mounts.borrow_mut().shift_remove(&mount);
    }

    pub(crate) fn take_invalid(&self, mount: MountId) -> Vec<InstanceId> {
        match self.inner.mounts.borrow_mut().get_mut(&mount) {
            Some(slot) => slot.dirty.drain(..).collect(),
            None => Vec::new(),
        }
    }

    pub(crate) fn settle(&self) {
        self.inner.settle();
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("state", &self.state())
            .field("generation", &self.generation())
            .finish()
    }
}

#[derive(Clone)]
pub struct RuntimeHandle(Weak<RuntimeInner>);

impl RuntimeHandle {
    pub(crate) fn request_render(&self, mount: MountId, id: InstanceId) {
        if let Some(inner) = self.0.upgrade() {
            inner.request_render(mount, id);
        }
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}
