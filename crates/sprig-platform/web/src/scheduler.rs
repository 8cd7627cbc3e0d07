use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use sprig_core::{DomError, FlushScheduler, FlushTask};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

struct TimeoutInner {
    window: web_sys::Window,
    latest: RefCell<Option<FlushTask>>,
    handle: Cell<Option<i32>>,
    callback: RefCell<Option<Closure<dyn FnMut()>>>,
}

impl TimeoutInner {
    fn fire(&self) {
        self.handle.set(None);
        let task = self.latest.borrow_mut().take();
        if let Some(task) = task {
            let generation = task.generation();
            if let Err(err) = task.run() {
                log::error!("flush {generation} failed: {err}");
            }
        }
    }
}

/// Defers flushes with a zero-delay `setTimeout`. Scheduling again before
/// the timer fires cancels it and keeps only the newest task.
#[derive(Clone)]
pub struct TimeoutScheduler {
    inner: Rc<TimeoutInner>,
}

impl TimeoutScheduler {
    pub fn new() -> Result<Self, DomError> {
        let window =
            web_sys::window().ok_or_else(|| DomError::Host("no global window".to_string()))?;
        let inner = Rc::new(TimeoutInner {
            window,
            latest: RefCell::new(None),
            handle: Cell::new(None),
            callback: RefCell::new(None),
        });
        let weak: Weak<TimeoutInner> = Rc::downgrade(&inner);
        *inner.callback.borrow_mut() = Some(Closure::wrap(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.fire();
            }
        }) as Box<dyn FnMut()>));
        Ok(Self { inner })
    }
}

impl FlushScheduler for TimeoutScheduler {
    fn schedule(&self, task: FlushTask) {
        let inner = &self.inner;
        if let Some(handle) = inner.handle.take() {
            inner.window.clear_timeout_with_handle(handle);
        }
        inner.latest.replace(Some(task));
        let slot = inner.callback.borrow();
        let Some(callback) = slot.as_ref() else {
            return;
        };
        match inner
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                callback.as_ref().unchecked_ref(),
                0,
            ) {
            Ok(handle) => inner.handle.set(Some(handle)),
            Err(err) => log::error!("could not schedule flush: {err:?}"),
        }
    }
}
