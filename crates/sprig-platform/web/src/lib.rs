//! Browser host for Sprig: a [`Document`](sprig_core::Document) over the
//! live DOM and a `setTimeout` flush scheduler.

mod document;
mod scheduler;

use std::rc::Rc;

use sprig_core::{mount_with_options, Element, Mount, MountOptions, MountTarget, Runtime, RuntimeError};

pub use document::WebDocument;
pub use scheduler::TimeoutScheduler;

/// Mounts `element` into the page's `target` with the browser document and
/// timer scheduler. Keep the returned [`Mount`] alive for updates to flush.
pub fn mount_to(
    element: impl Into<Element>,
    target: impl Into<MountTarget>,
) -> Result<Mount, RuntimeError> {
    mount_to_with_options(element, target, MountOptions::default())
}

pub fn mount_to_with_options(
    element: impl Into<Element>,
    target: impl Into<MountTarget>,
    options: MountOptions,
) -> Result<Mount, RuntimeError> {
    let document = Rc::new(WebDocument::new()?);
    let scheduler = Rc::new(TimeoutScheduler::new()?);
    mount_with_options(element, target, document, Runtime::new(scheduler), options)
}
