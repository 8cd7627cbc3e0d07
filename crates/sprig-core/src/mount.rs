use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::document::Document;
use crate::element::Element;
use crate::error::RuntimeError;
use crate::runtime::{next_mount_id, MountId, Runtime};
use crate::tree::InstanceTree;
use crate::NodeId;

/// Flush cycles allowed before a flush gives up on settling.
pub const DEFAULT_FLUSH_LIMIT: usize = 5000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MountTarget {
    Node(NodeId),
    Selector(String),
}

impl From<NodeId> for MountTarget {
    fn from(node: NodeId) -> Self {
        MountTarget::Node(node)
    }
}

impl From<&str> for MountTarget {
    fn from(selector: &str) -> Self {
        MountTarget::Selector(selector.to_string())
    }
}

impl From<String> for MountTarget {
    fn from(selector: String) -> Self {
        MountTarget::Selector(selector)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MountOptions {
    /// Clear the target's existing children before attaching.
    pub replace: bool,
    /// Flush cycles allowed before [`RuntimeError::FlushLimitExceeded`].
    pub flush_limit: usize,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self {
            replace: true,
            flush_limit: DEFAULT_FLUSH_LIMIT,
        }
    }
}

struct MountInner {
    id: MountId,
    document: Rc<dyn Document>,
    runtime: Runtime,
    tree: RefCell<InstanceTree>,
    container: NodeId,
    options: MountOptions,
}

impl MountInner {
    fn render_root(&self, element: &Element) -> Result<(), RuntimeError> {
        let document = &*self.document;
        let actions = {
            let mut tree = self.tree.borrow_mut();
            let span = tree.render_root(document, element)?;
            for node in span {
                document.append_child(self.container, node)?;
            }
            tree.take_pending()
        };
        for action in actions {
            action();
        }
        Ok(())
    }

    /// Re-renders invalidated instances until no effect requests more work.
    fn run_cycles(&self) -> Result<(), RuntimeError> {
        let document = &*self.document;
        let mut cycles = 0usize;
        loop {
            let dirty = self.runtime.take_invalid(self.id);
            if dirty.is_empty() {
                break;
            }
            cycles += 1;
            if cycles > self.options.flush_limit {
                return Err(RuntimeError::FlushLimitExceeded {
                    limit: self.options.flush_limit,
                });
            }
            log::debug!(
                "flush cycle {cycles}: re-rendering {} instance(s)",
                dirty.len()
            );
            let (actions, released) = {
                let mut tree = self.tree.borrow_mut();
                tree.rerender_dirty(document, dirty)?;
                (tree.take_pending(), tree.take_released())
            };
            for action in actions {
                action();
            }
            for node in released {
                document.release(node);
            }
        }
        Ok(())
    }
}

impl Drop for MountInner {
    fn drop(&mut self) {
        self.runtime.clear_flush_listener(self.id);
    }
}

/// A tree mounted into a document container.
///
/// Keep the handle alive for as long as the tree should keep updating; once
/// it is dropped, scheduled flushes do nothing.
pub struct Mount {
    inner: Rc<MountInner>,
}

impl Mount {
    pub fn container(&self) -> NodeId {
        self.inner.container
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    pub fn is_flush_pending(&self) -> bool {
        self.inner.runtime.has_invalid(self.inner.id)
    }

    /// Flushes pending updates immediately instead of waiting for the
    /// scheduled task, which then finds nothing to do.
    pub fn flush_now(&self) -> Result<(), RuntimeError> {
        let result = self.inner.run_cycles();
        self.inner.runtime.settle();
        result
    }

    pub fn instance_count(&self) -> usize {
        self.inner.tree.borrow().len()
    }

    #[cfg(test)]
    pub(crate) fn visited_len(&self) -> usize {
        self.inner.tree.borrow().visited_len()
    }

    /// Tears the whole tree down, running every unmount callback, and
    /// removes the mounted nodes from the container.
    pub fn unmount(self) -> Result<(), RuntimeError> {
        let inner = &self.inner;
        let document = &*inner.document;
        inner.runtime.clear_flush_listener(inner.id);
        let (span, actions, released) = {
            let mut tree = inner.tree.borrow_mut();
            let span = tree.teardown_all(document)?;
            (span, tree.take_pending(), tree.take_released())
        };
        for &node in &span {
            if document.parent_of(node) == Some(inner.container) {
                document.remove_child(inner.container, node)?;
            }
        }
        for action in actions {
            action();
        }
        for node in span.into_iter().chain(released) {
            document.release(node);
        }
        inner.runtime.settle();
        Ok(())
    }
}

impl fmt::Debug for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mount")
            .field("container", &self.inner.container)
            .field("runtime", &self.inner.runtime)
            .finish()
    }
}

/// Renders `element` into `target`, replacing its contents.
pub fn mount(
    element: impl Into<Element>,
    target: impl Into<MountTarget>,
    document: Rc<dyn Document>,
    runtime: Runtime,
) -> Result<Mount, RuntimeError> {
    mount_with_options(element, target, document, runtime, MountOptions::default())
}

/// Renders `element` into `target` synchronously and wires the runtime so
/// later state changes flush through its scheduler.
pub fn mount_with_options(
    element: impl Into<Element>,
    target: impl Into<MountTarget>,
    document: Rc<dyn Document>,
    runtime: Runtime,
    options: MountOptions,
) -> Result<Mount, RuntimeError> {
    let container = match target.into() {
        MountTarget::Node(node) => node,
        MountTarget::Selector(selector) => document
            .query_selector(&selector)
            .ok_or(RuntimeError::MountTargetNotFound { selector })?,
    };
    if options.replace {
        document.clear_children(container)?;
    }
    let id = next_mount_id();
    let inner = Rc::new(MountInner {
        id,
        tree: RefCell::new(InstanceTree::new(runtime.handle(), id)),
        document,
        runtime,
        container,
        options,
    });
    let weak = Rc::downgrade(&inner);
    inner.runtime.install_flush_listener(
        id,
        Rc::new(move || match weak.upgrade() {
            Some(inner) => inner.run_cycles(),
            None => Ok(()),
        }),
    );
    inner.render_root(&element.into())?;
    Ok(Mount { inner })
}
