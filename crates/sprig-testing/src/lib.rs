//! Testing utilities and harness for Sprig.
//!
//! [`TestHarness`] owns an in-memory document with a `<div id="root">`
//! mounted under `<body>` and a [`StdRuntime`] whose flushes only run when
//! the test drains them, the way fake timers would in a browser test.

use std::rc::Rc;

use sprig_core::{
    mount_with_options, Document, DomError, Element, MemoryDocument, Mount, MountOptions,
    MountTarget, NodeId, Runtime, RuntimeError,
};
use sprig_runtime_std::StdRuntime;

/// Headless harness for exercising mounted components in tests.
pub struct TestHarness {
    document: Rc<MemoryDocument>,
    runtime: StdRuntime,
    root: NodeId,
    mount: Option<Mount>,
}

impl TestHarness {
    /// Create a harness with an empty `#root` container.
    pub fn new() -> Self {
        let document = Rc::new(MemoryDocument::new());
        let root = add_container(&document, "root");
        Self {
            document,
            runtime: StdRuntime::new(),
            root,
            mount: None,
        }
    }

    /// Adds another `<div>` with the given id under `<body>`, for portals or
    /// a second mount.
    pub fn add_container(&self, id: &str) -> NodeId {
        add_container(&self.document, id)
    }

    /// Mount `element` into `#root`, replacing any previous tree.
    pub fn mount(&mut self, element: impl Into<Element>) -> Result<(), RuntimeError> {
        self.mount_with_options(element, self.root, MountOptions::default())
    }

    pub fn mount_with_options(
        &mut self,
        element: impl Into<Element>,
        target: impl Into<MountTarget>,
        options: MountOptions,
    ) -> Result<(), RuntimeError> {
        if let Some(previous) = self.mount.take() {
            previous.unmount()?;
        }
        let mount = mount_with_options(
            element,
            target,
            self.document.clone(),
            self.runtime.runtime(),
            options,
        )?;
        self.mount = Some(mount);
        Ok(())
    }

    /// Run every pending flush until the runtime goes idle.
    pub fn run_all_timers(&self) -> Result<usize, RuntimeError> {
        let ran = self.runtime.run_pending()?;
        log::trace!("drained {ran} flush task(s)");
        Ok(ran)
    }

    /// The first element matching `selector`.
    pub fn find(&self, selector: &str) -> Result<NodeId, DomError> {
        self.document
            .query_selector(selector)
            .ok_or_else(|| DomError::NoMatch(selector.to_string()))
    }

    pub fn find_all(&self, selector: &str) -> Vec<NodeId> {
        self.document.query_selector_all(selector)
    }

    pub fn exists(&self, selector: &str) -> bool {
        self.document.query_selector(selector).is_some()
    }

    pub fn count(&self, selector: &str) -> usize {
        self.find_all(selector).len()
    }

    /// Dispatch a click on the first match of `selector`.
    pub fn click(&self, selector: &str) -> Result<(), DomError> {
        self.document.click(self.find(selector)?)
    }

    /// Replace the value of the matched control and fire `input`.
    pub fn set_value(&self, selector: &str, value: &str) -> Result<(), DomError> {
        self.document.set_value(self.find(selector)?, value)
    }

    /// Append `text` to the control's current value, one `input` event per
    /// character.
    pub fn type_text(&self, selector: &str, text: &str) -> Result<(), DomError> {
        let node = self.find(selector)?;
        let mut value = self.document.value(node);
        for ch in text.chars() {
            value.push(ch);
            self.document.set_value(node, &value)?;
        }
        Ok(())
    }

    pub fn text(&self, selector: &str) -> Result<String, DomError> {
        Ok(self.document.text_content(self.find(selector)?))
    }

    pub fn value(&self, selector: &str) -> Result<String, DomError> {
        Ok(self.document.value(self.find(selector)?))
    }

    pub fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>, DomError> {
        Ok(self.document.attribute(self.find(selector)?, name))
    }

    /// Markup inside `#root`.
    pub fn inner_html(&self) -> String {
        self.document.inner_html(self.root)
    }

    pub fn outer_html(&self) -> String {
        self.document.outer_html(self.root)
    }

    pub fn document(&self) -> &Rc<MemoryDocument> {
        &self.document
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn runtime(&self) -> Runtime {
        self.runtime.runtime()
    }

    pub fn std_runtime(&self) -> &StdRuntime {
        &self.runtime
    }

    /// The active mount, if content has been installed.
    pub fn mounted(&self) -> Option<&Mount> {
        self.mount.as_ref()
    }

    /// Tear down the mounted tree. Does nothing when nothing is mounted.
    pub fn unmount(&mut self) -> Result<(), RuntimeError> {
        match self.mount.take() {
            Some(mount) => mount.unmount(),
            None => Ok(()),
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

fn add_container(document: &MemoryDocument, id: &str) -> NodeId {
    let body = document.body();
    let node = match document.create_element("div") {
        Ok(node) => node,
        Err(err) => panic!("memory document rejected a div: {err}"),
    };
    if let Err(err) = document
        .set_attribute(node, "id", id)
        .and_then(|()| document.append_child(body, node))
    {
        panic!("could not attach #{id}: {err}");
    }
    node
}

/// Convenience helper for tests that only need temporary access to a
/// [`TestHarness`].
pub fn run_test_harness<R>(f: impl FnOnce(&mut TestHarness) -> R) -> R {
    let mut harness = TestHarness::new();
    f(&mut harness)
}

pub mod prelude {
    pub use crate::{run_test_harness, TestHarness};
    pub use sprig_core::{
        create_context, deps, h, Context, Deps, EffectPhase, Element, Event, NodeRef,
        RuntimeError, Scope, Setter,
    };
}
