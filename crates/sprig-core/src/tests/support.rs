use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::{
    mount_with_options, Document, Element, FlushScheduler, FlushTask, MemoryDocument, Mount,
    MountOptions, NodeId, Runtime, RuntimeError,
};

/// Keeps every scheduled task, superseded ones included, so tests can check
/// that stale flushes do nothing.
#[derive(Default)]
pub(crate) struct QueueScheduler {
    tasks: RefCell<VecDeque<FlushTask>>,
    scheduled: Cell<usize>,
}

impl QueueScheduler {
    pub(crate) fn scheduled(&self) -> usize {
        self.scheduled.get()
    }

    pub(crate) fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub(crate) fn run_all(&self) -> Result<usize, RuntimeError> {
        let mut ran = 0;
        loop {
            let task = self.tasks.borrow_mut().pop_front();
            let Some(task) = task else {
                return Ok(ran);
            };
            task.run()?;
            ran += 1;
        }
    }
}

impl FlushScheduler for QueueScheduler {
    fn schedule(&self, task: FlushTask) {
        self.scheduled.set(self.scheduled.get() + 1);
        self.tasks.borrow_mut().push_back(task);
    }
}

pub(crate) struct Fixture {
    pub(crate) document: Rc<MemoryDocument>,
    pub(crate) scheduler: Rc<QueueScheduler>,
    pub(crate) runtime: Runtime,
    pub(crate) root: NodeId,
    pub(crate) mount: Mount,
}

impl Fixture {
    pub(crate) fn html(&self) -> String {
        self.document.inner_html(self.root)
    }

    pub(crate) fn flush(&self) {
        self.scheduler.run_all().expect("flush");
    }

    pub(crate) fn find(&self, selector: &str) -> NodeId {
        self.document
            .query_selector(selector)
            .unwrap_or_else(|| panic!("nothing matches {selector}"))
    }

    pub(crate) fn click(&self, selector: &str) {
        self.document.click(self.find(selector)).expect("click");
    }
}

pub(crate) fn document_with_root() -> (Rc<MemoryDocument>, NodeId) {
    let document = Rc::new(MemoryDocument::new());
    let root = document.create_element("div").expect("root element");
    document.set_attribute(root, "id", "root").expect("root id");
    document.append_child(document.body(), root).expect("attach root");
    (document, root)
}

pub(crate) fn mount_fixture(element: impl Into<Element>) -> Fixture {
    mount_fixture_with(element, MountOptions::default())
}

pub(crate) fn mount_fixture_with(element: impl Into<Element>, options: MountOptions) -> Fixture {
    let (document, root) = document_with_root();
    let scheduler = Rc::new(QueueScheduler::default());
    let runtime = Runtime::new(scheduler.clone());
    let mount = mount_with_options(element, root, document.clone(), runtime.clone(), options)
        .expect("mount");
    Fixture {
        document,
        scheduler,
        runtime,
        root,
        mount,
    }
}
