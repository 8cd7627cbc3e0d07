use std::cell::RefCell;
use std::collections::HashMap;

use sprig_core::{Document, DomError, Event, EventHandler, NodeId, PropValue};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{HtmlInputElement, HtmlSelectElement, HtmlTextAreaElement, Node};

/// Expando property carrying a node's handle, so parents and event targets
/// found through the browser map back to [`NodeId`]s.
const NODE_ID_KEY: &str = "__sprigNode";

type Listener = Closure<dyn FnMut(web_sys::Event)>;

/// Slot storage whose freed ids are handed out again.
struct Arena<T> {
    slots: Vec<Option<T>>,
    free: Vec<NodeId>,
}

impl<T> Arena<T> {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    fn get(&self, id: NodeId) -> Option<&T> {
        self.slots.get(id).and_then(Option::as_ref)
    }

    /// The id the next [`Arena::insert`] will use.
    fn next_id(&self) -> NodeId {
        self.free.last().copied().unwrap_or(self.slots.len())
    }

    fn insert(&mut self, value: T) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.slots[id] = Some(value);
                id
            }
            None => {
                self.slots.push(Some(value));
                self.slots.len() - 1
            }
        }
    }

    fn remove(&mut self, id: NodeId) -> Option<T> {
        let removed = self.slots.get_mut(id)?.take()?;
        self.free.push(id);
        Some(removed)
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }
}

/// [`Document`] backed by the browser DOM.
///
/// Nodes are registered in an arena the first time the runtime sees them,
/// whether it created them or found them through a selector. Listener
/// closures live until the node is released.
pub struct WebDocument {
    document: web_sys::Document,
    nodes: RefCell<Arena<Node>>,
    listeners: RefCell<HashMap<NodeId, Vec<Listener>>>,
}

impl WebDocument {
    pub fn new() -> Result<Self, DomError> {
        let document = web_sys::window()
            .and_then(|window| window.document())
            .ok_or_else(|| DomError::Host("no global document".to_string()))?;
        Ok(Self::from_document(document))
    }

    pub fn from_document(document: web_sys::Document) -> Self {
        Self {
            document,
            nodes: RefCell::new(Arena::new()),
            listeners: RefCell::new(HashMap::new()),
        }
    }

    /// The browser node behind `id`.
    pub fn node(&self, id: NodeId) -> Option<Node> {
        self.nodes.borrow().get(id).cloned()
    }

    /// Number of node slots allocated, live or free.
    pub fn slot_count(&self) -> usize {
        self.nodes.borrow().capacity()
    }

    fn require(&self, id: NodeId) -> Result<Node, DomError> {
        self.node(id).ok_or(DomError::MissingNode(id))
    }

    fn register(&self, node: Node) -> NodeId {
        if let Some(id) = self.id_of(&node) {
            return id;
        }
        let mut nodes = self.nodes.borrow_mut();
        let id = nodes.next_id();
        if let Err(err) = js_sys::Reflect::set(
            &node,
            &JsValue::from_str(NODE_ID_KEY),
            &JsValue::from_f64(id as f64),
        ) {
            log::warn!("could not tag node {id}: {err:?}");
        }
        nodes.insert(node)
    }

    fn id_of(&self, node: &Node) -> Option<NodeId> {
        let id = tagged_id(node)?;
        let nodes = self.nodes.borrow();
        match nodes.get(id) {
            Some(known) if known.is_same_node(Some(node)) => Some(id),
            _ => None,
        }
    }
}

fn tagged_id(node: &JsValue) -> Option<NodeId> {
    js_sys::Reflect::get(node, &JsValue::from_str(NODE_ID_KEY))
        .ok()?
        .as_f64()
        .map(|id| id as NodeId)
}

fn host_error(err: JsValue) -> DomError {
    DomError::Host(format!("{err:?}"))
}

fn is_property_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn to_js(value: &PropValue) -> Option<JsValue> {
    match value {
        PropValue::Text(text) => Some(JsValue::from_str(text)),
        PropValue::Bool(value) => Some(JsValue::from_bool(*value)),
        PropValue::Number(value) => Some(JsValue::from_f64(*value)),
        PropValue::Handler(_) => None,
    }
}

/// Current value of a form control, if the target is one.
fn control_value(target: &web_sys::EventTarget) -> Option<String> {
    if let Some(input) = target.dyn_ref::<HtmlInputElement>() {
        return Some(input.value());
    }
    if let Some(area) = target.dyn_ref::<HtmlTextAreaElement>() {
        return Some(area.value());
    }
    target.dyn_ref::<HtmlSelectElement>().map(HtmlSelectElement::value)
}

impl Document for WebDocument {
    fn create_element(&self, tag: &str) -> Result<NodeId, DomError> {
        let element = self.document.create_element(tag).map_err(host_error)?;
        Ok(self.register(element.into()))
    }

    fn create_text(&self, text: &str) -> NodeId {
        self.register(self.document.create_text_node(text).into())
    }

    fn set_property(&self, node: NodeId, name: &str, value: &PropValue) -> Result<(), DomError> {
        if !is_property_name(name) {
            return Err(DomError::InvalidProperty(name.to_string()));
        }
        let target = self.require(node)?;
        let value = to_js(value).ok_or_else(|| DomError::InvalidProperty(name.to_string()))?;
        match js_sys::Reflect::set(&target, &JsValue::from_str(name), &value) {
            Ok(true) => Ok(()),
            Ok(false) => Err(DomError::InvalidProperty(name.to_string())),
            Err(err) => Err(host_error(err)),
        }
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let element = self
            .require(node)?
            .dyn_into::<web_sys::Element>()
            .map_err(|_| DomError::NotAnElement(node))?;
        element.set_attribute(name, value).map_err(host_error)
    }

    fn add_event_listener(
        &self,
        node: NodeId,
        event: &str,
        handler: EventHandler,
    ) -> Result<(), DomError> {
        let target = self.require(node)?;
        let kind = event.to_string();
        let closure = Closure::wrap(Box::new(move |raw: web_sys::Event| {
            let origin = raw.target();
            let target = origin
                .as_ref()
                .and_then(|origin| tagged_id(origin))
                .unwrap_or(node);
            let mut event = Event::new(kind.clone(), target);
            event.value = origin.as_ref().and_then(control_value);
            handler.call(&event);
        }) as Box<dyn FnMut(web_sys::Event)>);
        target
            .add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())
            .map_err(host_error)?;
        self.listeners
            .borrow_mut()
            .entry(node)
            .or_default()
            .push(closure);
        Ok(())
    }

    fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.require(parent)?
            .append_child(&self.require(child)?)
            .map(|_| ())
            .map_err(host_error)
    }

    fn insert_before(
        &self,
        parent: NodeId,
        child: NodeId,
        reference: NodeId,
    ) -> Result<(), DomError> {
        let parent_node = self.require(parent)?;
        let reference_node = self.require(reference)?;
        if !parent_node.is_same_node(reference_node.parent_node().as_ref()) {
            return Err(DomError::NotAChild {
                parent,
                child: reference,
            });
        }
        parent_node
            .insert_before(&self.require(child)?, Some(&reference_node))
            .map(|_| ())
            .map_err(host_error)
    }

    fn remove_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.require(parent)?
            .remove_child(&self.require(child)?)
            .map(|_| ())
            .map_err(|_| DomError::NotAChild { parent, child })
    }

    fn clear_children(&self, parent: NodeId) -> Result<(), DomError> {
        let parent = self.require(parent)?;
        while let Some(child) = parent.first_child() {
            parent.remove_child(&child).map_err(host_error)?;
        }
        Ok(())
    }

    fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.node(node)?.parent_node()?;
        self.id_of(&parent)
    }

    fn query_selector(&self, selector: &str) -> Option<NodeId> {
        match self.document.query_selector(selector) {
            Ok(found) => found.map(|element| self.register(element.into())),
            Err(err) => {
                log::warn!("invalid selector {selector}: {err:?}");
                None
            }
        }
    }

    fn release(&self, node: NodeId) {
        let Some(root) = self.node(node) else {
            return;
        };
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            if let Some(id) = self.id_of(&current) {
                self.nodes.borrow_mut().remove(id);
                self.listeners.borrow_mut().remove(&id);
            }
            let children = current.child_nodes();
            for index in 0..children.length() {
                if let Some(child) = children.item(index) {
                    stack.push(child);
                }
            }
        }
    }
}
