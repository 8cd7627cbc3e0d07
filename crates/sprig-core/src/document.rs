//! The document collaborator the reconciler renders into.
//!
//! The runtime never touches a concrete DOM. Every element, text node and
//! listener is created through [`Document`], and nodes are referred to by the
//! [`NodeId`] handles the document hands out.

use std::fmt;
use std::rc::Rc;

use crate::NodeId;

/// Value assigned to a tag property.
#[derive(Clone)]
pub enum PropValue {
    Text(Rc<str>),
    Bool(bool),
    Number(f64),
    Handler(EventHandler),
}

impl PropValue {
    /// String form used when property assignment is rejected and the value
    /// falls back to an attribute.
    pub fn to_attribute(&self) -> String {
        match self {
            PropValue::Text(text) => text.to_string(),
            PropValue::Bool(value) => value.to_string(),
            PropValue::Number(value) => value.to_string(),
            PropValue::Handler(_) => String::new(),
        }
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Text(text) => f.debug_tuple("Text").field(text).finish(),
            PropValue::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
            PropValue::Number(value) => f.debug_tuple("Number").field(value).finish(),
            PropValue::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropValue::Text(a), PropValue::Text(b)) => a == b,
            (PropValue::Bool(a), PropValue::Bool(b)) => a == b,
            (PropValue::Number(a), PropValue::Number(b)) => a == b,
            (PropValue::Handler(a), PropValue::Handler(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Text(Rc::from(value))
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Text(Rc::from(value))
    }
}

impl From<Rc<str>> for PropValue {
    fn from(value: Rc<str>) -> Self {
        PropValue::Text(value)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<EventHandler> for PropValue {
    fn from(value: EventHandler) -> Self {
        PropValue::Handler(value)
    }
}

macro_rules! number_prop {
    ($($ty:ty),*) => {
        $(impl From<$ty> for PropValue {
            fn from(value: $ty) -> Self {
                PropValue::Number(value as f64)
            }
        })*
    };
}

number_prop!(i32, i64, u32, u64, usize, f32, f64);

/// Event delivered to listeners registered through [`Document::add_event_listener`].
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub kind: String,
    /// Node the event was dispatched on.
    pub target: NodeId,
    /// Current value of the target for input-like elements.
    pub value: Option<String>,
}

impl Event {
    pub fn new(kind: impl Into<String>, target: NodeId) -> Self {
        Self {
            kind: kind.into(),
            target,
            value: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// Shared listener callback.
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn(&Event)>);

impl EventHandler {
    pub fn new(handler: impl Fn(&Event) + 'static) -> Self {
        Self(Rc::new(handler))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventHandler(..)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    MissingNode(NodeId),
    NotAnElement(NodeId),
    NotAChild { parent: NodeId, child: NodeId },
    InvalidProperty(String),
    NoMatch(String),
    Host(String),
}

impl fmt::Display for DomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomError::MissingNode(id) => write!(f, "node {id} missing"),
            DomError::NotAnElement(id) => write!(f, "node {id} is not an element"),
            DomError::NotAChild { parent, child } => {
                write!(f, "node {child} is not a child of {parent}")
            }
            DomError::InvalidProperty(name) => write!(f, "cannot assign property {name}"),
            DomError::NoMatch(selector) => write!(f, "no node matches {selector}"),
            DomError::Host(message) => write!(f, "host document error: {message}"),
        }
    }
}

impl std::error::Error for DomError {}

/// A DOM-like tree the runtime mutates.
///
/// Methods take `&self`: listeners fire while the document is shared with
/// the mounted tree, so implementations keep their state behind interior
/// mutability.
pub trait Document {
    fn create_element(&self, tag: &str) -> Result<NodeId, DomError>;

    fn create_text(&self, text: &str) -> NodeId;

    /// Assigns a property directly. An error makes the runtime retry the
    /// value through [`Document::set_attribute`].
    fn set_property(&self, node: NodeId, name: &str, value: &PropValue) -> Result<(), DomError>;

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), DomError>;

    fn add_event_listener(
        &self,
        node: NodeId,
        event: &str,
        handler: EventHandler,
    ) -> Result<(), DomError>;

    fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError>;

    fn insert_before(&self, parent: NodeId, child: NodeId, reference: NodeId)
        -> Result<(), DomError>;

    fn remove_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError>;

    fn clear_children(&self, parent: NodeId) -> Result<(), DomError>;

    fn parent_of(&self, node: NodeId) -> Option<NodeId>;

    fn query_selector(&self, selector: &str) -> Option<NodeId>;

    /// Called once the runtime has discarded `node` and everything below it.
    fn release(&self, _node: NodeId) {}
}

/// Detaches every node in `nodes` that still has a parent.
pub(crate) fn detach_all(document: &dyn Document, nodes: &[NodeId]) -> Result<(), DomError> {
    for &node in nodes {
        if let Some(parent) = document.parent_of(node) {
            document.remove_child(parent, node)?;
        }
    }
    Ok(())
}
