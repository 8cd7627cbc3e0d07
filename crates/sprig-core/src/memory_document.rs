use std::cell::RefCell;
use std::fmt::Write as _;

use crate::collections::map::HashMap;
use crate::document::{Document, DomError, Event, EventHandler, PropValue};
use crate::NodeId;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

enum NodeKind {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
        properties: HashMap<String, PropValue>,
    },
    Text(String),
}

struct MemoryNode {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    listeners: Vec<(String, EventHandler)>,
}

impl MemoryNode {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            listeners: Vec::new(),
        }
    }
}

/// In-memory [`Document`] used by tests and native hosts.
///
/// Node `0` is a `<body>` element created up front. Property assignment
/// reflects onto attributes (`className` becomes `class`, `htmlFor` becomes
/// `for`) except for `value` and `checked`, which stay properties the way
/// form controls behave in a browser. Names that are not identifiers, like
/// `data-id` or `aria-label`, are rejected so the runtime falls back to
/// [`Document::set_attribute`].
///
/// Released node ids are recycled by later `create_*` calls.
pub struct MemoryDocument {
    nodes: RefCell<Vec<Option<MemoryNode>>>,
    free: RefCell<Vec<NodeId>>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    pub fn new() -> Self {
        let body = MemoryNode::new(NodeKind::Element {
            tag: "body".to_string(),
            attributes: Vec::new(),
            properties: HashMap::new(),
        });
        Self {
            nodes: RefCell::new(vec![Some(body)]),
            free: RefCell::new(Vec::new()),
        }
    }

    pub fn body(&self) -> NodeId {
        0
    }

    /// Number of live nodes, the body included.
    pub fn len(&self) -> usize {
        self.nodes.borrow().iter().filter(|node| node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of node slots allocated, live or free.
    pub fn slot_count(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        matches!(self.nodes.borrow().get(node), Some(Some(_)))
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.with_node(node, |n| n.children.clone()).unwrap_or_default()
    }

    pub fn tag_name(&self, node: NodeId) -> Option<String> {
        self.with_node(node, |n| match &n.kind {
            NodeKind::Element { tag, .. } => Some(tag.clone()),
            NodeKind::Text(_) => None,
        })
        .flatten()
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.with_node(node, |n| match &n.kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.clone()),
            NodeKind::Text(_) => None,
        })
        .flatten()
    }

    pub fn property(&self, node: NodeId, name: &str) -> Option<PropValue> {
        self.with_node(node, |n| match &n.kind {
            NodeKind::Element { properties, .. } => properties.get(name).cloned(),
            NodeKind::Text(_) => None,
        })
        .flatten()
    }

    /// The `value` property rendered as text, empty when unset.
    pub fn value(&self, node: NodeId) -> String {
        self.property(node, "value")
            .map(|value| value.to_attribute())
            .unwrap_or_default()
    }

    pub fn text_content(&self, node: NodeId) -> String {
        let nodes = self.nodes.borrow();
        let mut out = String::new();
        collect_text(&nodes, node, &mut out);
        out
    }

    pub fn inner_html(&self, node: NodeId) -> String {
        let nodes = self.nodes.borrow();
        let mut out = String::new();
        if let Some(Some(n)) = nodes.get(node) {
            for &child in &n.children {
                serialize(&nodes, child, &mut out);
            }
        }
        out
    }

    pub fn outer_html(&self, node: NodeId) -> String {
        let nodes = self.nodes.borrow();
        let mut out = String::new();
        serialize(&nodes, node, &mut out);
        out
    }

    /// Every element matching `selector`, in document order.
    pub fn query_selector_all(&self, selector: &str) -> Vec<NodeId> {
        let Some(selector) = Selector::parse(selector) else {
            return Vec::new();
        };
        let nodes = self.nodes.borrow();
        let mut found = Vec::new();
        let mut stack = vec![self.body()];
        while let Some(id) = stack.pop() {
            if selector.matches(&nodes, id) {
                found.push(id);
            }
            if let Some(Some(node)) = nodes.get(id) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        found
    }

    /// Delivers `event` to listeners on its target, then bubbles to each
    /// ancestor in turn.
    pub fn dispatch(&self, event: &Event) -> Result<(), DomError> {
        let handlers = {
            let nodes = self.nodes.borrow();
            if !matches!(nodes.get(event.target), Some(Some(_))) {
                return Err(DomError::MissingNode(event.target));
            }
            let mut handlers = Vec::new();
            let mut current = Some(event.target);
            while let Some(id) = current {
                let Some(Some(node)) = nodes.get(id) else {
                    break;
                };
                handlers.extend(
                    node.listeners
                        .iter()
                        .filter(|(kind, _)| *kind == event.kind)
                        .map(|(_, handler)| handler.clone()),
                );
                current = node.parent;
            }
            handlers
        };
        for handler in handlers {
            handler.call(event);
        }
        Ok(())
    }

    pub fn click(&self, node: NodeId) -> Result<(), DomError> {
        self.dispatch(&Event::new("click", node))
    }

    /// Simulates the user typing: stores `value` and fires `input`.
    pub fn set_value(&self, node: NodeId, value: &str) -> Result<(), DomError> {
        self.set_property(node, "value", &PropValue::from(value))?;
        self.dispatch(&Event::new("input", node).with_value(value))
    }

    fn with_node<R>(&self, node: NodeId, f: impl FnOnce(&MemoryNode) -> R) -> Option<R> {
        match self.nodes.borrow().get(node) {
            Some(Some(n)) => Some(f(n)),
            _ => None,
        }
    }

    fn with_node_mut<R>(
        &self,
        node: NodeId,
        f: impl FnOnce(&mut MemoryNode) -> R,
    ) -> Result<R, DomError> {
        match self.nodes.borrow_mut().get_mut(node) {
            Some(Some(n)) => Ok(f(n)),
            _ => Err(DomError::MissingNode(node)),
        }
    }

    fn with_element_mut<R>(
        &self,
        node: NodeId,
        f: impl FnOnce(&mut Vec<(String, String)>, &mut HashMap<String, PropValue>) -> R,
    ) -> Result<R, DomError> {
        self.with_node_mut(node, |n| match &mut n.kind {
            NodeKind::Element {
                attributes,
                properties,
                ..
            } => Ok(f(attributes, properties)),
            NodeKind::Text(_) => Err(DomError::NotAnElement(node)),
        })?
    }

    fn push(&self, node: MemoryNode) -> NodeId {
        let mut nodes = self.nodes.borrow_mut();
        if let Some(id) = self.free.borrow_mut().pop() {
            nodes[id] = Some(node);
            return id;
        }
        nodes.push(Some(node));
        nodes.len() - 1
    }

    fn unlink(nodes: &mut [Option<MemoryNode>], child: NodeId) {
        let parent = match nodes.get_mut(child) {
            Some(Some(node)) => node.parent.take(),
            _ => None,
        };
        if let Some(Some(parent)) = parent.and_then(|p| nodes.get_mut(p)) {
            parent.children.retain(|&c| c != child);
        }
    }

    fn link(
        &self,
        parent: NodeId,
        child: NodeId,
        position: impl FnOnce(&[NodeId]) -> Result<usize, DomError>,
    ) -> Result<(), DomError> {
        let mut nodes = self.nodes.borrow_mut();
        match nodes.get(parent) {
            Some(Some(MemoryNode {
                kind: NodeKind::Element { .. },
                ..
            })) => {}
            Some(Some(_)) => return Err(DomError::NotAnElement(parent)),
            _ => return Err(DomError::MissingNode(parent)),
        }
        if !matches!(nodes.get(child), Some(Some(_))) {
            return Err(DomError::MissingNode(child));
        }
        Self::unlink(&mut nodes, child);
        if let Some(Some(node)) = nodes.get_mut(parent) {
            let index = position(&node.children)?;
            node.children.insert(index, child);
        }
        if let Some(Some(node)) = nodes.get_mut(child) {
            node.parent = Some(parent);
        }
        Ok(())
    }
}

fn set_attribute_value(attributes: &mut Vec<(String, String)>, name: &str, value: String) {
    match attributes.iter_mut().find(|(key, _)| key == name) {
        Some((_, existing)) => *existing = value,
        None => attributes.push((name.to_string(), value)),
    }
}

fn reflected_attribute(property: &str) -> Option<&str> {
    match property {
        "value" | "checked" => None,
        "className" => Some("class"),
        "htmlFor" => Some("for"),
        other => Some(other),
    }
}

impl Document for MemoryDocument {
    fn create_element(&self, tag: &str) -> Result<NodeId, DomError> {
        if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(DomError::Host(format!("invalid tag name {tag:?}")));
        }
        Ok(self.push(MemoryNode::new(NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
            properties: HashMap::new(),
        })))
    }

    fn create_text(&self, text: &str) -> NodeId {
        self.push(MemoryNode::new(NodeKind::Text(text.to_string())))
    }

    fn set_property(&self, node: NodeId, name: &str, value: &PropValue) -> Result<(), DomError> {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(DomError::InvalidProperty(name.to_string()));
        }
        self.with_element_mut(node, |attributes, properties| {
            if let Some(attribute) = reflected_attribute(name) {
                match value {
                    PropValue::Bool(false) => attributes.retain(|(key, _)| key != attribute),
                    PropValue::Bool(true) => {
                        set_attribute_value(attributes, attribute, String::new())
                    }
                    other => set_attribute_value(attributes, attribute, other.to_attribute()),
                }
            }
            properties.insert(name.to_string(), value.clone());
        })
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        self.with_element_mut(node, |attributes, _| {
            set_attribute_value(attributes, name, value.to_string())
        })
    }

    fn add_event_listener(
        &self,
        node: NodeId,
        event: &str,
        handler: EventHandler,
    ) -> Result<(), DomError> {
        self.with_node_mut(node, |n| n.listeners.push((event.to_string(), handler)))
    }

    fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.link(parent, child, |children| Ok(children.len()))
    }

    fn insert_before(
        &self,
        parent: NodeId,
        child: NodeId,
        reference: NodeId,
    ) -> Result<(), DomError> {
        if self.parent_of(reference) != Some(parent) {
            return Err(DomError::NotAChild {
                parent,
                child: reference,
            });
        }
        self.link(parent, child, |children| {
            children
                .iter()
                .position(|&c| c == reference)
                .ok_or(DomError::NotAChild {
                    parent,
                    child: reference,
                })
        })
    }

    fn remove_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let mut nodes = self.nodes.borrow_mut();
        match nodes.get(child) {
            Some(Some(node)) if node.parent == Some(parent) => {}
            Some(Some(_)) => return Err(DomError::NotAChild { parent, child }),
            _ => return Err(DomError::MissingNode(child)),
        }
        Self::unlink(&mut nodes, child);
        Ok(())
    }

    fn clear_children(&self, parent: NodeId) -> Result<(), DomError> {
        let mut nodes = self.nodes.borrow_mut();
        let children = match nodes.get_mut(parent) {
            Some(Some(node)) => std::mem::take(&mut node.children),
            _ => return Err(DomError::MissingNode(parent)),
        };
        for child in children {
            if let Some(Some(node)) = nodes.get_mut(child) {
                node.parent = None;
            }
        }
        Ok(())
    }

    fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.with_node(node, |n| n.parent).flatten()
    }

    fn query_selector(&self, selector: &str) -> Option<NodeId> {
        self.query_selector_all(selector).into_iter().next()
    }

    fn release(&self, node: NodeId) {
        if node == self.body() {
            return;
        }
        let mut nodes = self.nodes.borrow_mut();
        let mut free = self.free.borrow_mut();
        Self::unlink(&mut nodes, node);
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if let Some(slot) = nodes.get_mut(id) {
                if let Some(removed) = slot.take() {
                    stack.extend(removed.children);
                    free.push(id);
                }
            }
        }
    }
}

fn collect_text(nodes: &[Option<MemoryNode>], id: NodeId, out: &mut String) {
    let Some(Some(node)) = nodes.get(id) else {
        return;
    };
    match &node.kind {
        NodeKind::Text(text) => out.push_str(text),
        NodeKind::Element { .. } => {
            for &child in &node.children {
                collect_text(nodes, child, out);
            }
        }
    }
}

fn escape(text: &str, out: &mut String, attribute: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

fn serialize(nodes: &[Option<MemoryNode>], id: NodeId, out: &mut String) {
    let Some(Some(node)) = nodes.get(id) else {
        return;
    };
    match &node.kind {
        NodeKind::Text(text) => escape(text, out, false),
        NodeKind::Element {
            tag, attributes, ..
        } => {
            let _ = write!(out, "<{tag}");
            for (name, value) in attributes {
                let _ = write!(out, " {name}=\"");
                escape(value, out, true);
                out.push('"');
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&tag.as_str()) {
                return;
            }
            for &child in &node.children {
                serialize(nodes, child, out);
            }
            let _ = write!(out, "</{tag}>");
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<(String, Option<String>)>,
}

impl Compound {
    fn parse(source: &str) -> Option<Self> {
        let mut compound = Compound::default();
        let mut rest = source;
        let ident_end = |s: &str| {
            s.find(|c: char| matches!(c, '#' | '.' | '['))
                .unwrap_or(s.len())
        };
        let end = ident_end(rest);
        if end > 0 {
            let tag = &rest[..end];
            if tag != "*" {
                compound.tag = Some(tag.to_ascii_lowercase());
            }
            rest = &rest[end..];
        }
        while let Some(marker) = rest.chars().next() {
            rest = &rest[marker.len_utf8()..];
            match marker {
                '#' | '.' => {
                    let end = ident_end(rest);
                    if end == 0 {
                        return None;
                    }
                    let name = rest[..end].to_string();
                    if marker == '#' {
                        compound.id = Some(name);
                    } else {
                        compound.classes.push(name);
                    }
                    rest = &rest[end..];
                }
                '[' => {
                    let close = rest.find(']')?;
                    let body = &rest[..close];
                    rest = &rest[close + 1..];
                    match body.split_once('=') {
                        Some((name, value)) => {
                            let value = value.trim().trim_matches(|c| c == '\'' || c == '"');
                            compound
                                .attributes
                                .push((name.trim().to_string(), Some(value.to_string())));
                        }
                        None => compound.attributes.push((body.trim().to_string(), None)),
                    }
                }
                _ => return None,
            }
        }
        Some(compound)
    }

    fn matches(&self, node: &MemoryNode) -> bool {
        let NodeKind::Element {
            tag, attributes, ..
        } = &node.kind
        else {
            return false;
        };
        let attribute = |name: &str| {
            attributes
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str())
        };
        if self.tag.as_ref().is_some_and(|expected| expected != tag) {
            return false;
        }
        if let Some(id) = &self.id {
            if attribute("id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let classes: Vec<&str> = attribute("class")
                .map(|value| value.split_whitespace().collect())
                .unwrap_or_default();
            if !self.classes.iter().all(|c| classes.contains(&c.as_str())) {
                return false;
            }
        }
        self.attributes.iter().all(|(name, expected)| {
            match (attribute(name), expected) {
                (Some(actual), Some(expected)) => actual == expected,
                (Some(_), None) => true,
                (None, _) => false,
            }
        })
    }
}

/// Compound selectors joined by descendant or child combinators.
struct Selector {
    // Rightmost compound first, each paired with the combinator that links it
    // to the compound on its left.
    parts: Vec<(Compound, Combinator)>,
}

impl Selector {
    fn parse(source: &str) -> Option<Self> {
        let spaced = source.replace('>', " > ");
        let mut parts = Vec::new();
        let mut pending = Combinator::Descendant;
        for token in spaced.split_whitespace() {
            if token == ">" {
                pending = Combinator::Child;
                continue;
            }
            parts.push((Compound::parse(token)?, pending));
            pending = Combinator::Descendant;
        }
        if parts.is_empty() {
            return None;
        }
        parts.reverse();
        Some(Self { parts })
    }

    fn matches(&self, nodes: &[Option<MemoryNode>], id: NodeId) -> bool {
        self.match_from(nodes, id, 0)
    }

    fn match_from(&self, nodes: &[Option<MemoryNode>], id: NodeId, index: usize) -> bool {
        let Some(Some(node)) = nodes.get(id) else {
            return false;
        };
        let (compound, combinator) = &self.parts[index];
        if !compound.matches(node) {
            return false;
        }
        if index + 1 == self.parts.len() {
            return true;
        }
        let mut ancestor = node.parent;
        while let Some(parent) = ancestor {
            if self.match_from(nodes, parent, index + 1) {
                return true;
            }
            if *combinator == Combinator::Child {
                return false;
            }
            ancestor = match nodes.get(parent) {
                Some(Some(n)) => n.parent,
                _ => None,
            };
        }
        false
    }
}
