//! The instance tree: one persistent record per live tag, fragment and
//! component occurrence.
//!
//! A render pass walks an [`Element`] tree and, for every child position,
//! either reuses the record stored at the same slot (explicit key or
//! position among unkeyed siblings) with the same identity, or tears the old
//! record down and creates a fresh one. Records not revisited during their
//! parent's pass are pruned when the parent exits.

use std::fmt;
use std::mem;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::collections::map::{HashMap, HashSet};
use crate::context::ContextMap;
use crate::document::{detach_all, Document, DomError, PropValue};
use crate::element::{
    Children, ComponentElement, ComponentId, Element, FragmentElement, RenderProp, TagElement,
};
use crate::error::RuntimeError;
use crate::hooks::{Action, HookStore, PortalTarget, RenderTrigger};
use crate::runtime::{MountId, RuntimeHandle};
use crate::{Key, NodeId};

pub(crate) type InstanceId = u64;

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Instance ids are unique across every tree in the process, so a setter
/// outliving its tree can never address a record of another one.
fn next_instance_id() -> InstanceId {
    NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed)
}

/// Position of a record among its siblings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum SlotKey {
    Keyed(Key),
    Position(usize),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Identity {
    Root,
    Tag(Rc<str>),
    Fragment,
    Component(ComponentId),
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Root => f.write_str("#root"),
            Identity::Tag(tag) => write!(f, "<{tag}>"),
            Identity::Fragment => f.write_str("#fragment"),
            Identity::Component(id) => f.write_str(id.name()),
        }
    }
}

pub(crate) struct Instance {
    key: SlotKey,
    identity: Identity,
    parent: Option<InstanceId>,
    depth: usize,
    children: IndexMap<SlotKey, InstanceId>,
    child_cursor: usize,
    touched: HashSet<SlotKey>,
    pub(crate) hooks: HookStore,
    last: Option<Rc<ComponentElement>>,
    /// Nodes this record contributes at its logical position.
    rendered: Vec<NodeId>,
    /// Nodes a portal record attached under its target.
    portal_nodes: Vec<NodeId>,
    pub(crate) context: ContextMap,
}

impl Instance {
    fn next_position(&mut self) -> SlotKey {
        let position = self.child_cursor;
        self.child_cursor += 1;
        SlotKey::Position(position)
    }
}

/// Portal moves recorded during a pass and applied to the live document
/// once the pass has produced all of its output.
#[derive(Clone, Copy, Debug)]
enum PortalMove {
    Detach(NodeId),
    Attach { container: NodeId, node: NodeId },
}

pub(crate) struct InstanceTree {
    instances: HashMap<InstanceId, Instance>,
    root: InstanceId,
    mount: MountId,
    runtime: RuntimeHandle,
    pending: Vec<Action>,
    released: Vec<NodeId>,
    portal_moves: Vec<PortalMove>,
    visited: HashSet<InstanceId>,
}

impl InstanceTree {
    pub(crate) fn new(runtime: RuntimeHandle, mount: MountId) -> Self {
        let mut tree = Self {
            instances: HashMap::new(),
            root: 0,
            mount,
            runtime,
            pending: Vec::new(),
            released: Vec::new(),
            portal_moves: Vec::new(),
            visited: HashSet::new(),
        };
        tree.root = tree.insert(Identity::Root, SlotKey::Position(0), None);
        tree
    }

    pub(crate) fn len(&self) -> usize {
        self.instances.len()
    }

    pub(crate) fn contains(&self, id: InstanceId) -> bool {
        self.instances.contains_key(&id)
    }

    pub(crate) fn take_pending(&mut self) -> Vec<Action> {
        mem::take(&mut self.pending)
    }

    pub(crate) fn take_released(&mut self) -> Vec<NodeId> {
        mem::take(&mut self.released)
    }

    #[cfg(test)]
    pub(crate) fn visited_len(&self) -> usize {
        self.visited.len()
    }

    /// Applies the portal moves queued by the pass that just finished.
    fn commit_portals(&mut self, document: &dyn Document) -> Result<(), DomError> {
        for portal_move in mem::take(&mut self.portal_moves) {
            match portal_move {
                PortalMove::Detach(node) => detach_all(document, &[node])?,
                PortalMove::Attach { container, node } => document.append_child(container, node)?,
            }
        }
        Ok(())
    }

    fn record(&self, id: InstanceId) -> &Instance {
        self.instances
            .get(&id)
            .expect("instance record missing from the tree")
    }

    fn record_mut(&mut self, id: InstanceId) -> &mut Instance {
        self.instances
            .get_mut(&id)
            .expect("instance record missing from the tree")
    }

    fn insert(&mut self, identity: Identity, key: SlotKey, parent: Option<InstanceId>) -> InstanceId {
        let id = next_instance_id();
        let (depth, context) = match parent.and_then(|parent| self.instances.get(&parent)) {
            Some(parent) => (parent.depth + 1, parent.context.clone()),
            None => (0, ContextMap::new()),
        };
        log::trace!("created instance {id} for {identity} at {key:?}");
        self.instances.insert(
            id,
            Instance {
                key,
                identity,
                parent,
                depth,
                children: IndexMap::new(),
                child_cursor: 0,
                touched: HashSet::new(),
                hooks: HookStore::new(RenderTrigger::new(self.runtime.clone(), self.mount, id)),
                last: None,
                rendered: Vec::new(),
                portal_nodes: Vec::new(),
                context,
            },
        );
        id
    }

    /// Resets per-pass bookkeeping and refreshes the context snapshot from
    /// the parent, so values written above reach reused descendants.
    fn begin_pass(&mut self, id: InstanceId) {
        let inherited = self
            .record(id)
            .parent
            .map(|parent| self.record(parent).context.clone());
        let record = self.record_mut(id);
        if let Some(context) = inherited {
            record.context = context;
        }
        record.touched.clear();
        record.child_cursor = 0;
        record.hooks.begin();
        self.visited.insert(id);
    }

    /// Finds or creates the record for the next child of `parent`.
    fn enter(&mut self, parent: InstanceId, identity: Identity, key: Option<Key>) -> InstanceId {
        let (slot, existing) = {
            let record = self.record_mut(parent);
            let mut slot = match key {
                Some(key) => SlotKey::Keyed(key),
                None => record.next_position(),
            };
            if !record.touched.insert(slot) {
                log::warn!(
                    "duplicate key {slot:?} among children of {}; using its position instead",
                    record.identity
                );
                slot = record.next_position();
                record.touched.insert(slot);
            }
            (slot, record.children.get(&slot).copied())
        };
        let reusable = existing.filter(|child| {
            self.instances
                .get(child)
                .is_some_and(|record| record.identity == identity)
        });
        let id = match reusable {
            Some(id) => id,
            None => {
                if let Some(stale) = existing {
                    self.teardown(stale);
                }
                let id = self.insert(identity, slot, Some(parent));
                self.record_mut(parent).children.insert(slot, id);
                id
            }
        };
        self.begin_pass(id);
        id
    }

    /// Prunes children not revisited this pass and queues the record's
    /// after-render effects.
    fn exit(&mut self, id: InstanceId) {
        let stale: Vec<InstanceId> = {
            let Instance {
                children, touched, ..
            } = self.record_mut(id);
            let stale = children
                .iter()
                .filter(|(slot, _)| !touched.contains(*slot))
                .map(|(_, child)| *child)
                .collect();
            children.retain(|slot, _| touched.contains(slot));
            stale
        };
        for child in stale {
            self.teardown(child);
        }
        let effects = self.record_mut(id).hooks.take_after_render();
        self.pending.extend(effects);
    }

    /// Drops `id` and its subtree, children first, queueing unmount callbacks.
    fn teardown(&mut self, id: InstanceId) {
        let Some(mut record) = self.instances.remove(&id) else {
            return;
        };
        for (_, child) in record.children.drain(..) {
            self.teardown(child);
        }
        self.portal_moves
            .extend(record.portal_nodes.iter().map(|&node| PortalMove::Detach(node)));
        self.released.append(&mut record.portal_nodes);
        self.pending.extend(record.hooks.take_unmount());
        log::trace!(
            "tore down instance {id} ({} at {:?})",
            record.identity,
            record.key
        );
    }

    pub(crate) fn render_root(
        &mut self,
        document: &dyn Document,
        element: &Element,
    ) -> Result<Vec<NodeId>, RuntimeError> {
        let root = self.root;
        self.portal_moves.clear();
        self.begin_pass(root);
        let mut span = Vec::new();
        self.resolve_into(document, root, element, &mut span)?;
        self.exit(root);
        self.record_mut(root).rendered = span.clone();
        self.visited.clear();
        self.commit_portals(document)?;
        Ok(span)
    }

    /// Tears down everything below the root and returns the nodes that were
    /// mounted into the container.
    pub(crate) fn teardown_all(
        &mut self,
        document: &dyn Document,
    ) -> Result<Vec<NodeId>, RuntimeError> {
        let root = self.root;
        let (children, span) = {
            let record = self.record_mut(root);
            let children: Vec<InstanceId> = record.children.drain(..).map(|(_, id)| id).collect();
            (children, mem::take(&mut record.rendered))
        };
        for child in children {
            self.teardown(child);
        }
        self.commit_portals(document)?;
        Ok(span)
    }

    fn resolve_into(
        &mut self,
        document: &dyn Document,
        parent: InstanceId,
        element: &Element,
        out: &mut Vec<NodeId>,
    ) -> Result<(), RuntimeError> {
        match element {
            Element::Text(text) => out.push(document.create_text(text)),
            Element::Tag(tag) => {
                let node = self.render_tag(document, parent, tag)?;
                out.push(node);
            }
            Element::Fragment(fragment) => self.render_fragment(document, parent, fragment, out)?,
            Element::Component(component) => {
                let id = self.enter(parent, Identity::Component(component.identity), component.key);
                let span = self.render_component(document, id, Rc::clone(component))?;
                out.extend(span);
            }
        }
        Ok(())
    }

    fn render_tag(
        &mut self,
        document: &dyn Document,
        parent: InstanceId,
        tag: &TagElement,
    ) -> Result<NodeId, RuntimeError> {
        let id = self.enter(parent, Identity::Tag(Rc::clone(&tag.tag)), tag.key);
        let node = document.create_element(&tag.tag)?;
        for (name, value) in &tag.props {
            assign_prop(document, node, name, value)?;
        }
        let mut children = Vec::new();
        for child in &tag.children {
            self.resolve_into(document, id, child, &mut children)?;
        }
        for child in children {
            document.append_child(node, child)?;
        }
        if let Some(node_ref) = &tag.node_ref {
            node_ref.set(Some(node));
        }
        self.exit(id);
        self.record_mut(id).rendered = vec![node];
        Ok(node)
    }

    fn render_fragment(
        &mut self,
        document: &dyn Document,
        parent: InstanceId,
        fragment: &FragmentElement,
        out: &mut Vec<NodeId>,
    ) -> Result<(), RuntimeError> {
        let id = self.enter(parent, Identity::Fragment, fragment.key);
        let start = out.len();
        for child in &fragment.children {
            self.resolve_into(document, id, child, out)?;
        }
        self.exit(id);
        self.record_mut(id).rendered = out[start..].to_vec();
        Ok(())
    }

    fn render_component(
        &mut self,
        document: &dyn Document,
        id: InstanceId,
        element: Rc<ComponentElement>,
    ) -> Result<Vec<NodeId>, RuntimeError> {
        let name = element.identity.name();
        self.record_mut(id).last = Some(Rc::clone(&element));
        let output = {
            let mut scope = Scope {
                tree: self,
                instance: id,
                name,
                children: &element.children,
            };
            (element.body)(&mut scope)
        };
        self.record_mut(id).hooks.finish(name);

        let mut span = Vec::new();
        self.resolve_into(document, id, &output, &mut span)?;
        if span.is_empty() {
            span.push(document.create_text(""));
        }
        let span = self.place_portal(document, id, span)?;
        self.exit(id);
        self.record_mut(id).rendered = span.clone();
        Ok(span)
    }

    /// Queues `span` to move under the portal target requested during this
    /// render, returning what stays at the logical position.
    fn place_portal(
        &mut self,
        document: &dyn Document,
        id: InstanceId,
        span: Vec<NodeId>,
    ) -> Result<Vec<NodeId>, RuntimeError> {
        let (target, previous) = {
            let record = self.record_mut(id);
            (record.hooks.portal.clone(), mem::take(&mut record.portal_nodes))
        };
        self.portal_moves
            .extend(previous.iter().map(|&node| PortalMove::Detach(node)));
        self.released.extend(previous);
        let Some(target) = target else {
            return Ok(span);
        };
        let container = match target {
            PortalTarget::Node(node) => node,
            PortalTarget::Selector(selector) => document
                .query_selector(&selector)
                .ok_or(RuntimeError::PortalTargetNotFound { selector })?,
        };
        self.portal_moves.extend(
            span.iter()
                .map(|&node| PortalMove::Attach { container, node }),
        );
        self.record_mut(id).portal_nodes = span;
        Ok(vec![document.create_text("")])
    }

    /// Re-runs one component with its retained element and swaps its span in place.
    fn rerender(&mut self, document: &dyn Document, id: InstanceId) -> Result<(), RuntimeError> {
        let Some(element) = self.instances.get(&id).and_then(|record| record.last.clone()) else {
            return Ok(());
        };
        let old = self.record(id).rendered.clone();
        log::trace!("re-rendering instance {id} ({})", element.identity.name());
        self.begin_pass(id);
        let new = self.render_component(document, id, element)?;
        swap_span(document, &old, &new)?;
        self.commit_portals(document)?;
        self.splice_ancestors(id, &old, &new);
        self.released.extend(old);
        Ok(())
    }

    /// Re-renders every still-live instance in `dirty`, ancestors first. An
    /// instance already re-rendered as part of an ancestor's pass is skipped.
    pub(crate) fn rerender_dirty(
        &mut self,
        document: &dyn Document,
        dirty: Vec<InstanceId>,
    ) -> Result<(), RuntimeError> {
        self.visited.clear();
        self.portal_moves.clear();
        let mut ordered: Vec<(usize, InstanceId)> = dirty
            .into_iter()
            .filter_map(|id| self.instances.get(&id).map(|record| (record.depth, id)))
            .collect();
        ordered.sort_by_key(|(depth, _)| *depth);
        for (_, id) in ordered {
            if self.visited.contains(&id) || !self.contains(id) {
                continue;
            }
            self.rerender(document, id)?;
        }
        self.visited.clear();
        Ok(())
    }

    /// Replaces `old` with `new` in the spans of enclosing fragments and
    /// components, up to the nearest element or the root.
    fn splice_ancestors(&mut self, id: InstanceId, old: &[NodeId], new: &[NodeId]) {
        let mut current = self.record(id).parent;
        while let Some(ancestor) = current {
            let record = self.record_mut(ancestor);
            match record.identity {
                Identity::Tag(_) => break,
                Identity::Root => {
                    splice(&mut record.rendered, old, new);
                    break;
                }
                Identity::Fragment | Identity::Component(_) => {}
            }
            if !record.portal_nodes.is_empty() {
                splice(&mut record.portal_nodes, old, new);
                break;
            }
            splice(&mut record.rendered, old, new);
            current = record.parent;
        }
    }
}

fn assign_prop(
    document: &dyn Document,
    node: NodeId,
    name: &str,
    value: &PropValue,
) -> Result<(), DomError> {
    if let PropValue::Handler(handler) = value {
        let event = name.strip_prefix("on").unwrap_or(name);
        return document.add_event_listener(node, event, handler.clone());
    }
    if let Err(err) = document.set_property(node, name, value) {
        log::trace!("property {name} rejected ({err}); assigning attribute");
        document.set_attribute(node, name, &value.to_attribute())?;
    }
    Ok(())
}

fn swap_span(document: &dyn Document, old: &[NodeId], new: &[NodeId]) -> Result<(), DomError> {
    let Some(&anchor) = old.first() else {
        return Ok(());
    };
    let Some(parent) = document.parent_of(anchor) else {
        log::warn!("rendered output starting at node {anchor} is detached; skipping swap");
        return Ok(());
    };
    for &node in new {
        document.insert_before(parent, node, anchor)?;
    }
    for &node in old {
        if document.parent_of(node) == Some(parent) {
            document.remove_child(parent, node)?;
        }
    }
    Ok(())
}

fn splice(span: &mut Vec<NodeId>, old: &[NodeId], new: &[NodeId]) {
    let start = old
        .first()
        .and_then(|first| span.iter().position(|node| node == first));
    match start {
        Some(start) if span.get(start..start + old.len()) == Some(old) => {
            span.splice(start..start + old.len(), new.iter().copied());
        }
        _ => log::warn!("enclosing span does not contain the replaced nodes"),
    }
}

/// Render context handed to a component body.
///
/// Hooks, context access and children resolution all go through the scope,
/// which points at the instance record currently being rendered.
pub struct Scope<'a> {
    tree: &'a mut InstanceTree,
    instance: InstanceId,
    name: &'static str,
    children: &'a Children,
}

impl Scope<'_> {
    pub(crate) fn component_name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn record(&self) -> &Instance {
        self.tree.record(self.instance)
    }

    pub(crate) fn record_mut(&mut self) -> &mut Instance {
        self.tree.record_mut(self.instance)
    }

    pub(crate) fn hooks(&mut self) -> &mut HookStore {
        &mut self.record_mut().hooks
    }

    /// Child elements passed by the parent, flattened into a fragment.
    /// Nothing runs until the returned element is rendered.
    pub fn children(&self) -> Element {
        match self.children {
            Children::Elements(children) => Element::Fragment(Rc::new(FragmentElement {
                key: None,
                children: children.clone(),
            })),
            Children::None | Children::RenderProp(_) => Element::empty(),
        }
    }

    pub fn has_children(&self) -> bool {
        match self.children {
            Children::Elements(children) => !children.is_empty(),
            Children::None => false,
            Children::RenderProp(_) => true,
        }
    }

    /// The callable child passed with
    /// [`ComponentBuilder::render_prop`](crate::element::h::ComponentBuilder::render_prop),
    /// if its argument type is `A`.
    pub fn render_prop<A: 'static>(&self) -> Option<RenderProp<A>> {
        match self.children {
            Children::RenderProp(render) => render.downcast_ref::<RenderProp<A>>().cloned(),
            _ => None,
        }
    }
}
