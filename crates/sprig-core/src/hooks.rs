//! Per-instance hook storage and the hook primitives exposed on [`Scope`].
//!
//! Every hook call claims the next slot of the current instance's
//! [`HookStore`]. Slots are matched purely by call order, so a component has
//! to make the same hook calls in the same order on every render.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use crate::error::RuntimeError;
use crate::runtime::{MountId, RuntimeHandle};
use crate::tree::{InstanceId, Scope};
use crate::NodeId;

pub(crate) type Action = Box<dyn FnOnce() + 'static>;

/// Re-render request bound to one instance.
#[derive(Clone)]
pub(crate) struct RenderTrigger {
    runtime: RuntimeHandle,
    mount: MountId,
    instance: InstanceId,
}

impl RenderTrigger {
    pub(crate) fn new(runtime: RuntimeHandle, mount: MountId, instance: InstanceId) -> Self {
        Self {
            runtime,
            mount,
            instance,
        }
    }

    fn request(&self) {
        self.runtime.request_render(self.mount, self.instance);
    }
}

pub(crate) struct HookStore {
    slots: Vec<Box<dyn Any>>,
    cursor: usize,
    rendered: bool,
    pub(crate) after_render: Vec<Action>,
    pub(crate) unmount: Vec<Action>,
    pub(crate) portal: Option<PortalTarget>,
    trigger: RenderTrigger,
}

impl HookStore {
    pub(crate) fn new(trigger: RenderTrigger) -> Self {
        Self {
            slots: Vec::new(),
            cursor: 0,
            rendered: false,
            after_render: Vec::new(),
            unmount: Vec::new(),
            portal: None,
            trigger,
        }
    }

    pub(crate) fn begin(&mut self) {
        self.cursor = 0;
        self.portal = None;
    }

    /// Checks the hook count of the render that just returned.
    pub(crate) fn finish(&mut self, component: &str) {
        if self.rendered && self.cursor != self.slots.len() {
            hook_order_violation(
                component,
                format!(
                    "rendered {} hooks, the previous render used {}",
                    self.cursor,
                    self.slots.len()
                ),
            );
        }
        self.rendered = true;
    }

    /// Claims the next slot. Returns the stored value when the slot already
    /// exists, `None` when the caller must [`HookStore::store`] a fresh one.
    fn advance<T: 'static>(&mut self, component: &str) -> Option<&mut T> {
        let index = self.cursor;
        self.cursor += 1;
        if index >= self.slots.len() {
            if self.rendered {
                hook_order_violation(
                    component,
                    format!("hook #{} was not called on the previous render", index + 1),
                );
            }
            return None;
        }
        match self.slots[index].downcast_mut::<T>() {
            Some(slot) => Some(slot),
            None => hook_order_violation(
                component,
                format!(
                    "hook #{} changed kind, expected {}",
                    index + 1,
                    std::any::type_name::<T>()
                ),
            ),
        }
    }

    fn store<T: 'static>(&mut self, value: T) {
        debug_assert_eq!(self.cursor, self.slots.len() + 1);
        self.slots.push(Box::new(value));
    }

    pub(crate) fn take_unmount(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.unmount)
    }

    pub(crate) fn take_after_render(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.after_render)
    }
}

fn hook_order_violation(component: &str, detail: String) -> ! {
    panic!(
        "{}",
        RuntimeError::HookOrder {
            component: component.to_string(),
            detail,
        }
    )
}

/// A comparable dependency value.
pub trait DepValue: Any {
    fn same_as(&self, other: &dyn DepValue) -> bool;
    fn as_any(&self) -> &dyn Any;
}

impl<T: PartialEq + 'static> DepValue for T {
    fn same_as(&self, other: &dyn DepValue) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Dependency list for effects and memoized values. Build it with [`deps!`](crate::deps).
#[derive(Clone, Default)]
pub struct Deps {
    values: SmallVec<[Rc<dyn DepValue>; 4]>,
}

#[derive(PartialEq)]
struct RenderStamp(u64);

static NEXT_STAMP: AtomicU64 = AtomicU64::new(1);

impl Deps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, value: impl PartialEq + 'static) -> Self {
        self.values.push(Rc::new(value));
        self
    }

    /// A single-entry list that differs from every other list ever built.
    pub fn unique() -> Self {
        Self::new().with(RenderStamp(NEXT_STAMP.fetch_add(1, Ordering::Relaxed)))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn changed_from(&self, previous: &Deps, component: &str) -> bool {
        if self.len() != previous.len() {
            panic!(
                "{}",
                RuntimeError::DepsLength {
                    component: component.to_string(),
                    expected: previous.len(),
                    found: self.len(),
                }
            );
        }
        self.values
            .iter()
            .zip(previous.values.iter())
            .any(|(next, prev)| !(**next).same_as(&**prev))
    }
}

impl fmt::Debug for Deps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deps").field("len", &self.len()).finish()
    }
}

/// When an effect whose dependencies changed runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectPhase {
    /// Synchronously, while the component body is still running.
    BeforeRender,
    /// After the whole pass is committed to the document.
    AfterRender,
}

/// Setter half of [`Scope::use_state`].
pub struct Setter<T> {
    cell: Rc<RefCell<T>>,
    trigger: RenderTrigger,
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
            trigger: self.trigger.clone(),
        }
    }
}

impl<T: PartialEq + 'static> Setter<T> {
    /// Stores `value` and schedules a re-render, unless it equals the
    /// current value.
    pub fn set(&self, value: T) {
        if *self.cell.borrow() == value {
            return;
        }
        *self.cell.borrow_mut() = value;
        self.trigger.request();
    }

    /// Like [`Setter::set`] with a value computed from the latest stored one.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = {
            let current = self.cell.borrow();
            f(&current)
        };
        self.set(next);
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.cell.borrow().clone()
    }
}

impl<T: fmt::Debug> fmt::Debug for Setter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Setter").field(&*self.cell.borrow()).finish()
    }
}

/// Mutable box that survives re-renders without triggering them.
pub struct Ref<T>(Rc<RefCell<T>>);

impl<T> Ref<T> {
    pub fn new(value: T) -> Self {
        Self(Rc::new(RefCell::new(value)))
    }

    pub fn current(&self) -> T
    where
        T: Clone,
    {
        self.0.borrow().clone()
    }

    pub fn set(&self, value: T) {
        *self.0.borrow_mut() = value;
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.0.borrow())
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T> PartialEq for Ref<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: fmt::Debug> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Ref").field(&*self.0.borrow()).finish()
    }
}

/// Receives the node created for a tag.
pub type NodeRef = Ref<Option<NodeId>>;

/// Where [`Scope::use_portal`] attaches an instance's output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PortalTarget {
    Node(NodeId),
    Selector(String),
}

impl From<NodeId> for PortalTarget {
    fn from(node: NodeId) -> Self {
        PortalTarget::Node(node)
    }
}

impl From<&str> for PortalTarget {
    fn from(selector: &str) -> Self {
        PortalTarget::Selector(selector.to_string())
    }
}

impl From<String> for PortalTarget {
    fn from(selector: String) -> Self {
        PortalTarget::Selector(selector)
    }
}

struct StateSlot<T>(Rc<RefCell<T>>);

struct RefSlot<T>(Ref<T>);

struct EffectSlot {
    deps: Deps,
}

struct MemoSlot<T> {
    value: T,
    deps: Deps,
}

struct UnmountSlot;

struct PortalSlot;

impl Scope<'_> {
    /// Persistent state. `init` runs on the first render only.
    pub fn use_state<T>(&mut self, init: impl FnOnce() -> T) -> (T, Setter<T>)
    where
        T: Clone + PartialEq + 'static,
    {
        let name = self.component_name();
        let hooks = self.hooks();
        let cell = match hooks.advance::<StateSlot<T>>(name) {
            Some(slot) => Rc::clone(&slot.0),
            None => {
                let cell = Rc::new(RefCell::new(init()));
                hooks.store(StateSlot(Rc::clone(&cell)));
                cell
            }
        };
        let value = cell.borrow().clone();
        let setter = Setter {
            cell,
            trigger: hooks.trigger.clone(),
        };
        (value, setter)
    }

    pub fn use_ref<T: 'static>(&mut self, init: impl FnOnce() -> T) -> Ref<T> {
        let name = self.component_name();
        let hooks = self.hooks();
        match hooks.advance::<RefSlot<T>>(name) {
            Some(slot) => slot.0.clone(),
            None => {
                let value = Ref::new(init());
                hooks.store(RefSlot(value.clone()));
                value
            }
        }
    }

    /// Runs `effect` when `deps` differ from the previous render's, or on the
    /// first render.
    pub fn use_effect(
        &mut self,
        phase: EffectPhase,
        deps: Deps,
        effect: impl FnOnce() + 'static,
    ) {
        if !self.deps_changed(deps) {
            return;
        }
        match phase {
            EffectPhase::BeforeRender => effect(),
            EffectPhase::AfterRender => self.hooks().after_render.push(Box::new(effect)),
        }
    }

    pub fn use_memo<T: Clone + 'static>(&mut self, deps: Deps, factory: impl FnOnce() -> T) -> T {
        let name = self.component_name();
        let hooks = self.hooks();
        if let Some(slot) = hooks.advance::<MemoSlot<T>>(name) {
            if deps.changed_from(&slot.deps, name) {
                slot.value = factory();
                slot.deps = deps;
            }
            return slot.value.clone();
        }
        let value = factory();
        hooks.store(MemoSlot {
            value: value.clone(),
            deps,
        });
        value
    }

    /// Keeps the same callback across renders until `deps` change.
    pub fn use_callback<F: 'static>(&mut self, deps: Deps, callback: F) -> Rc<F> {
        self.use_memo(deps, move || Rc::new(callback))
    }

    /// Runs `effect` once, while the instance first renders.
    pub fn use_mount_effect(&mut self, effect: impl FnOnce() + 'static) {
        self.use_effect(EffectPhase::BeforeRender, Deps::new(), effect);
    }

    /// Runs `callback` once when the instance is torn down.
    pub fn use_unmount_effect(&mut self, callback: impl FnOnce() + 'static) {
        let name = self.component_name();
        let hooks = self.hooks();
        if hooks.advance::<UnmountSlot>(name).is_none() {
            hooks.store(UnmountSlot);
            hooks.unmount.push(Box::new(callback));
        }
    }

    pub fn use_each_render_effect(&mut self, phase: EffectPhase, effect: impl FnOnce() + 'static) {
        self.use_effect(phase, Deps::unique(), effect);
    }

    /// Attaches this instance's output under `target` and leaves an empty
    /// placeholder at its logical position.
    pub fn use_portal(&mut self, target: impl Into<PortalTarget>) {
        let name = self.component_name();
        let hooks = self.hooks();
        if hooks.advance::<PortalSlot>(name).is_none() {
            hooks.store(PortalSlot);
        }
        hooks.portal = Some(target.into());
    }

    fn deps_changed(&mut self, deps: Deps) -> bool {
        let name = self.component_name();
        let hooks = self.hooks();
        match hooks.advance::<EffectSlot>(name) {
            Some(slot) => {
                let changed = deps.changed_from(&slot.deps, name);
                if changed {
                    slot.deps = deps;
                }
                changed
            }
            None => {
                hooks.store(EffectSlot { deps });
                true
            }
        }
    }
}
