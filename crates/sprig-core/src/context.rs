use std::any::Any;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::collections::map::HashMap;
use crate::tree::Scope;

pub(crate) type ContextId = usize;

/// Snapshot of context values visible to one instance.
pub(crate) type ContextMap = HashMap<ContextId, Rc<dyn Any>>;

static NEXT_CONTEXT_ID: AtomicUsize = AtomicUsize::new(1);

/// Descriptor for a value shared down the instance tree.
pub struct Context<T> {
    id: ContextId,
    default: Rc<T>,
}

impl<T> Clone for Context<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            default: Rc::clone(&self.default),
        }
    }
}

impl<T> Context<T> {
    pub fn default_value(&self) -> &T {
        &self.default
    }
}

pub fn create_context<T: 'static>(default: T) -> Context<T> {
    Context {
        id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
        default: Rc::new(default),
    }
}

impl Scope<'_> {
    /// Makes `value` visible to the children this component renders.
    /// Siblings and ancestors keep their own view.
    pub fn write_context<T: 'static>(&mut self, context: &Context<T>, value: T) {
        self.record_mut()
            .context
            .insert(context.id, Rc::new(value) as Rc<dyn Any>);
    }

    /// The nearest value written by this instance or an ancestor, falling back
    /// to the descriptor's default.
    pub fn read_context<T: Clone + 'static>(&self, context: &Context<T>) -> T {
        self.record()
            .context
            .get(&context.id)
            .and_then(|value| value.downcast_ref::<T>())
            .unwrap_or_else(|| context.default.as_ref())
            .clone()
    }
}
