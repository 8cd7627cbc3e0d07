#![doc = r"Core runtime for Sprig: hook-based components rendered straight onto live DOM nodes."]

pub mod collections;
pub mod element;
pub mod hash;
pub mod platform;
pub mod runtime;

mod context;
mod document;
mod error;
mod hooks;
mod memory_document;
mod mount;
mod tree;

pub use context::{create_context, Context};
pub use document::{Document, DomError, Event, EventHandler, PropValue};
pub use element::{h, Children, ComponentId, Element, RenderProp};
pub use error::RuntimeError;
pub use hooks::{Deps, DepValue, EffectPhase, NodeRef, PortalTarget, Ref, Setter};
pub use memory_document::MemoryDocument;
pub use mount::{mount, mount_with_options, Mount, MountOptions, MountTarget, DEFAULT_FLUSH_LIMIT};
pub use platform::{FlushScheduler, FlushTask};
pub use runtime::{FlushState, Runtime, RuntimeHandle};
pub use tree::Scope;

/// Hashed form of an explicit sibling key.
pub type Key = u64;
/// Handle to a node owned by a [`Document`].
pub type NodeId = usize;

/// Builds a [`Deps`] list from comparable values.
///
/// ```ignore
/// cx.use_effect(EffectPhase::AfterRender, deps![count, name.clone()], move || { /* .. */ });
/// ```
#[macro_export]
macro_rules! deps {
    () => {
        $crate::Deps::new()
    };
    ($($value:expr),+ $(,)?) => {
        $crate::Deps::new()$(.with($value))+
    };
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/hooks_tests.rs"]
mod hooks_tests;

#[cfg(test)]
#[path = "tests/tree_tests.rs"]
mod tree_tests;

#[cfg(test)]
#[path = "tests/scheduler_tests.rs"]
mod scheduler_tests;

#[cfg(test)]
#[path = "tests/memory_document_tests.rs"]
mod memory_document_tests;
