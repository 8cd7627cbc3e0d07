//! Lazy render output.
//!
//! Building an [`Element`] never runs a component body or touches the
//! document. The reconciler resolves elements during a render pass: tags
//! become real nodes, fragments flatten into their parent, and components
//! run inside their own instance record.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use crate::document::{Event, EventHandler, PropValue};
use crate::hash::hash_key;
use crate::hooks::NodeRef;
use crate::tree::Scope;
use crate::Key;

/// Render output of a component or a child position.
#[derive(Clone)]
pub enum Element {
    Text(Rc<str>),
    Tag(Rc<TagElement>),
    Fragment(Rc<FragmentElement>),
    Component(Rc<ComponentElement>),
}

impl Element {
    /// Output that renders as an empty text node.
    pub fn empty() -> Self {
        Element::Text(Rc::from(""))
    }

    pub fn text(text: impl Into<Rc<str>>) -> Self {
        Element::Text(text.into())
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Element::Tag(tag) => f
                .debug_struct("Tag")
                .field("tag", &tag.tag)
                .field("key", &tag.key)
                .field("children", &tag.children)
                .finish(),
            Element::Fragment(fragment) => f
                .debug_struct("Fragment")
                .field("key", &fragment.key)
                .field("children", &fragment.children)
                .finish(),
            Element::Component(component) => f
                .debug_struct("Component")
                .field("name", &component.identity.name())
                .field("key", &component.key)
                .finish(),
        }
    }
}

pub struct TagElement {
    pub(crate) tag: Rc<str>,
    pub(crate) key: Option<Key>,
    pub(crate) props: Vec<(Rc<str>, PropValue)>,
    pub(crate) node_ref: Option<NodeRef>,
    pub(crate) children: Vec<Element>,
}

pub struct FragmentElement {
    pub(crate) key: Option<Key>,
    pub(crate) children: Vec<Element>,
}

pub(crate) type ComponentBody = Rc<dyn Fn(&mut Scope<'_>) -> Element>;

pub struct ComponentElement {
    pub(crate) identity: ComponentId,
    pub(crate) key: Option<Key>,
    pub(crate) body: ComponentBody,
    pub(crate) children: Children,
}

/// Identity of a component: the type of its render function, plus the
/// function's address when it is passed as a plain `fn` pointer.
#[derive(Clone, Copy)]
pub struct ComponentId {
    type_id: TypeId,
    address: Option<usize>,
    name: &'static str,
}

impl ComponentId {
    pub fn of<F: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<F>(),
            address: None,
            name: std::any::type_name::<F>(),
        }
    }

    /// Identity of `render`. Every `fn` pointer with the same signature
    /// shares one type, so those are told apart by address.
    pub fn of_render<P, F>(render: &F) -> Self
    where
        P: 'static,
        F: Fn(&mut Scope<'_>, &P) -> Element + 'static,
    {
        let address = (render as &dyn Any)
            .downcast_ref::<fn(&mut Scope<'_>, &P) -> Element>()
            .map(|render| *render as usize);
        Self {
            address,
            ..Self::of::<F>()
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ComponentId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.address == other.address
    }
}

impl Eq for ComponentId {}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Callable child passed to a component instead of pre-rendered content.
pub type RenderProp<A> = Rc<dyn Fn(A) -> Element>;

/// Children supplied to a component by its parent.
#[derive(Clone, Default)]
pub enum Children {
    #[default]
    None,
    Elements(Vec<Element>),
    /// A boxed [`RenderProp`], kept unevaluated until the component asks for it.
    RenderProp(Rc<dyn Any>),
}

impl From<&str> for Element {
    fn from(text: &str) -> Self {
        Element::Text(Rc::from(text))
    }
}

impl From<String> for Element {
    fn from(text: String) -> Self {
        Element::Text(Rc::from(text))
    }
}

impl From<&String> for Element {
    fn from(text: &String) -> Self {
        Element::Text(Rc::from(text.as_str()))
    }
}

impl From<Rc<str>> for Element {
    fn from(text: Rc<str>) -> Self {
        Element::Text(text)
    }
}

macro_rules! text_element {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Element {
            fn from(value: $ty) -> Self {
                Element::Text(Rc::from(value.to_string()))
            }
        })*
    };
}

text_element!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize, f32, f64, char);

impl<T: Into<Element>> From<Option<T>> for Element {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_else(Element::empty)
    }
}

impl<T: Into<Element>> From<Vec<T>> for Element {
    fn from(children: Vec<T>) -> Self {
        Element::Fragment(Rc::new(FragmentElement {
            key: None,
            children: children.into_iter().map(Into::into).collect(),
        }))
    }
}

/// Element factories.
pub mod h {
    use super::*;

    pub fn tag(name: &str) -> TagBuilder {
        TagBuilder {
            tag: Rc::from(name),
            key: None,
            props: Vec::new(),
            node_ref: None,
            children: Vec::new(),
        }
    }

    pub fn fragment<I>(children: I) -> FragmentBuilder
    where
        I: IntoIterator,
        I::Item: Into<Element>,
    {
        FragmentBuilder {
            key: None,
            children: children.into_iter().map(Into::into).collect(),
        }
    }

    /// A component invocation. `render` runs only when the reconciler reaches
    /// this element, receiving the instance's [`Scope`] and `props`.
    pub fn component<P, F>(render: F, props: P) -> ComponentBuilder
    where
        P: 'static,
        F: Fn(&mut Scope<'_>, &P) -> Element + 'static,
    {
        let identity = ComponentId::of_render(&render);
        let body: ComponentBody = Rc::new(move |cx: &mut Scope<'_>| render(cx, &props));
        ComponentBuilder {
            identity,
            key: None,
            body,
            children: Children::None,
        }
    }

    pub struct TagBuilder {
        tag: Rc<str>,
        key: Option<Key>,
        props: Vec<(Rc<str>, PropValue)>,
        node_ref: Option<NodeRef>,
        children: Vec<Element>,
    }

    impl TagBuilder {
        /// Matches this element across renders by `key` instead of by its
        /// position among unkeyed siblings. Positional matching shifts when
        /// a sibling is inserted in front or the list is reordered.
        pub fn key<K: Hash + ?Sized>(mut self, key: &K) -> Self {
            self.key = Some(hash_key(key));
            self
        }

        pub fn prop(mut self, name: &str, value: impl Into<PropValue>) -> Self {
            self.props.push((Rc::from(name), value.into()));
            self
        }

        pub fn id(self, value: impl Into<PropValue>) -> Self {
            self.prop("id", value)
        }

        pub fn class(self, value: impl Into<PropValue>) -> Self {
            self.prop("className", value)
        }

        /// Registers a listener for `event` (`"click"`, `"input"`, ..).
        pub fn on(mut self, event: &str, handler: impl Fn(&Event) + 'static) -> Self {
            self.props.push((
                Rc::from(format!("on{event}")),
                PropValue::Handler(EventHandler::new(handler)),
            ));
            self
        }

        /// Stores the created node into `node_ref` once its children are attached.
        pub fn node_ref(mut self, node_ref: &NodeRef) -> Self {
            self.node_ref = Some(node_ref.clone());
            self
        }

        pub fn child(mut self, child: impl Into<Element>) -> Self {
            self.children.push(child.into());
            self
        }

        pub fn children<I>(mut self, children: I) -> Self
        where
            I: IntoIterator,
            I::Item: Into<Element>,
        {
            self.children.extend(children.into_iter().map(Into::into));
            self
        }

        pub fn build(self) -> Element {
            Element::Tag(Rc::new(TagElement {
                tag: self.tag,
                key: self.key,
                props: self.props,
                node_ref: self.node_ref,
                children: self.children,
            }))
        }
    }

    impl From<TagBuilder> for Element {
        fn from(builder: TagBuilder) -> Self {
            builder.build()
        }
    }

    pub struct FragmentBuilder {
        key: Option<Key>,
        children: Vec<Element>,
    }

    impl FragmentBuilder {
        pub fn key<K: Hash + ?Sized>(mut self, key: &K) -> Self {
            self.key = Some(hash_key(key));
            self
        }

        pub fn child(mut self, child: impl Into<Element>) -> Self {
            self.children.push(child.into());
            self
        }

        pub fn build(self) -> Element {
            Element::Fragment(Rc::new(FragmentElement {
                key: self.key,
                children: self.children,
            }))
        }
    }

    impl From<FragmentBuilder> for Element {
        fn from(builder: FragmentBuilder) -> Self {
            builder.build()
        }
    }

    pub struct ComponentBuilder {
        identity: ComponentId,
        key: Option<Key>,
        body: ComponentBody,
        children: Children,
    }

    impl ComponentBuilder {
        pub fn key<K: Hash + ?Sized>(mut self, key: &K) -> Self {
            self.key = Some(hash_key(key));
            self
        }

        pub fn child(mut self, child: impl Into<Element>) -> Self {
            match &mut self.children {
                Children::Elements(children) => children.push(child.into()),
                other => *other = Children::Elements(vec![child.into()]),
            }
            self
        }

        pub fn children<I>(mut self, children: I) -> Self
        where
            I: IntoIterator,
            I::Item: Into<Element>,
        {
            let children = children.into_iter().map(Into::into);
            match &mut self.children {
                Children::Elements(existing) => existing.extend(children),
                other => *other = Children::Elements(children.collect()),
            }
            self
        }

        /// Passes a callable child through unevaluated; the component reads
        /// it back with [`Scope::render_prop`].
        pub fn render_prop<A: 'static>(mut self, render: impl Fn(A) -> Element + 'static) -> Self {
            let render: RenderProp<A> = Rc::new(render);
            self.children = Children::RenderProp(Rc::new(render));
            self
        }

        pub fn build(self) -> Element {
            Element::Component(Rc::new(ComponentElement {
                identity: self.identity,
                key: self.key,
                body: self.body,
                children: self.children,
            }))
        }
    }

    impl From<ComponentBuilder> for Element {
        fn from(builder: ComponentBuilder) -> Self {
            builder.build()
        }
    }
}
