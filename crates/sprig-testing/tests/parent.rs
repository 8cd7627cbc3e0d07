use std::cell::Cell;
use std::rc::Rc;

use sprig_testing::prelude::*;

fn wrapper(cx: &mut Scope<'_>, _: &()) -> Element {
    h::tag("div").child(cx.children()).into()
}

fn eraser(cx: &mut Scope<'_>, _: &()) -> Element {
    let (show, set) = cx.use_state(|| true);
    h::tag("div")
        .child(
            h::tag("button")
                .id("click")
                .on("click", move |_| set.set(!show))
                .child("Erase children"),
        )
        .child(show.then(|| cx.children()))
        .into()
}

#[test]
fn generic_children_render_inside_the_parent() {
    fn component(_cx: &mut Scope<'_>, _: &()) -> Element {
        h::component(wrapper, ())
            .child(h::tag("button").id("click").child("Click me!"))
            .into()
    }

    run_test_harness(|harness| {
        harness.mount(h::component(component, ())).expect("mount");
        assert_eq!(
            harness.outer_html(),
            r#"<div id="root"><div><button id="click">Click me!</button></div></div>"#
        );
    });
}

#[test]
fn hidden_children_are_unmounted() {
    fn to_unmount(cx: &mut Scope<'_>, unmounted: &Rc<Cell<bool>>) -> Element {
        let unmounted = unmounted.clone();
        cx.use_unmount_effect(move || unmounted.set(true));
        h::tag("button").id("child").child("Click me!").into()
    }

    fn component(_cx: &mut Scope<'_>, unmounted: &Rc<Cell<bool>>) -> Element {
        h::component(eraser, ())
            .child(h::component(to_unmount, unmounted.clone()))
            .into()
    }

    run_test_harness(|harness| {
        let unmounted = Rc::new(Cell::new(false));
        harness
            .mount(h::component(component, unmounted.clone()))
            .expect("mount");
        assert!(!unmounted.get());
        assert_eq!(harness.count("#child"), 1);

        harness.click("#click").expect("click");
        harness.run_all_timers().expect("flush");
        assert!(unmounted.get());
        assert_eq!(harness.count("#child"), 0);
    });
}

#[test]
fn remounted_children_start_with_fresh_state() {
    fn to_update(cx: &mut Scope<'_>, _: &()) -> Element {
        let (state, set) = cx.use_state(|| 1);
        h::tag("button")
            .id("child")
            .on("click", move |_| set.set(state + 1))
            .child(state)
            .into()
    }

    fn component(_cx: &mut Scope<'_>, _: &()) -> Element {
        h::component(eraser, ())
            .child(h::component(to_update, ()))
            .into()
    }

    run_test_harness(|harness| {
        harness.mount(h::component(component, ())).expect("mount");
        assert_eq!(harness.text("#child").expect("#child"), "1");
        harness.click("#child").expect("click");
        harness.run_all_timers().expect("flush");
        assert_eq!(harness.text("#child").expect("#child"), "2");

        harness.click("#click").expect("click");
        harness.run_all_timers().expect("flush");
        assert_eq!(harness.count("#child"), 0);

        harness.click("#click").expect("click");
        harness.run_all_timers().expect("flush");
        assert_eq!(harness.text("#child").expect("#child"), "1");
        harness.click("#child").expect("click");
        harness.run_all_timers().expect("flush");
        assert_eq!(harness.text("#child").expect("#child"), "2");
    });
}

#[test]
fn function_children_render_inside_the_parent() {
    fn fn_as_children(cx: &mut Scope<'_>, _: &()) -> Element {
        let (state, set) = cx.use_state(|| 1);
        let inner = cx
            .render_prop::<i32>()
            .map(|render| render(state))
            .unwrap_or_else(Element::empty);
        h::tag("button")
            .id("click")
            .on("click", move |_| set.set(state + 1))
            .child(inner)
            .into()
    }

    fn component(_cx: &mut Scope<'_>, _: &()) -> Element {
        h::component(fn_as_children, ())
            .render_prop(|state: i32| h::tag("div").child(state).into())
            .into()
    }

    run_test_harness(|harness| {
        harness.mount(h::component(component, ())).expect("mount");
        assert_eq!(harness.text("#click > div").expect("div"), "1");
        harness.click("#click").expect("click");
        harness.run_all_timers().expect("flush");
        assert_eq!(harness.text("#click > div").expect("div"), "2");
    });
}

#[test]
fn before_render_effects_in_children_see_the_previous_output() {
    #[derive(Clone, Default)]
    struct Tracker {
        called: Rc<Cell<u32>>,
        node: Rc<Cell<Option<sprig_core::NodeId>>>,
    }

    fn stateful(cx: &mut Scope<'_>, props: &(i32, Setter<i32>, Tracker)) -> Element {
        let (state, set, tracker) = props.clone();
        let node_ref: NodeRef = cx.use_ref(|| None);
        let seen = node_ref.clone();
        cx.use_effect(EffectPhase::BeforeRender, deps![state], move || {
            tracker.called.set(tracker.called.get() + 1);
            tracker.node.set(seen.current());
        });
        h::tag("button")
            .id("click")
            .node_ref(&node_ref)
            .on("click", move |_| set.set(state + 1))
            .child(state)
            .into()
    }

    fn component(cx: &mut Scope<'_>, tracker: &Tracker) -> Element {
        let (state, set) = cx.use_state(|| 0);
        h::component(wrapper, ())
            .child(h::component(stateful, (state, set, tracker.clone())))
            .into()
    }

    run_test_harness(|harness| {
        let tracker = Tracker::default();
        harness.mount(h::component(component, tracker.clone())).expect("mount");
        assert_eq!(tracker.called.get(), 1);
        let first_button = harness.find("#click").expect("button");

        harness.click("#click").expect("click");
        harness.run_all_timers().expect("flush");
        assert_eq!(tracker.called.get(), 2);
        assert_eq!(tracker.node.get(), Some(first_button));
        assert_eq!(harness.text("#click").expect("button"), "1");
    });
}
