use sprig_testing::prelude::*;

fn with_trailer(cx: &mut Scope<'_>, _: &()) -> Element {
    h::fragment([cx.children(), h::tag("div").child("Not me!").into()]).into()
}

#[test]
fn children_render_in_place_of_the_fragment() {
    fn component(_cx: &mut Scope<'_>, _: &()) -> Element {
        h::component(with_trailer, ())
            .child(h::fragment(["Click me!"]))
            .into()
    }

    run_test_harness(|harness| {
        harness.mount(h::component(component, ())).expect("mount");
        harness.run_all_timers().expect("flush");
        assert_eq!(
            harness.outer_html(),
            r#"<div id="root">Click me!<div>Not me!</div></div>"#
        );
    });
}

#[test]
fn parent_rerender_keeps_passed_children() {
    fn parent(cx: &mut Scope<'_>, _: &()) -> Element {
        let (state, set) = cx.use_state(|| 0);
        h::fragment([
            cx.children(),
            h::tag("div").child("Not me!").into(),
            h::tag("button")
                .id("click")
                .on("click", move |_| set.set(state + 1))
                .child(state)
                .into(),
        ])
        .into()
    }

    fn component(_cx: &mut Scope<'_>, _: &()) -> Element {
        h::component(parent, ())
            .child(h::tag("div").child("Click me!"))
            .into()
    }

    run_test_harness(|harness| {
        harness.mount(h::component(component, ())).expect("mount");
        assert_eq!(
            harness.outer_html(),
            r#"<div id="root"><div>Click me!</div><div>Not me!</div><button id="click">0</button></div>"#
        );
        harness.click("#click").expect("click");
        harness.run_all_timers().expect("flush");
        assert_eq!(
            harness.outer_html(),
            r#"<div id="root"><div>Click me!</div><div>Not me!</div><button id="click">1</button></div>"#
        );
    });
}

#[test]
fn root_fragment_mounts_every_child() {
    run_test_harness(|harness| {
        harness
            .mount(h::fragment([
                h::tag("div").child("Yes"),
                h::tag("div").child("No"),
            ]))
            .expect("mount");
        assert_eq!(
            harness.outer_html(),
            r#"<div id="root"><div>Yes</div><div>No</div></div>"#
        );
    });
}

#[test]
fn sibling_components_in_a_fragment_update_independently() {
    fn doubler(cx: &mut Scope<'_>, _: &()) -> Element {
        let (state, set) = cx.use_state(|| 1);
        h::tag("button")
            .id("clack")
            .on("click", move |_| set.set(state * 2))
            .child(state)
            .into()
    }

    fn incrementer(cx: &mut Scope<'_>, _: &()) -> Element {
        let (state, set) = cx.use_state(|| 1);
        h::tag("button")
            .id("click")
            .on("click", move |_| set.set(state + 1))
            .child(state)
            .into()
    }

    run_test_harness(|harness| {
        harness
            .mount(h::fragment([
                h::component(incrementer, ()),
                h::component(doubler, ()),
            ]))
            .expect("mount");
        harness.click("#click").expect("click");
        harness.run_all_timers().expect("flush");
        assert_eq!(harness.text("#click").expect("click"), "2");
        assert_eq!(harness.text("#clack").expect("clack"), "1");

        harness.click("#click").expect("click");
        harness.run_all_timers().expect("flush");
        harness.click("#clack").expect("clack");
        harness.run_all_timers().expect("flush");
        harness.click("#clack").expect("clack");
        harness.run_all_timers().expect("flush");
        assert_eq!(harness.text("#click").expect("click"), "3");
        assert_eq!(harness.text("#clack").expect("clack"), "4");
        assert_eq!(
            harness.inner_html(),
            r#"<button id="click">3</button><button id="clack">4</button>"#
        );
    });
}

#[test]
fn render_prop_children_receive_state() {
    fn parent(cx: &mut Scope<'_>, _: &()) -> Element {
        let (state, set) = cx.use_state(|| 1);
        let body = cx
            .render_prop::<i32>()
            .map(|render| render(state))
            .unwrap_or_else(Element::empty);
        h::fragment([
            body,
            h::tag("button")
                .id("click")
                .on("click", move |_| set.set(state + 1))
                .child("Click me")
                .into(),
        ])
        .into()
    }

    fn container(_cx: &mut Scope<'_>, _: &()) -> Element {
        h::component(parent, ())
            .render_prop(|state: i32| {
                h::fragment([
                    h::tag("div").class("test").child(state),
                    h::tag("div").class("taste").child(state),
                ])
                .into()
            })
            .into()
    }

    run_test_harness(|harness| {
        harness
            .mount(h::fragment([h::component(container, ())]))
            .expect("mount");
        harness.click("#click").expect("click");
        harness.run_all_timers().expect("flush");
        assert_eq!(harness.text(".test").expect(".test"), "2");
        assert_eq!(harness.text(".taste").expect(".taste"), "2");
    });
}

#[test]
fn fragments_switch_shape_between_renders() {
    fn odd(_cx: &mut Scope<'_>, props: &(i32, Setter<i32>)) -> Element {
        let (state, set) = props.clone();
        h::tag("div")
            .child(h::fragment::<[Element; 3]>([
                h::tag("p").child(state).into(),
                h::tag("div").child(state).into(),
                h::tag("button")
                    .id("click")
                    .on("click", move |_| set.set(state + 1))
                    .child("Update")
                    .into(),
            ]))
            .into()
    }

    fn even(_cx: &mut Scope<'_>, props: &(i32, Setter<i32>)) -> Element {
        let (state, set) = props.clone();
        h::fragment([h::tag("div")
            .child(h::fragment([state]))
            .child(h::fragment([state]))
            .child(
                h::tag("button")
                    .id("click")
                    .on("click", move |_| set.set(state + 1))
                    .child("Update"),
            )])
        .into()
    }

    fn switcher(cx: &mut Scope<'_>, _: &()) -> Element {
        let (state, set) = cx.use_state(|| 0);
        if state % 2 == 1 {
            h::component(odd, (state, set)).into()
        } else {
            h::component(even, (state, set)).into()
        }
    }

    run_test_harness(|harness| {
        harness.mount(h::component(switcher, ())).expect("mount");
        let mut snapshots = vec![harness.outer_html()];
        for _ in 0..3 {
            harness.click("#click").expect("click");
            harness.run_all_timers().expect("flush");
            snapshots.push(harness.outer_html());
        }
        assert_eq!(
            snapshots,
            [
                r#"<div id="root"><div>00<button id="click">Update</button></div></div>"#,
                r#"<div id="root"><div><p>1</p><div>1</div><button id="click">Update</button></div></div>"#,
                r#"<div id="root"><div>22<button id="click">Update</button></div></div>"#,
                r#"<div id="root"><div><p>3</p><div>3</div><button id="click">Update</button></div></div>"#,
            ]
        );
    });
}

#[test]
fn empty_output_keeps_its_position() {
    fn maybe(cx: &mut Scope<'_>, _: &()) -> Element {
        let (shown, set) = cx.use_state(|| false);
        h::fragment([
            Element::from(shown.then_some("shown")),
            h::tag("button")
                .on("click", move |_| set.set(!shown))
                .child("toggle")
                .into(),
        ])
        .into()
    }

    run_test_harness(|harness| {
        harness
            .mount(h::tag("main").child("a").child(h::component(maybe, ())).child("z"))
            .expect("mount");
        assert_eq!(harness.text("main").expect("main"), "atogglez");
        harness.click("button").expect("click");
        harness.run_all_timers().expect("flush");
        assert_eq!(harness.text("main").expect("main"), "ashowntogglez");
    });
}
