use sprig_testing::prelude::*;

/// A counter published through context.
#[derive(Clone, Default)]
struct Counter {
    state: i32,
    set: Option<Setter<i32>>,
}

impl Counter {
    fn store(&self, value: i32) {
        if let Some(set) = &self.set {
            set.set(value);
        }
    }
}

thread_local! {
    static FIRST: Context<Counter> = create_context(Counter::default());
    static SECOND: Context<Counter> = create_context(Counter::default());
}

fn first() -> Context<Counter> {
    FIRST.with(Clone::clone)
}

fn second() -> Context<Counter> {
    SECOND.with(Clone::clone)
}

fn holder(cx: &mut Scope<'_>, context: &Context<Counter>) -> Element {
    let (state, set) = cx.use_state(|| 1);
    cx.write_context(context, Counter { state, set: Some(set) });
    cx.children()
}

fn single_child(cx: &mut Scope<'_>, _: &()) -> Element {
    let ctx = cx.read_context(&first());
    h::tag("button")
        .id("click")
        .on("click", {
            let ctx = ctx.clone();
            move |_| ctx.store(ctx.state + 1)
        })
        .child(ctx.state)
        .into()
}

fn double_child(cx: &mut Scope<'_>, _: &()) -> Element {
    let one = cx.read_context(&first());
    let two = cx.read_context(&second());
    let label = format!("{} + {}", one.state, two.state);
    h::tag("button")
        .id("click")
        .on("click", move |_| {
            one.store(one.state + 1);
            two.store(two.state * 2);
        })
        .child(label)
        .into()
}

#[test]
fn child_reads_and_updates_context() {
    fn parent(_cx: &mut Scope<'_>, _: &()) -> Element {
        h::component(holder, first())
            .child(h::component(single_child, ()))
            .into()
    }

    run_test_harness(|harness| {
        harness.mount(h::component(parent, ())).expect("mount");
        assert_eq!(harness.text("#click").expect("button"), "1");
        harness.click("#click").expect("click");
        harness.run_all_timers().expect("flush");
        assert_eq!(harness.text("#click").expect("button"), "2");
        harness.click("#click").expect("click");
        harness.run_all_timers().expect("flush");
        assert_eq!(harness.text("#click").expect("button"), "3");
    });
}

#[test]
fn nested_providers_are_both_visible() {
    fn container(_cx: &mut Scope<'_>, _: &()) -> Element {
        h::component(holder, first())
            .child(h::component(holder, second()).child(h::component(double_child, ())))
            .into()
    }

    run_test_harness(|harness| {
        harness.mount(h::component(container, ())).expect("mount");
        assert_eq!(harness.text("#click").expect("button"), "1 + 1");
        harness.click("#click").expect("click");
        harness.run_all_timers().expect("flush");
        assert_eq!(harness.text("#click").expect("button"), "2 + 2");
        harness.click("#click").expect("click");
        harness.run_all_timers().expect("flush");
        assert_eq!(harness.text("#click").expect("button"), "3 + 4");
    });
}

#[test]
fn providers_work_without_passed_children() {
    fn inner(cx: &mut Scope<'_>, _: &()) -> Element {
        let (state, set) = cx.use_state(|| 1);
        cx.write_context(&first(), Counter { state, set: Some(set) });
        h::component(double_child, ()).into()
    }

    fn outer(cx: &mut Scope<'_>, _: &()) -> Element {
        let (state, set) = cx.use_state(|| 1);
        cx.write_context(&second(), Counter { state, set: Some(set) });
        h::component(inner, ()).into()
    }

    run_test_harness(|harness| {
        harness.mount(h::component(outer, ())).expect("mount");
        assert_eq!(harness.text("#click").expect("button"), "1 + 1");
        harness.click("#click").expect("click");
        harness.run_all_timers().expect("flush");
        assert_eq!(harness.text("#click").expect("button"), "2 + 2");
        harness.click("#click").expect("click");
        harness.run_all_timers().expect("flush");
        assert_eq!(harness.text("#click").expect("button"), "3 + 4");
    });
}

#[test]
fn siblings_do_not_see_each_others_context() {
    fn writer(cx: &mut Scope<'_>, _: &()) -> Element {
        cx.write_context(&first(), Counter { state: 99, set: None });
        h::tag("i").child("writer").into()
    }

    fn reader(cx: &mut Scope<'_>, _: &()) -> Element {
        let ctx = cx.read_context(&first());
        h::tag("b").child(ctx.state).into()
    }

    run_test_harness(|harness| {
        harness
            .mount(h::fragment([
                Element::from(h::component(writer, ())),
                h::component(reader, ()).into(),
            ]))
            .expect("mount");
        assert_eq!(harness.inner_html(), "<i>writer</i><b>0</b>");
    });
}
