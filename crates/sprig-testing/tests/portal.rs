use std::cell::Cell;
use std::rc::Rc;

use sprig_testing::prelude::*;

fn modal(cx: &mut Scope<'_>, title: &&'static str) -> Element {
    cx.use_portal("#overlay");
    let (count, set) = cx.use_state(|| 0);
    h::tag("div")
        .class("modal")
        .child(h::tag("h2").child(*title))
        .child(
            h::tag("button")
                .id("bump")
                .on("click", move |_| set.set(count + 1))
                .child(count),
        )
        .into()
}

fn page(cx: &mut Scope<'_>, _: &()) -> Element {
    let (open, set) = cx.use_state(|| true);
    h::tag("main")
        .child("before")
        .child(open.then(|| h::component(modal, "Hello")))
        .child("after")
        .child(
            h::tag("button")
                .id("toggle")
                .on("click", move |_| set.set(!open))
                .child("toggle"),
        )
        .into()
}

#[test]
fn portal_output_lands_in_the_target() {
    run_test_harness(|harness| {
        let overlay = harness.add_container("overlay");
        harness.mount(h::component(page, ())).expect("mount");

        assert_eq!(harness.count("#overlay > .modal"), 1);
        assert_eq!(harness.count("main .modal"), 0);
        assert_eq!(harness.text("main").expect("main"), "beforeaftertoggle");
        assert_eq!(
            harness.document().inner_html(overlay),
            r#"<div class="modal"><h2>Hello</h2><button id="bump">0</button></div>"#
        );
    });
}

#[test]
fn portal_updates_in_place() {
    run_test_harness(|harness| {
        let overlay = harness.add_container("overlay");
        harness.mount(h::component(page, ())).expect("mount");

        harness.click("#bump").expect("click");
        harness.run_all_timers().expect("flush");
        assert_eq!(harness.text("#bump").expect("#bump"), "1");
        assert_eq!(harness.document().children(overlay).len(), 1);
    });
}

#[test]
fn closing_the_portal_empties_the_target() {
    run_test_harness(|harness| {
        let overlay = harness.add_container("overlay");
        harness.mount(h::component(page, ())).expect("mount");

        harness.click("#toggle").expect("click");
        harness.run_all_timers().expect("flush");
        assert_eq!(harness.document().inner_html(overlay), "");
        assert_eq!(harness.text("main").expect("main"), "beforeaftertoggle");

        harness.click("#toggle").expect("click");
        harness.run_all_timers().expect("flush");
        assert_eq!(harness.count("#overlay > .modal"), 1);
        assert_eq!(harness.text("#bump").expect("#bump"), "0");
    });
}

#[test]
fn unmounting_clears_portal_content() {
    fn tracked(cx: &mut Scope<'_>, gone: &Rc<Cell<bool>>) -> Element {
        cx.use_portal("#overlay");
        let gone = gone.clone();
        cx.use_unmount_effect(move || gone.set(true));
        h::tag("aside").child("floating").into()
    }

    run_test_harness(|harness| {
        let overlay = harness.add_container("overlay");
        let gone = Rc::new(Cell::new(false));
        harness.mount(h::component(tracked, gone.clone())).expect("mount");
        assert_eq!(harness.document().inner_html(overlay), "<aside>floating</aside>");

        harness.unmount().expect("unmount");
        assert!(gone.get());
        assert_eq!(harness.document().inner_html(overlay), "");
        assert_eq!(harness.inner_html(), "");
    });
}

#[test]
fn missing_portal_target_fails_the_mount() {
    run_test_harness(|harness| {
        let result = harness.mount(h::component(modal, "lost"));
        assert_eq!(
            result,
            Err(RuntimeError::PortalTargetNotFound {
                selector: "#overlay".to_string()
            })
        );
    });
}
