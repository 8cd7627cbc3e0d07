use std::cell::{Cell, RefCell};
use std::rc::Rc;

use sprig_testing::prelude::*;

#[derive(Clone, Default)]
struct Tracker {
    renders: Rc<Cell<u32>>,
    setter: Rc<RefCell<Option<Setter<i32>>>>,
}

impl Tracker {
    fn setter(&self) -> Setter<i32> {
        self.setter.borrow().clone().expect("setter captured")
    }
}

fn counter(cx: &mut Scope<'_>, tracker: &Tracker) -> Element {
    tracker.renders.set(tracker.renders.get() + 1);
    let (state, set) = cx.use_state(|| 1);
    tracker.setter.replace(Some(set.clone()));
    h::tag("div")
        .class("test")
        .child(h::tag("span").child(state))
        .child(
            h::tag("button")
                .id("click")
                .on("click", move |_| set.set(state + 1))
                .child("Increment"),
        )
        .into()
}

#[test]
fn click_increments_state() {
    run_test_harness(|harness| {
        let tracker = Tracker::default();
        harness.mount(h::component(counter, tracker.clone())).expect("mount");
        harness.run_all_timers().expect("flush");
        assert_eq!(harness.text(".test > span").expect("span"), "1");

        harness.click("#click").expect("click");
        harness.run_all_timers().expect("flush");
        assert_eq!(harness.text(".test > span").expect("span"), "2");
        assert_eq!(tracker.renders.get(), 2);
    });
}

#[test]
fn handlers_see_the_state_of_their_render() {
    run_test_harness(|harness| {
        let tracker = Tracker::default();
        harness.mount(h::component(counter, tracker.clone())).expect("mount");

        // Three clicks on the same rendered button all compute 1 + 1.
        for _ in 0..3 {
            harness.click("#click").expect("click");
        }
        harness.run_all_timers().expect("flush");
        assert_eq!(harness.text(".test > span").expect("span"), "2");
        assert_eq!(tracker.renders.get(), 2);
    });
}

#[test]
fn updater_functions_accumulate_before_a_flush() {
    run_test_harness(|harness| {
        let tracker = Tracker::default();
        harness.mount(h::component(counter, tracker.clone())).expect("mount");
        let set = tracker.setter();
        for _ in 0..4 {
            set.update(|n| n + 1);
        }
        assert_eq!(set.get(), 5);
        assert_eq!(tracker.renders.get(), 1, "updates are deferred");
        assert_eq!(harness.run_all_timers(), Ok(1));
        assert_eq!(harness.text(".test > span").expect("span"), "5");
        assert_eq!(tracker.renders.get(), 2);
    });
}

#[test]
fn equal_values_skip_renders() {
    run_test_harness(|harness| {
        let tracker = Tracker::default();
        harness.mount(h::component(counter, tracker.clone())).expect("mount");
        let set = tracker.setter();

        set.set(2);
        harness.run_all_timers().expect("flush");
        set.set(2);
        assert!(!harness.std_runtime().has_pending());
        set.set(3);
        harness.run_all_timers().expect("flush");

        assert_eq!(tracker.renders.get(), 3);
        assert_eq!(harness.text(".test > span").expect("span"), "3");
    });
}

#[test]
fn setting_back_the_rendered_value_still_flushes() {
    run_test_harness(|harness| {
        let tracker = Tracker::default();
        harness.mount(h::component(counter, tracker.clone())).expect("mount");
        let set = tracker.setter();
        set.set(7);
        set.set(1);
        harness.run_all_timers().expect("flush");
        assert_eq!(harness.text(".test > span").expect("span"), "1");
        assert_eq!(tracker.renders.get(), 2);
    });
}

#[test]
fn setters_outlive_their_instance_harmlessly() {
    run_test_harness(|harness| {
        let tracker = Tracker::default();
        harness.mount(h::component(counter, tracker.clone())).expect("mount");
        let set = tracker.setter();
        harness.unmount().expect("unmount");

        set.set(42);
        assert_eq!(harness.run_all_timers(), Ok(0));
        assert_eq!(tracker.renders.get(), 1);
        assert_eq!(harness.inner_html(), "");
    });
}

#[test]
fn setters_from_a_replaced_tree_leave_the_new_tree_alone() {
    run_test_harness(|harness| {
        let first = Tracker::default();
        harness.mount(h::component(counter, first.clone())).expect("mount");
        let stale = first.setter();

        let second = Tracker::default();
        harness.mount(h::component(counter, second.clone())).expect("remount");
        stale.set(42);
        harness.run_all_timers().expect("flush");
        assert_eq!(second.renders.get(), 1);
        assert_eq!(first.renders.get(), 1);
        assert_eq!(harness.text(".test > span").expect("span"), "1");
    });
}

#[test]
fn mounts_sharing_a_runtime_update_independently() {
    run_test_harness(|harness| {
        let other = harness.add_container("other");
        let (a, b) = (Tracker::default(), Tracker::default());
        let first = sprig_core::mount(
            h::component(counter, a.clone()),
            harness.root(),
            harness.document().clone(),
            harness.runtime(),
        )
        .expect("mount into #root");
        let second = sprig_core::mount(
            h::component(counter, b.clone()),
            other,
            harness.document().clone(),
            harness.runtime(),
        )
        .expect("mount into #other");
        assert_eq!(harness.runtime().mount_count(), 2);

        a.setter().set(5);
        harness.run_all_timers().expect("flush");
        let document = harness.document();
        assert_eq!(document.text_content(harness.root()), "5Increment");
        assert_eq!(document.text_content(other), "1Increment");

        b.setter().set(7);
        a.setter().set(6);
        harness.run_all_timers().expect("flush");
        assert_eq!(document.text_content(harness.root()), "6Increment");
        assert_eq!(document.text_content(other), "7Increment");
        assert_eq!((a.renders.get(), b.renders.get()), (3, 2));

        first.unmount().expect("unmount #root");
        b.setter().set(8);
        harness.run_all_timers().expect("flush");
        assert_eq!(document.text_content(other), "8Increment");
        second.unmount().expect("unmount #other");
        assert_eq!(harness.runtime().mount_count(), 0);
    });
}
