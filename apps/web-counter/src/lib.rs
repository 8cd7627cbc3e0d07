//! Counter demo for the browser host.
//!
//! Expects a page with `<div id="app">` and `<div id="toasts">`; see
//! `index.html` next to this crate's manifest.

use std::cell::RefCell;

use sprig_core::{create_context, deps, h, Context, EffectPhase, Element, Mount, Scope, Setter};
use wasm_bindgen::prelude::*;

thread_local! {
    static MOUNTED: RefCell<Option<Mount>> = const { RefCell::new(None) };
    static STEP: Context<i32> = create_context(1);
}

fn step_context() -> Context<i32> {
    STEP.with(Clone::clone)
}

fn step_button(cx: &mut Scope<'_>, props: &(&'static str, i32, Setter<i32>)) -> Element {
    let (label, sign, set) = props.clone();
    let step = cx.read_context(&step_context());
    h::tag("button")
        .class("step")
        .on("click", move |_| set.update(|count| count + sign * step))
        .child(format!("{label}{step}"))
        .into()
}

fn toast(cx: &mut Scope<'_>, count: &i32) -> Element {
    cx.use_portal("#toasts");
    h::tag("div")
        .class("toast")
        .child(format!("Reached {count}!"))
        .into()
}

fn counter(cx: &mut Scope<'_>, _: &()) -> Element {
    let (count, set_count) = cx.use_state(|| 0);
    let (step, set_step) = cx.use_state(|| 1);
    cx.write_context(&step_context(), step);

    cx.use_effect(EffectPhase::AfterRender, deps![count], move || {
        log::info!("count is now {count}");
    });

    h::tag("section")
        .class("counter")
        .child(h::tag("h1").child(count))
        .child(h::component(step_button, ("-", -1, set_count.clone())))
        .child(h::component(step_button, ("+", 1, set_count)))
        .child(
            h::tag("label")
                .child("step ")
                .child(
                    h::tag("input")
                        .prop("type", "number")
                        .prop("value", step)
                        .on("input", move |event| {
                            let parsed = event.value.as_deref().and_then(|v| v.parse().ok());
                            match parsed {
                                Some(step) => set_step.set(step),
                                None => log::warn!("ignoring step {:?}", event.value),
                            }
                        }),
                ),
        )
        .child((count != 0 && count % 10 == 0).then(|| h::component(toast, count)))
        .into()
}

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    #[cfg(target_arch = "wasm32")]
    {
        console_error_panic_hook::set_once();
        wasm_logger::init(wasm_logger::Config::default());
    }

    let mount = sprig_platform_web::mount_to(h::component(counter, ()), "#app")
        .map_err(|err| JsValue::from_str(&err.to_string()))?;
    MOUNTED.with(|slot| slot.replace(Some(mount)));
    Ok(())
}

/// Tears the counter down, running its unmount callbacks.
#[wasm_bindgen]
pub fn stop() -> Result<(), JsValue> {
    match MOUNTED.with(RefCell::take) {
        Some(mount) => mount
            .unmount()
            .map_err(|err| JsValue::from_str(&err.to_string())),
        None => Ok(()),
    }
}
