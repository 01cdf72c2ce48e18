use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use streamdeck_lib::prelude::*;
use tracing::{debug, info};

use crate::binding::{Immediate, Renderer};
use crate::controller::{CounterController, Tick, TickSink};
use crate::relay::lock;
use crate::render::render_number;
use crate::settings::{CounterSettings, parse_settings};
use crate::ticker::ThreadTicker;
use crate::topics::{COUNTER_EVENT, CounterEvent, CounterEventKind};
use crate::views::{ParentView, RendererFactory};

/// Publishes ticks on the plugin bus so they are applied on the event thread.
struct BusSink {
    cx: Mutex<Context>,
    ctx_id: String,
}

impl TickSink for BusSink {
    fn deliver(&self, tick: Tick) {
        lock(&self.cx).bus().publish_t(
            COUNTER_EVENT,
            CounterEvent {
                ctx_id: self.ctx_id.clone(),
                kind: CounterEventKind::Tick(tick),
            },
        );
    }
}

/// One key = one parent view hosting the counter view.
///
/// Appearing shows the counter, disappearing hides it (which stops it).
/// Short press toggles start/stop, long press resets, and every settings
/// change re-renders the parent.
pub struct CounterAction {
    parent: Option<ParentView>,
    settings: CounterSettings,

    // Long-press tracking
    holding: Arc<AtomicBool>,
    press_seq: u64,
    active_press_id: Arc<AtomicU64>,
    long_fired_press_id: Arc<AtomicU64>,
}

impl Default for CounterAction {
    fn default() -> Self {
        Self {
            parent: None,
            settings: CounterSettings::default(),

            holding: Arc::new(AtomicBool::new(false)),
            press_seq: 0,
            active_press_id: Arc::new(AtomicU64::new(0)),
            long_fired_press_id: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl ActionStatic for CounterAction {
    const ID: &'static str = super::ids::COUNTER;
}

impl Action for CounterAction {
    fn id(&self) -> &str {
        Self::ID
    }

    fn topics(&self) -> &'static [&'static str] {
        &[COUNTER_EVENT.name]
    }

    fn init(&mut self, cx: &Context, ctx_id: &str) {
        self.parent_for(cx, ctx_id);
        cx.sd().get_settings(ctx_id);
    }

    fn did_receive_settings(&mut self, cx: &Context, ev: &incoming::DidReceiveSettings) {
        self.settings = parse_settings(&ev.settings);
        let settings = self.settings.clone();

        let parent = self.parent_for(cx, ev.context);
        configure(parent, &settings);
        parent.update();
        debug!(ctx = ev.context, updates = parent.updates(), "settings applied");
    }

    fn will_appear(&mut self, cx: &Context, ev: &incoming::WillAppear) {
        // The reply to `get_settings` arrives after this, so use the settings
        // that came with the event.
        self.settings = parse_settings(&ev.settings);
        let settings = self.settings.clone();

        let parent = self.parent_for(cx, ev.context);
        appear(parent, &settings);
    }

    fn will_disappear(&mut self, _cx: &Context, _ev: &incoming::WillDisappear) {
        // Leaving the page unmounts the counter view, which stops the counter.
        if let Some(parent) = self.parent.as_mut() {
            parent.hide_counter();
        }
    }

    fn teardown(&mut self, _cx: &Context, ctx_id: &str) {
        self.holding.store(false, Ordering::SeqCst);
        if self.parent.take().is_some() {
            info!(ctx = ctx_id, "counter torn down");
        }
    }

    fn key_down(&mut self, cx: &Context, ev: &incoming::KeyDown) {
        self.settings = parse_settings(&ev.settings);
        self.holding.store(true, Ordering::SeqCst);

        self.press_seq = self.press_seq.wrapping_add(1);
        let pid = self.press_seq;
        self.active_press_id.store(pid, Ordering::SeqCst);
        self.long_fired_press_id.store(0, Ordering::SeqCst);

        let holding = Arc::clone(&self.holding);
        let active_id = Arc::clone(&self.active_press_id);
        let fired_id = Arc::clone(&self.long_fired_press_id);
        let cx2 = cx.clone();
        let ctx = ev.context.to_string();
        let long_press = self.settings.long_press();

        std::thread::spawn(move || {
            std::thread::sleep(long_press);

            // Only fire if still holding AND this is still the active press
            if !holding.load(Ordering::SeqCst) {
                return;
            }
            if active_id.load(Ordering::SeqCst) != pid {
                return;
            }

            fired_id.store(pid, Ordering::SeqCst);
            cx2.bus().publish_t(
                COUNTER_EVENT,
                CounterEvent {
                    ctx_id: ctx,
                    kind: CounterEventKind::LongPress(pid),
                },
            );
        });
    }

    fn key_up(&mut self, cx: &Context, ev: &incoming::KeyUp) {
        self.holding.store(false, Ordering::SeqCst);

        let pid = self.active_press_id.load(Ordering::SeqCst);
        if self.long_fired_press_id.load(Ordering::SeqCst) == pid {
            // Long press already handled this
            return;
        }

        let parent = self.parent_for(cx, ev.context);
        if !parent.toggle_running() {
            debug!(ctx = ev.context, "key press while counter hidden");
        }
    }

    fn on_notify(&mut self, cx: &Context, ctx_id: &str, event: &ErasedTopic) {
        let Some(msg) = event.downcast(COUNTER_EVENT) else {
            return;
        };
        if msg.ctx_id != ctx_id {
            return;
        }
        let Some(parent) = self.parent.as_mut() else {
            return;
        };

        match msg.kind {
            CounterEventKind::Tick(tick) => {
                parent.controller_mut().handle_tick(tick);
            }
            CounterEventKind::LongPress(pid) => {
                if pid != self.active_press_id.load(Ordering::SeqCst) {
                    return;
                }
                if !parent.reset() {
                    // Reset is disabled while running (or the counter is hidden).
                    cx.sd().show_alert(ctx_id);
                }
            }
        }
    }
}

impl CounterAction {
    fn parent_for(&mut self, cx: &Context, ctx_id: &str) -> &mut ParentView {
        let settings = &self.settings;
        self.parent
            .get_or_insert_with(|| build_parent(cx, ctx_id, settings))
    }
}

/// Bring the key's period and reset lock in line with `settings`.
fn configure(parent: &mut ParentView, settings: &CounterSettings) {
    parent.controller_mut().set_period(settings.period());
    parent.set_reset_lock(settings.lock_reset_while_running);
}

/// Show the counter, starting it if the key is set to start on appear.
fn appear(parent: &mut ParentView, settings: &CounterSettings) {
    configure(parent, settings);
    parent.show_counter();
    if settings.start_on_appear && !parent.controller().is_running() {
        parent.toggle_running();
    }
}

fn build_parent(cx: &Context, ctx_id: &str, settings: &CounterSettings) -> ParentView {
    let sink = BusSink {
        cx: Mutex::new(cx.clone()),
        ctx_id: ctx_id.to_string(),
    };
    let controller = CounterController::new(Arc::new(ThreadTicker), Arc::new(sink))
        .with_period(settings.period());

    let cx2 = Mutex::new(cx.clone());
    let ctx = ctx_id.to_string();
    let renderer: RendererFactory = Box::new(move || -> Renderer<i64> {
        let cx = lock(&cx2).clone();
        let ctx = ctx.clone();
        Box::new(move |v: &i64| render_number(&cx, &ctx, *v))
    });

    // Key events and bus notifications already arrive on the event thread.
    let mut parent = ParentView::new(controller, Arc::new(Immediate), renderer);
    parent.set_reset_lock(settings.lock_reset_while_running);
    info!(ctx = ctx_id, period = ?settings.period(), "counter created");
    parent
}
