//! End-to-end flow on a real timer thread: ticks and renders are marshaled
//! onto a single "UI thread" (the test thread) through channels.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use streamdeck_relay_counter::binding::{Job, Renderer, UiContext};
use streamdeck_relay_counter::controller::{CounterController, MIN_PERIOD, Tick};
use streamdeck_relay_counter::ticker::ThreadTicker;
use streamdeck_relay_counter::views::{ParentView, RendererFactory};

struct ChannelContext(Mutex<Sender<Job>>);

impl UiContext for ChannelContext {
    fn post(&self, job: Job) {
        let _ = self.0.lock().map(|tx| tx.send(job));
    }
}

struct Ui {
    ticks: Receiver<Tick>,
    jobs: Receiver<Job>,
    rendered: Arc<Mutex<Vec<i64>>>,
    parent: ParentView,
}

impl Ui {
    fn new(period: Duration) -> Self {
        let (tick_tx, ticks) = mpsc::channel();
        let (job_tx, jobs) = mpsc::channel();
        let controller =
            CounterController::new(Arc::new(ThreadTicker), Arc::new(tick_tx)).with_period(period);
        let rendered = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&rendered);
        let renderer: RendererFactory = Box::new(move || -> Renderer<i64> {
            let sink = Arc::clone(&sink);
            Box::new(move |v: &i64| sink.lock().unwrap().push(*v))
        });
        let context = Arc::new(ChannelContext(Mutex::new(job_tx)));
        Self {
            ticks,
            jobs,
            rendered,
            parent: ParentView::new(controller, context, renderer),
        }
    }

    /// Run one pass of the UI loop.
    fn turn(&mut self, wait: Duration) {
        if let Ok(tick) = self.ticks.recv_timeout(wait) {
            self.parent.controller_mut().handle_tick(tick);
        }
        while let Ok(job) = self.jobs.try_recv() {
            job();
        }
    }

    fn rendered(&self) -> Vec<i64> {
        self.rendered.lock().unwrap().clone()
    }
}

#[test]
fn counts_renders_and_stops_cleanly() {
    let mut ui = Ui::new(MIN_PERIOD);
    ui.parent.show_counter();
    ui.turn(Duration::ZERO);
    assert_eq!(ui.rendered(), vec![0]);

    assert!(ui.parent.toggle_running());
    while ui.parent.controller().value() < 3 {
        ui.turn(Duration::from_secs(5));
    }
    ui.parent.toggle_running();
    let stopped_at = ui.parent.controller().value();

    for _ in 0..10 {
        ui.turn(Duration::from_millis(10));
    }
    assert_eq!(ui.parent.controller().value(), stopped_at);

    let rendered = ui.rendered();
    assert_eq!(rendered.last(), Some(&stopped_at));
    assert!(rendered.windows(2).all(|w| w[1] == w[0] + 1));
}

#[test]
fn hiding_mid_run_leaves_no_observers_and_no_timer() {
    let mut ui = Ui::new(MIN_PERIOD);
    ui.parent.show_counter();
    ui.parent.toggle_running();
    ui.turn(Duration::from_secs(5));
    ui.parent.update();
    ui.parent.update();
    assert_eq!(ui.parent.controller().relay().observer_count(), 1);

    ui.parent.hide_counter();
    assert!(!ui.parent.controller().is_running());
    assert_eq!(ui.parent.controller().relay().observer_count(), 0);

    let before = ui.rendered().len();
    for _ in 0..5 {
        ui.turn(Duration::from_millis(10));
    }
    assert_eq!(ui.rendered().len(), before);
    assert_eq!(ui.parent.updates(), 2);
}

#[test]
fn reset_after_stop_renders_zero() {
    let mut ui = Ui::new(MIN_PERIOD);
    ui.parent.show_counter();
    ui.parent.toggle_running();
    while ui.parent.controller().value() < 2 {
        ui.turn(Duration::from_secs(5));
    }
    assert!(!ui.parent.reset());
    ui.parent.toggle_running();
    assert!(ui.parent.reset());
    ui.turn(Duration::ZERO);
    assert_eq!(ui.rendered().last(), Some(&0));
    assert!(!ui.parent.controller().is_running());
}
