//! The counter state machine.
//!
//! `CounterController` lives on the UI context. Its tick source runs
//! elsewhere and never touches the controller directly: every tick is handed
//! to a [`TickSink`], which is responsible for getting it back onto the UI
//! context, where [`CounterController::handle_tick`] applies it.

use std::mem;
use std::sync::{Arc, mpsc};
use std::time::Duration;

use tracing::{debug, info, trace};

use crate::relay::Relay;
use crate::ticker::{TickHandle, TickSource};

pub const DEFAULT_PERIOD: Duration = Duration::from_secs(1);
/// Shortest accepted tick period. Shorter periods are raised to this.
pub const MIN_PERIOD: Duration = Duration::from_millis(50);

/// One timer firing. `epoch` identifies the `start` that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tick {
    pub epoch: u64,
}

/// Marshals ticks from the timer onto the UI context.
pub trait TickSink: Send + Sync {
    fn deliver(&self, tick: Tick);
}

impl TickSink for mpsc::Sender<Tick> {
    fn deliver(&self, tick: Tick) {
        // The receiving side going away just means nobody is counting anymore.
        let _ = self.send(tick);
    }
}

#[derive(Debug)]
enum RunState {
    Stopped,
    Running(TickHandle),
}

pub struct CounterController {
    relay: Relay<i64>,
    state: RunState,
    // Bumped on every start and stop; ticks from an older epoch are stale.
    epoch: u64,
    period: Duration,
    ticker: Arc<dyn TickSource>,
    sink: Arc<dyn TickSink>,
}

impl CounterController {
    pub fn new(ticker: Arc<dyn TickSource>, sink: Arc<dyn TickSink>) -> Self {
        Self {
            relay: Relay::new(0),
            state: RunState::Stopped,
            epoch: 0,
            period: DEFAULT_PERIOD,
            ticker,
            sink,
        }
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = clamp_period(period);
        self
    }

    /// The relay views bind to.
    pub fn relay(&self) -> &Relay<i64> {
        &self.relay
    }

    pub fn value(&self) -> i64 {
        self.relay.value()
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, RunState::Running(_))
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Change the tick period. A running counter keeps its current cadence;
    /// the new period applies from the next `start`.
    pub fn set_period(&mut self, period: Duration) {
        let period = clamp_period(period);
        if period != self.period {
            debug!(?period, running = self.is_running(), "counter period changed");
            self.period = period;
        }
    }

    pub fn start(&mut self) {
        if self.is_running() {
            debug!("counter already running");
            return;
        }
        self.epoch = self.epoch.wrapping_add(1);
        let tick = Tick { epoch: self.epoch };
        let sink = Arc::clone(&self.sink);
        let handle = self
            .ticker
            .every(self.period, Box::new(move || sink.deliver(tick)));
        self.state = RunState::Running(handle);
        info!(epoch = self.epoch, period = ?self.period, "counter started");
    }

    pub fn stop(&mut self) {
        match mem::replace(&mut self.state, RunState::Stopped) {
            RunState::Running(handle) => {
                handle.cancel();
                // Close the epoch so a tick already on its way is discarded.
                self.epoch = self.epoch.wrapping_add(1);
                info!(value = self.value(), "counter stopped");
            }
            RunState::Stopped => debug!("counter already stopped"),
        }
    }

    pub fn toggle(&mut self) {
        if self.is_running() {
            self.stop();
        } else {
            self.start();
        }
    }

    /// Set the value back to 0. Running state and tick cadence are unchanged.
    pub fn reset(&mut self) {
        self.relay.accept(0);
        debug!(running = self.is_running(), "counter reset");
    }

    /// Apply a tick delivered through the sink. Returns whether it counted.
    pub fn handle_tick(&mut self, tick: Tick) -> bool {
        if !self.is_running() || tick.epoch != self.epoch {
            trace!(tick = tick.epoch, live = self.epoch, "stale tick dropped");
            return false;
        }
        let next = self.relay.value().saturating_add(1);
        self.relay.accept(next);
        trace!(value = next, "tick");
        true
    }
}

fn clamp_period(period: Duration) -> Duration {
    if period < MIN_PERIOD {
        debug!(?period, min = ?MIN_PERIOD, "tick period raised to minimum");
        return MIN_PERIOD;
    }
    period
}

impl Drop for CounterController {
    fn drop(&mut self) {
        self.stop();
        self.relay.close();
    }
}
