use streamdeck_lib::TopicId;

use crate::controller::Tick;

/// Published from background threads (tick thread, long-press timer) so the
/// work lands back on the plugin's event thread.
/// Subscribed by `CounterAction`, which filters on `ctx_id`.
pub const COUNTER_EVENT: TopicId<CounterEvent> = TopicId::new("counter_event");

#[derive(Clone, Debug)]
pub struct CounterEvent {
    pub ctx_id: String,
    pub kind: CounterEventKind,
}

#[derive(Clone, Copy, Debug)]
pub enum CounterEventKind {
    /// The counter's timer fired.
    Tick(Tick),
    /// The key has been held for the long-press duration. Carries the press id.
    LongPress(u64),
}
