use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

use tracing::trace;

/// Something that can call a closure periodically until told to stop.
pub trait TickSource: Send + Sync {
    /// Call `tick` immediately, then once every `period`, until the returned
    /// handle is cancelled or dropped.
    fn every(&self, period: Duration, tick: Box<dyn FnMut() + Send>) -> TickHandle;
}

/// Cancellation token for a running tick source. Dropping it cancels.
#[derive(Debug)]
pub struct TickHandle {
    cancelled: Arc<AtomicBool>,
    waker: Option<Thread>,
}

impl TickHandle {
    pub(crate) fn new(cancelled: Arc<AtomicBool>, waker: Option<Thread>) -> Self {
        Self { cancelled, waker }
    }

    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            if let Some(thread) = &self.waker {
                thread.unpark();
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// One background thread per tick source.
///
/// The thread sleeps with `park_timeout` so a cancel wakes it right away
/// instead of waiting out the period.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadTicker;

impl TickSource for ThreadTicker {
    fn every(&self, period: Duration, mut tick: Box<dyn FnMut() + Send>) -> TickHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let cancel = Arc::clone(&cancelled);

        let worker = thread::spawn(move || {
            let mut deadline = Instant::now();
            loop {
                if cancel.load(Ordering::SeqCst) {
                    break;
                }
                tick();
                deadline += period;

                loop {
                    if cancel.load(Ordering::SeqCst) {
                        trace!("tick thread cancelled");
                        return;
                    }
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    thread::park_timeout(deadline - now);
                }
            }
            trace!("tick thread cancelled");
        });

        TickHandle::new(cancelled, Some(worker.thread().clone()))
    }
}
