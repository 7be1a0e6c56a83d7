//! Deadline callbacks for idle sessions and stalled passive accepts.
//!
//! One scheduler serves the whole process: a min-heap of `(deadline, token)`
//! entries plus a single waiter task that sleeps until the nearest deadline
//! and fires whatever is due. Timers are addressed by token; a reset pushes a
//! fresh heap entry and the superseded one is skipped when it surfaces.
//! Callbacks run outside the lock, so a callback may reschedule freely.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{self, Instant};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TimerToken(u64);

type Callback = Arc<dyn Fn() + Send + Sync>;

struct Slot {
    callback: Callback,
    deadline: Option<Instant>,
}

#[derive(Default)]
struct State {
    heap: BinaryHeap<Reverse<(Instant, u64)>>,
    slots: HashMap<u64, Slot>,
    next_token: u64,
}

struct Inner {
    state: Mutex<State>,
    wake: Notify,
}

#[derive(Clone)]
pub struct TimeoutScheduler {
    inner: Arc<Inner>,
}

impl TimeoutScheduler {
    /// Create the scheduler and start its waiter task.
    pub fn new() -> Self {
        let inner = Arc::new(Inner {
            state: Mutex::new(State::default()),
            wake: Notify::new(),
        });
        tokio::spawn(waiter(Arc::clone(&inner)));
        Self { inner }
    }

    /// Register a callback to fire once after `delay`. The timer stays
    /// registered after firing and can be re-armed with `reset`.
    pub fn schedule<F>(&self, delay: Duration, callback: F) -> TimerToken
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut state = self.inner.state.lock().unwrap();
        let token = state.next_token;
        state.next_token += 1;
        let deadline = Instant::now() + delay;
        state.slots.insert(
            token,
            Slot {
                callback: Arc::new(callback),
                deadline: Some(deadline),
            },
        );
        state.heap.push(Reverse((deadline, token)));
        drop(state);
        self.inner.wake.notify_one();
        TimerToken(token)
    }

    /// Move a timer's deadline. A zero delay disarms it without removing it.
    pub fn reset(&self, token: TimerToken, delay: Duration) {
        let mut state = self.inner.state.lock().unwrap();
        match state.slots.get_mut(&token.0) {
            Some(slot) if delay.is_zero() => {
                slot.deadline = None;
            }
            Some(slot) => {
                let deadline = Instant::now() + delay;
                slot.deadline = Some(deadline);
                state.heap.push(Reverse((deadline, token.0)));
            }
            None => return,
        }
        drop(state);
        self.inner.wake.notify_one();
    }

    /// Remove a timer entirely.
    pub fn cancel(&self, token: TimerToken) {
        let mut state = self.inner.state.lock().unwrap();
        state.slots.remove(&token.0);
        drop(state);
        self.inner.wake.notify_one();
    }
}

async fn waiter(inner: Arc<Inner>) {
    loop {
        match next_deadline(&inner) {
            Some(deadline) => {
                tokio::select! {
                    _ = time::sleep_until(deadline) => {
                        for callback in take_due(&inner) {
                            callback();
                        }
                    }
                    _ = inner.wake.notified() => {}
                }
            }
            None => inner.wake.notified().await,
        }
    }
}

/// Nearest live deadline, discarding superseded heap entries on the way.
fn next_deadline(inner: &Inner) -> Option<Instant> {
    let mut state = inner.state.lock().unwrap();
    loop {
        let &Reverse((when, token)) = state.heap.peek()?;
        let live = state
            .slots
            .get(&token)
            .map_or(false, |slot| slot.deadline == Some(when));
        if live {
            return Some(when);
        }
        state.heap.pop();
    }
}

fn take_due(inner: &Inner) -> Vec<Callback> {
    let now = Instant::now();
    let mut due = Vec::new();
    let mut state = inner.state.lock().unwrap();
    while let Some(&Reverse((when, token))) = state.heap.peek() {
        if when > now {
            break;
        }
        state.heap.pop();
        if let Some(slot) = state.slots.get_mut(&token) {
            if slot.deadline == Some(when) {
                slot.deadline = None;
                due.push(Arc::clone(&slot.callback));
            }
        }
    }
    due
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    fn counting(hits: &Arc<AtomicUsize>) -> impl Fn() + Send + Sync + 'static {
        let hits = Arc::clone(hits);
        move || {
            hits.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn fires_once_after_the_delay() {
        let scheduler = TimeoutScheduler::new();
        let hits = Arc::new(AtomicUsize::new(0));
        scheduler.schedule(Duration::from_millis(50), counting(&hits));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        sleep(Duration::from_millis(150)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reset_postpones_the_deadline() {
        let scheduler = TimeoutScheduler::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let token = scheduler.schedule(Duration::from_millis(80), counting(&hits));
        sleep(Duration::from_millis(30)).await;
        scheduler.reset(token, Duration::from_millis(200));
        sleep(Duration::from_millis(100)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0, "superseded deadline fired");
        sleep(Duration::from_millis(200)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_delay_disarms_without_removing() {
        let scheduler = TimeoutScheduler::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let token = scheduler.schedule(Duration::from_millis(30), counting(&hits));
        scheduler.reset(token, Duration::ZERO);
        sleep(Duration::from_millis(100)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        scheduler.reset(token, Duration::from_millis(30));
        sleep(Duration::from_millis(100)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_removes_the_timer() {
        let scheduler = TimeoutScheduler::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let token = scheduler.schedule(Duration::from_millis(30), counting(&hits));
        scheduler.cancel(token);
        scheduler.reset(token, Duration::from_millis(10));
        sleep(Duration::from_millis(80)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn timers_fire_in_deadline_order() {
        let scheduler = TimeoutScheduler::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let slow = Arc::clone(&order);
        let fast = Arc::clone(&order);
        scheduler.schedule(Duration::from_millis(80), move || {
            slow.lock().unwrap().push("slow");
        });
        scheduler.schedule(Duration::from_millis(20), move || {
            fast.lock().unwrap().push("fast");
        });
        sleep(Duration::from_millis(200)).await;
        assert_eq!(*order.lock().unwrap(), vec!["fast", "slow"]);
    }
}
