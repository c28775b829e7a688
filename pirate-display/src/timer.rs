//! One-shot and recurring timers, fired on the driver thread.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::{log::trace, signal::Interrupt};

/// Identifies a scheduled timer. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// The work a timer does when it fires.
pub type TimerCallback = Arc<dyn Fn() + Send + Sync>;

struct Entry {
    id: TimerId,
    next_fire: Instant,
    /// Zero for one-shot timers.
    interval: Duration,
    callback: TimerCallback,
}

/// The timer collection itself, without any locking.
///
/// Keeps the earliest `next_fire` cached, so the driver can pick its wait timeout without a scan.
#[derive(Default)]
pub struct TimerSet {
    entries: Vec<Entry>,
    next_id: u64,
    deadline: Option<Instant>,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: TimerId) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }

    /// The earliest time any timer is due.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Schedules `callback` to run `delay` after `now`, and every `interval` after that unless
    /// `interval` is zero.
    pub fn add(
        &mut self,
        delay: Duration,
        interval: Duration,
        callback: TimerCallback,
        now: Instant,
    ) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let next_fire = deadline_after(now, delay);
        self.entries.push(Entry {
            id,
            next_fire,
            interval,
            callback,
        });
        if self.deadline.map_or(true, |deadline| next_fire < deadline) {
            self.deadline = Some(next_fire);
        }
        id
    }

    /// Removes the timer, returning whether it was still scheduled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        let removed = self.entries.len() != before;
        if removed {
            self.recompute_deadline();
        }
        removed
    }

    /// Re-arms a live timer in place, keeping its id. If `id` has already fired or been
    /// cancelled, schedules a new timer instead and returns its id.
    pub fn reschedule(
        &mut self,
        id: TimerId,
        delay: Duration,
        interval: Duration,
        callback: TimerCallback,
        now: Instant,
    ) -> TimerId {
        let Some(entry) = self.entries.iter_mut().find(|entry| entry.id == id) else {
            return self.add(delay, interval, callback, now);
        };
        entry.next_fire = deadline_after(now, delay);
        entry.interval = interval;
        entry.callback = callback;
        self.recompute_deadline();
        id
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.deadline = None;
    }

    /// Collects the callbacks of every timer due at `now`, dropping one-shot timers and moving
    /// recurring ones forward by a single interval.
    pub fn take_due(&mut self, now: Instant) -> Vec<(TimerId, TimerCallback)> {
        if self.deadline.map_or(true, |deadline| deadline > now) {
            return Vec::new();
        }

        let mut due = Vec::new();
        self.entries.retain_mut(|entry| {
            if entry.next_fire > now {
                return true;
            }
            due.push((entry.id, entry.callback.clone()));
            if entry.interval.is_zero() {
                return false;
            }
            entry.next_fire = deadline_after(entry.next_fire, entry.interval);
            true
        });
        self.recompute_deadline();
        due
    }

    fn recompute_deadline(&mut self) {
        self.deadline = self.entries.iter().map(|entry| entry.next_fire).min();
    }
}

/// Saturates far-future deadlines instead of overflowing `Instant`.
fn deadline_after(start: Instant, delay: Duration) -> Instant {
    start
        .checked_add(delay)
        .or_else(|| start.checked_add(Duration::from_secs(u32::MAX as u64)))
        .unwrap_or(start)
}

/// A shareable handle to the driver's timers.
///
/// Every change wakes the driver so it can recompute how long to sleep. Callbacks run on the
/// driver thread, one at a time and never while the timer lock is held, so they may freely add,
/// cancel or reset timers themselves.
#[derive(Clone)]
pub struct Timers {
    inner: Arc<Mutex<TimerSet>>,
    interrupt: Interrupt,
}

impl Timers {
    pub fn new(interrupt: Interrupt) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TimerSet::new())),
            interrupt,
        }
    }

    /// Runs `callback` once, `delay` from now.
    pub fn add_timer<F>(&self, delay: Duration, callback: F) -> TimerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.add(delay, Duration::ZERO, Arc::new(callback))
    }

    /// Runs `callback` every `interval`, starting one `interval` from now.
    ///
    /// A zero `interval` makes this a one-shot timer that fires on the next loop iteration.
    pub fn add_recurrent_timer<F>(&self, interval: Duration, callback: F) -> TimerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.add(interval, interval, Arc::new(callback))
    }

    /// Cancels a timer. Unknown or already fired ids are ignored.
    pub fn cancel_timer(&self, id: TimerId) {
        let removed = self.lock().cancel(id);
        trace!("Cancel {} (live: {})", id, removed);
        if removed {
            self.interrupt.set();
        }
    }

    /// Re-arms `id` as a one-shot timer running `callback` after `delay`.
    ///
    /// Returns `id` if it was still pending, otherwise the id of a freshly scheduled timer.
    pub fn reset_timer<F>(&self, id: TimerId, delay: Duration, callback: F) -> TimerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.reschedule(id, delay, Duration::ZERO, Arc::new(callback))
    }

    /// Like [Timers::reset_timer], but re-arms as a recurring timer with period `interval`.
    pub fn reset_recurrent_timer<F>(&self, id: TimerId, interval: Duration, callback: F) -> TimerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.reschedule(id, interval, interval, Arc::new(callback))
    }

    pub fn clear_timers(&self) {
        self.lock().clear();
        trace!("Cleared all timers");
        self.interrupt.set();
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.lock().next_deadline()
    }

    /// Fires every timer due now, returning how many ran.
    pub fn fire(&self) -> usize {
        let due = self.lock().take_due(Instant::now());
        for (id, callback) in due.iter() {
            trace!("Fire {}", id);
            callback();
        }
        due.len()
    }

    fn add(&self, delay: Duration, interval: Duration, callback: TimerCallback) -> TimerId {
        let id = self
            .lock()
            .add(delay, interval, callback, Instant::now());
        trace!("Add {} in {:?} every {:?}", id, delay, interval);
        self.interrupt.set();
        id
    }

    fn reschedule(
        &self,
        id: TimerId,
        delay: Duration,
        interval: Duration,
        callback: TimerCallback,
    ) -> TimerId {
        let new_id = self
            .lock()
            .reschedule(id, delay, interval, callback, Instant::now());
        trace!("Reset {} as {} in {:?}", id, new_id, delay);
        self.interrupt.set();
        new_id
    }

    fn lock(&self) -> MutexGuard<'_, TimerSet> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
