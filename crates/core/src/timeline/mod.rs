use std::{cmp::Ordering, collections::BinaryHeap, time::Duration};

/// Monotonic session time. Driven explicitly so that the same session can
/// run against a wall clock or in virtual time.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionClock {
    now: Duration,
}

impl SessionClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn reset(&mut self) {
        self.now = Duration::ZERO;
    }

    pub fn advance(&mut self, delta: Duration) -> Duration {
        self.now += delta;
        self.now
    }

    /// Moves the clock to `time`; never goes backwards.
    pub fn advance_to(&mut self, time: Duration) -> Duration {
        self.now = self.now.max(time);
        self.now
    }
}

/// Handle returned by [`Scheduler::schedule_at`], used for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

#[derive(Debug, Clone)]
pub struct ScheduledEvent<T> {
    pub id: TimerId,
    pub due: Duration,
    pub task: T,
}

// Reversed so that `BinaryHeap` pops the earliest due time first, and the
// earliest scheduled among equal due times.
impl<T> Ord for ScheduledEvent<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.id.0.cmp(&self.id.0))
    }
}

impl<T> PartialOrd for ScheduledEvent<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> PartialEq for ScheduledEvent<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for ScheduledEvent<T> {}

/// Cooperative single-threaded timer queue. Nothing runs on its own: the owner
/// pops due events and executes them.
#[derive(Debug)]
pub struct Scheduler<T> {
    events: BinaryHeap<ScheduledEvent<T>>,
    next_id: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            events: BinaryHeap::new(),
            next_id: 0,
        }
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_at(&mut self, due: Duration, task: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.events.push(ScheduledEvent { id, due, task });
        id
    }

    pub fn schedule_after(&mut self, now: Duration, delay: Duration, task: T) -> TimerId {
        self.schedule_at(now + delay, task)
    }

    /// Removes a pending event. Returns `false` if it already fired or was
    /// never scheduled here.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.events.len();
        self.events.retain(|event| event.id != id);
        self.events.len() != before
    }

    /// Keeps only the pending events for which `keep` returns `true`.
    pub fn retain(&mut self, mut keep: impl FnMut(&ScheduledEvent<T>) -> bool) {
        self.events.retain(|event| keep(event));
    }

    pub fn next_due(&self) -> Option<Duration> {
        self.events.peek().map(|event| event.due)
    }

    /// Pops the earliest event if it is due at or before `now`.
    pub fn pop_due(&mut self, now: Duration) -> Option<ScheduledEvent<T>> {
        if self.next_due()? <= now {
            self.events.pop()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
