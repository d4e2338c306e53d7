use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
struct IntervalTask<K> {
    key: K,
    interval: Duration,
    next_due: Instant,
}

/// Repeating interval timers keyed by `K`, polled cooperatively by whatever
/// event loop owns it. Nothing runs on its own; [`Scheduler::due`] reports
/// which tasks should run now.
#[derive(Clone, Debug)]
pub struct Scheduler<K> {
    tasks: Vec<IntervalTask<K>>,
}

impl<K: Copy + Eq> Default for Scheduler<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Copy + Eq> Scheduler<K> {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Schedules `key` to fire every `interval`, first at `now + interval`.
    /// Returns `false` if `key` is already scheduled.
    pub fn schedule_interval(&mut self, key: K, interval: Duration, now: Instant) -> bool {
        if self.is_scheduled(key) {
            return false;
        }
        self.tasks.push(IntervalTask {
            key,
            interval,
            next_due: now + interval,
        });
        true
    }

    pub fn unschedule(&mut self, key: K) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.key != key);
        self.tasks.len() != before
    }

    pub fn is_scheduled(&self, key: K) -> bool {
        self.tasks.iter().any(|task| task.key == key)
    }

    /// Tasks due at `now`, earliest deadline first. Each due task fires once
    /// per call even if several intervals have elapsed; a task that fell
    /// behind is re-armed relative to `now`.
    pub fn due(&mut self, now: Instant) -> Vec<K> {
        let mut fired: Vec<(Instant, K)> = Vec::new();
        for task in &mut self.tasks {
            if task.next_due > now {
                continue;
            }
            fired.push((task.next_due, task.key));
            task.next_due += task.interval;
            if task.next_due <= now {
                task.next_due = now + task.interval;
            }
        }
        fired.sort_by_key(|(deadline, _)| *deadline);
        fired.into_iter().map(|(_, key)| key).collect()
    }
}
