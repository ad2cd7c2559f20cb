use std::collections::BTreeMap;
use std::time::Duration;

use chatbox_storage::{MessageId, SessionId};

/// Assistant message a deferred job writes into, pinned to its session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReplyTarget {
    pub session_id: SessionId,
    pub message_id: MessageId,
}

impl ReplyTarget {
    pub fn new(session_id: SessionId, message_id: MessageId) -> Self {
        Self {
            session_id,
            message_id,
        }
    }
}

/// Deferred work the conversation loop knows how to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerJob {
    /// The "thinking" delay elapsed; classify `input` and start the reply.
    Think { target: ReplyTarget, input: String },
    /// Reveal one more character of the reply streaming into `target`.
    RevealTick { target: ReplyTarget },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredTimer {
    pub handle: TimerHandle,
    pub job: TimerJob,
}

#[derive(Debug)]
struct ScheduledTimer {
    interval: Option<Duration>,
    job: TimerJob,
}

/// Timer queue over a virtual timeline.
///
/// Time only moves when the owner calls [`TimerQueue::pop_due`] or
/// [`TimerQueue::advance_clock`], so tests step through delays without sleeping
/// and the binary maps wall-clock elapsed time onto the same timeline.
/// Timers with equal deadlines fire in scheduling order.
#[derive(Debug, Default)]
pub struct TimerQueue {
    now: Duration,
    next_handle: u64,
    scheduled: BTreeMap<(Duration, TimerHandle), ScheduledTimer>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn len(&self) -> usize {
        self.scheduled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scheduled.is_empty()
    }

    pub fn schedule_after(&mut self, delay: Duration, job: TimerJob) -> TimerHandle {
        self.insert(self.now + delay, None, job)
    }

    /// First fires one `interval` from now, then every `interval` until cancelled.
    pub fn schedule_repeating(&mut self, interval: Duration, job: TimerJob) -> TimerHandle {
        // A zero interval would re-fire forever inside one pop_due sweep.
        let interval = interval.max(Duration::from_millis(1));
        self.insert(self.now + interval, Some(interval), job)
    }

    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.scheduled.len();
        self.scheduled.retain(|(_, scheduled_handle), _| *scheduled_handle != handle);
        self.scheduled.len() != before
    }

    pub fn is_scheduled(&self, handle: TimerHandle) -> bool {
        self.scheduled
            .keys()
            .any(|(_, scheduled_handle)| *scheduled_handle == handle)
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.scheduled.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Removes the earliest timer due at or before `until` and moves the clock to
    /// its deadline. Repeating timers are re-armed before being returned.
    pub fn pop_due(&mut self, until: Duration) -> Option<FiredTimer> {
        let (&(deadline, handle), _) = self.scheduled.first_key_value()?;
        if deadline > until {
            return None;
        }

        let scheduled = self.scheduled.remove(&(deadline, handle))?;
        self.now = self.now.max(deadline);

        let job = match scheduled.interval {
            Some(interval) => {
                let job = scheduled.job.clone();
                self.scheduled.insert((deadline + interval, handle), scheduled);
                job
            }
            None => scheduled.job,
        };

        Some(FiredTimer { handle, job })
    }

    /// Moves the clock forward without firing anything. Never moves backwards.
    pub fn advance_clock(&mut self, to: Duration) {
        self.now = self.now.max(to);
    }

    fn insert(
        &mut self,
        deadline: Duration,
        interval: Option<Duration>,
        job: TimerJob,
    ) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        self.scheduled
            .insert((deadline, handle), ScheduledTimer { interval, job });
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(message: &str) -> ReplyTarget {
        ReplyTarget::new(SessionId::new("session_a"), MessageId::new(message))
    }

    fn tick(message: &str) -> TimerJob {
        TimerJob::RevealTick {
            target: target(message),
        }
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn one_shot_timers_fire_once_at_deadline() {
        let mut queue = TimerQueue::new();
        let handle = queue.schedule_after(ms(2_000), tick("m1"));

        assert_eq!(queue.pop_due(ms(1_999)), None);
        let fired = queue.pop_due(ms(2_000)).unwrap();
        assert_eq!(fired.handle, handle);
        assert_eq!(queue.now(), ms(2_000));
        assert!(queue.is_empty());
    }

    #[test]
    fn repeating_timers_rearm_until_cancelled() {
        let mut queue = TimerQueue::new();
        let handle = queue.schedule_repeating(ms(40), tick("m2"));

        let mut fired = 0;
        while queue.pop_due(ms(200)).is_some() {
            fired += 1;
        }
        assert_eq!(fired, 5);
        assert_eq!(queue.next_deadline(), Some(ms(240)));

        assert!(queue.cancel(handle));
        assert!(!queue.is_scheduled(handle));
        assert_eq!(queue.pop_due(ms(1_000)), None);
    }

    #[test]
    fn equal_deadlines_fire_in_scheduling_order() {
        let mut queue = TimerQueue::new();
        queue.schedule_after(ms(10), tick("first"));
        queue.schedule_after(ms(10), tick("second"));
        queue.schedule_after(ms(5), tick("earliest"));

        let order = std::iter::from_fn(|| queue.pop_due(ms(10)))
            .map(|fired| match fired.job {
                TimerJob::RevealTick { target } => target.message_id.0,
                TimerJob::Think { .. } => unreachable!(),
            })
            .collect::<Vec<_>>();
        assert_eq!(order, ["earliest", "first", "second"]);
    }

    #[test]
    fn clock_never_moves_backwards() {
        let mut queue = TimerQueue::new();
        queue.advance_clock(ms(100));
        queue.advance_clock(ms(50));
        assert_eq!(queue.now(), ms(100));

        queue.schedule_after(ms(10), tick("m1"));
        assert_eq!(queue.next_deadline(), Some(ms(110)));
    }
}
