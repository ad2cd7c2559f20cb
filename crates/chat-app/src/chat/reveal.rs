use std::collections::HashMap;
use std::time::Duration;

use chatbox_storage::{MessageStatus, SessionStateStore};

use super::timer::{ReplyTarget, TimerHandle, TimerJob, TimerQueue};

/// Default pause between two revealed characters.
pub const DEFAULT_REVEAL_INTERVAL: Duration = Duration::from_millis(40);

#[derive(Debug)]
struct ActiveReveal {
    text: String,
    total_chars: usize,
    revealed_chars: usize,
    handle: TimerHandle,
}

impl ActiveReveal {
    fn prefix(&self) -> &str {
        let end = self
            .text
            .char_indices()
            .nth(self.revealed_chars)
            .map_or(self.text.len(), |(index, _)| index);
        &self.text[..end]
    }

    fn is_complete(&self) -> bool {
        self.revealed_chars >= self.total_chars
    }
}

/// Drives the character-by-character reveal of assistant replies.
///
/// Each outstanding reveal owns exactly one repeating timer. Ticks whose target
/// is no longer in the live session drop the reveal and cancel its timer.
#[derive(Debug)]
pub struct RevealEngine {
    interval: Duration,
    active: HashMap<ReplyTarget, ActiveReveal>,
}

impl Default for RevealEngine {
    fn default() -> Self {
        Self::new(DEFAULT_REVEAL_INTERVAL)
    }
}

impl RevealEngine {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            active: HashMap::new(),
        }
    }

    /// Applies to reveals started afterwards.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    pub fn is_revealing(&self, target: &ReplyTarget) -> bool {
        self.active.contains_key(target)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Switches the target to `typing` with empty content and arms its tick timer.
    ///
    /// Returns false when the target is already revealing, already sent, or stale.
    pub fn start(
        &mut self,
        target: ReplyTarget,
        text: String,
        store: &mut SessionStateStore,
        timers: &mut TimerQueue,
    ) -> bool {
        if self.is_revealing(&target) {
            return false;
        }

        let finished_immediately = text.is_empty();
        let started = store.update_message(&target.session_id, &target.message_id, |message| {
            if !message.status.can_advance_to(MessageStatus::Typing)
                || message.status == MessageStatus::Sent
            {
                return false;
            }
            message.content.clear();
            message.status = if finished_immediately {
                MessageStatus::Sent
            } else {
                MessageStatus::Typing
            };
            true
        });

        if started != Some(true) {
            tracing::debug!("skipping reveal into stale target {:?}", target);
            return false;
        }
        if finished_immediately {
            return true;
        }

        let handle = timers.schedule_repeating(
            self.interval,
            TimerJob::RevealTick {
                target: target.clone(),
            },
        );
        let total_chars = text.chars().count();
        self.active.insert(
            target,
            ActiveReveal {
                text,
                total_chars,
                revealed_chars: 0,
                handle,
            },
        );
        true
    }

    /// Reveals one more character. `handle` is the timer that fired.
    pub fn tick(
        &mut self,
        target: &ReplyTarget,
        handle: TimerHandle,
        store: &mut SessionStateStore,
        timers: &mut TimerQueue,
    ) {
        let Some(reveal) = self.active.get_mut(target) else {
            timers.cancel(handle);
            return;
        };

        reveal.revealed_chars += 1;
        let complete = reveal.is_complete();
        let prefix = reveal.prefix().to_string();

        let applied = store.update_message(&target.session_id, &target.message_id, |message| {
            if message.status != MessageStatus::Typing || prefix.len() < message.content.len() {
                return false;
            }
            message.content = prefix;
            if complete {
                message.status = MessageStatus::Sent;
            }
            true
        });

        match applied {
            Some(true) if !complete => {}
            Some(true) => {
                tracing::debug!("reveal finished for {}", target.message_id);
                self.stop(target, timers);
            }
            Some(false) | None => {
                tracing::debug!("dropping reveal for stale target {:?}", target);
                self.stop(target, timers);
            }
        }
    }

    fn stop(&mut self, target: &ReplyTarget, timers: &mut TimerQueue) {
        if let Some(reveal) = self.active.remove(target) {
            timers.cancel(reveal.handle);
        }
    }
}
