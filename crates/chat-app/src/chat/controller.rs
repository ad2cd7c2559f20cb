use std::sync::Arc;
use std::time::Duration;

use chatbox_reply::{Card, RandomSource, ReplyCatalog, ReplyDirective, ReplyRules};
use chatbox_storage::{
    ActiveChange, KeyValueStore, Message, MessageId, MessageKind, MessageRole, MessageStatus,
    Session, SessionId, SessionRegistry, SessionStateStore, title_from_first_message,
};

use super::reveal::{DEFAULT_REVEAL_INTERVAL, RevealEngine};
use super::timer::{FiredTimer, ReplyTarget, TimerJob, TimerQueue};
use crate::clipboard::ClipboardSink;

pub const DEFAULT_THINKING_DELAY: Duration = Duration::from_millis(2_000);

/// Matches the input box limit of the chat surface.
pub const DEFAULT_MAX_DRAFT_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyTiming {
    /// Pause between the loading placeholder and classification.
    pub thinking_delay: Duration,
    /// Pause between two revealed characters.
    pub reveal_interval: Duration,
}

impl Default for ReplyTiming {
    fn default() -> Self {
        Self {
            thinking_delay: DEFAULT_THINKING_DELAY,
            reveal_interval: DEFAULT_REVEAL_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerOptions {
    pub timing: ReplyTiming,
    pub max_draft_chars: usize,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            timing: ReplyTiming::default(),
            max_draft_chars: DEFAULT_MAX_DRAFT_CHARS,
        }
    }
}

/// Orchestrates sessions, the live transcript and deferred reply production.
///
/// Everything runs on the caller's thread. Operations return immediately;
/// replies appear as the owner advances time with [`ConversationController::advance_to`].
pub struct ConversationController {
    registry: SessionRegistry,
    state: SessionStateStore,
    rules: ReplyRules,
    random: Box<dyn RandomSource>,
    timers: TimerQueue,
    reveal: RevealEngine,
    options: ControllerOptions,
    next_message_sequence: u64,
}

impl ConversationController {
    pub fn new(
        storage: Arc<dyn KeyValueStore>,
        catalog: Arc<ReplyCatalog>,
        random: Box<dyn RandomSource>,
        options: ControllerOptions,
    ) -> Self {
        let initial_messages = catalog.initial_messages.clone();
        let registry = SessionRegistry::bootstrap(storage.clone(), initial_messages.clone());
        let state =
            SessionStateStore::open(storage, initial_messages, registry.active_id().clone());

        let mut controller = Self {
            registry,
            state,
            rules: ReplyRules::new(catalog),
            random,
            timers: TimerQueue::new(),
            reveal: RevealEngine::new(options.timing.reveal_interval),
            options,
            next_message_sequence: 1,
        };
        controller.reserve_loaded_message_ids();
        tracing::info!(
            "conversation ready with {} sessions, active {}",
            controller.registry.list_sessions().len(),
            controller.registry.active_id()
        );
        controller
    }

    pub fn sessions(&self) -> &[Session] {
        self.registry.list_sessions()
    }

    pub fn active_session_id(&self) -> &SessionId {
        self.registry.active_id()
    }

    pub fn active_session(&self) -> Option<&Session> {
        self.registry.active_session()
    }

    pub fn messages(&self) -> &[Message] {
        &self.state.live().messages
    }

    pub fn draft(&self) -> &str {
        &self.state.live().draft
    }

    pub fn pinned(&self) -> bool {
        self.state.live().pinned
    }

    pub fn catalog(&self) -> &ReplyCatalog {
        self.rules.catalog()
    }

    pub fn find_card(&self, card_id: &str) -> Option<&Card> {
        self.catalog().find_card(card_id)
    }

    pub fn timing(&self) -> ReplyTiming {
        self.options.timing
    }

    /// New delays apply to replies started afterwards.
    pub fn set_timing(&mut self, timing: ReplyTiming) {
        self.options.timing = timing;
        self.reveal.set_interval(timing.reveal_interval);
    }

    pub fn now(&self) -> Duration {
        self.timers.now()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    pub fn has_pending_work(&self) -> bool {
        !self.timers.is_empty()
    }

    /// Appends the user message and a loading placeholder, then schedules the reply.
    ///
    /// Blank input is ignored and longer input is cut to the draft limit.
    /// Returns the placeholder the reply will stream into.
    pub fn submit_message(&mut self, text: &str) -> Option<ReplyTarget> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let text = match text.char_indices().nth(self.options.max_draft_chars) {
            Some((end, _)) => &text[..end],
            None => text,
        };

        let session_id = self.registry.active_id().clone();
        let first_user_message = !self.state.live().has_user_message();

        self.state.update(|state| state.pinned = true);
        if first_user_message {
            self.registry
                .rename_session(&session_id, &title_from_first_message(text));
        }

        let user_message = Message::user(self.allocate_message_id(), text);
        self.state.update(|state| state.messages.push(user_message));
        self.state.update(|state| state.draft.clear());

        let placeholder_id = self.allocate_message_id();
        let placeholder = Message::assistant_loading(placeholder_id.clone());
        self.state.update(|state| state.messages.push(placeholder));

        let target = ReplyTarget::new(session_id, placeholder_id);
        self.timers.schedule_after(
            self.options.timing.thinking_delay,
            TimerJob::Think {
                target: target.clone(),
                input: text.to_string(),
            },
        );
        tracing::debug!("queued reply {:?}", target);
        Some(target)
    }

    /// Submits whatever is in the draft box.
    pub fn submit_draft(&mut self) -> Option<ReplyTarget> {
        let draft = self.draft().to_string();
        self.submit_message(&draft)
    }

    pub fn set_draft(&mut self, text: &str) {
        let draft = text
            .chars()
            .take(self.options.max_draft_chars)
            .collect::<String>();
        self.state.update(|state| state.draft = draft);
    }

    pub fn create_session(&mut self) -> SessionId {
        let (created, change) = self.registry.create_session();
        self.apply_active_change(&change);
        created.id
    }

    pub fn delete_session(&mut self, session_id: &SessionId) {
        let change = self.registry.delete_session(session_id);
        self.apply_active_change(&change);
    }

    pub fn set_active_session(&mut self, session_id: &SessionId) {
        let change = self.registry.set_active_session(session_id);
        self.apply_active_change(&change);
    }

    /// Copies a finished assistant text reply. Failures are logged, never raised.
    pub fn copy_message(&self, message_id: &MessageId, clipboard: &mut dyn ClipboardSink) -> bool {
        let Some(message) = self.state.live().message(message_id) else {
            return false;
        };
        let copyable = message.role == MessageRole::Assistant
            && message.kind == MessageKind::Text
            && message.status == MessageStatus::Sent
            && !message.content.is_empty();
        if !copyable {
            return false;
        }

        match clipboard.copy_text(&message.content) {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!("copy of message {message_id} failed: {error}");
                false
            }
        }
    }

    /// Latest assistant message that [`ConversationController::copy_message`] accepts.
    pub fn last_copyable_message(&self) -> Option<&Message> {
        self.messages().iter().rev().find(|message| {
            message.role == MessageRole::Assistant
                && message.kind == MessageKind::Text
                && message.status == MessageStatus::Sent
                && !message.content.is_empty()
        })
    }

    /// Runs every timer due at or before `now`, in deadline order.
    pub fn advance_to(&mut self, now: Duration) {
        while let Some(fired) = self.timers.pop_due(now) {
            self.dispatch(fired);
        }
        self.timers.advance_clock(now);
    }

    pub fn advance_by(&mut self, delta: Duration) {
        self.advance_to(self.timers.now() + delta);
    }

    fn dispatch(&mut self, fired: FiredTimer) {
        match fired.job {
            TimerJob::Think { target, input } => self.produce_reply(target, &input),
            TimerJob::RevealTick { target } => {
                self.reveal
                    .tick(&target, fired.handle, &mut self.state, &mut self.timers)
            }
        }
    }

    fn produce_reply(&mut self, target: ReplyTarget, input: &str) {
        let still_present = self.state.is_live(&target.session_id)
            && self.state.live().message(&target.message_id).is_some();
        if !still_present {
            tracing::debug!("discarding reply for stale target {:?}", target);
            return;
        }

        let directive = self.rules.classify(input, self.random.as_mut());
        tracing::debug!(?directive, "classified reply");

        match directive {
            ReplyDirective::Card { card_id } => {
                self.state
                    .update_message(&target.session_id, &target.message_id, |message| {
                        if message.status != MessageStatus::Loading {
                            return;
                        }
                        message.kind = MessageKind::Card;
                        message.status = MessageStatus::Sent;
                        message.card_id = Some(card_id);
                        message.content.clear();
                    });
            }
            ReplyDirective::Text { text } => {
                self.reveal
                    .start(target, text, &mut self.state, &mut self.timers);
            }
        }
    }

    fn apply_active_change(&mut self, change: &ActiveChange) {
        if let Some(session_id) = change.target() {
            self.state.activate(session_id);
            self.reserve_loaded_message_ids();
            tracing::info!("switched to session {session_id}");
        }
    }

    fn allocate_message_id(&mut self) -> MessageId {
        let id = MessageId::from_sequence(self.next_message_sequence);
        self.next_message_sequence += 1;
        id
    }

    /// Keeps new ids clear of `m<n>` ids persisted by earlier runs.
    fn reserve_loaded_message_ids(&mut self) {
        if let Some(max) = self.state.live().max_message_sequence() {
            self.next_message_sequence = self.next_message_sequence.max(max + 1);
        }
    }
}
