/// Conversation orchestration over sessions, rules and deferred replies.
pub mod controller;
/// Character-by-character streaming of assistant replies.
pub mod reveal;
pub mod timer;

pub use controller::{
    ControllerOptions, ConversationController, DEFAULT_MAX_DRAFT_CHARS, DEFAULT_THINKING_DELAY,
    ReplyTiming,
};
pub use reveal::{DEFAULT_REVEAL_INTERVAL, RevealEngine};
pub use timer::{FiredTimer, ReplyTarget, TimerHandle, TimerJob, TimerQueue};
