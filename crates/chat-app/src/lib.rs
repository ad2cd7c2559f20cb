#![deny(unsafe_code)]

/// Terminal client loop.
pub mod app;
/// Conversation domain: timers, reply streaming and the controller.
pub mod chat;
pub mod clipboard;
pub mod error;
/// Settings persistence.
pub mod settings;
pub mod terminal;

pub use chat::{ControllerOptions, ConversationController, ReplyTarget, ReplyTiming};
pub use clipboard::{ClipboardError, ClipboardSink, SystemClipboard};
pub use error::{AppError, AppResult};
pub use settings::{ChatSettings, SettingsStore};
