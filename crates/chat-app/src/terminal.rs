//! Line-oriented rendering of the live conversation.
//!
//! The surface is append-only: every call to [`TerminalSurface::render`] emits
//! only what changed since the previous call, so a streaming reply shows up as
//! newly revealed characters on the same line.

use std::collections::HashMap;

use chatbox_reply::Card;
use chatbox_storage::{
    DEFAULT_SESSION_TITLE, Message, MessageId, MessageKind, MessageRole, MessageStatus, SessionId,
};
use snafu::{OptionExt, Snafu};

use crate::chat::ConversationController;
use crate::clipboard::ClipboardSink;

pub const HELP_TEXT: &str = "\
commands:
  <text>          send a message
  /draft <text>   keep text in the input box
  /send           send the draft
  /new            start a new chat
  /list           list chats
  /switch <n>     open chat n from /list
  /delete <n>     delete chat n from /list
  /copy           copy the latest finished reply
  /reload         re-read settings
  /help           show this help
  /quit           exit
";

const USER_PREFIX: &str = "you> ";
const ASSISTANT_PREFIX: &str = "bot> ";
const THINKING_MARKER: &str = "thinking...";

#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum CommandError {
    #[snafu(display("unknown command `/{name}` on `{stage}`, try /help"))]
    UnknownCommand { stage: &'static str, name: String },
    #[snafu(display("`/{command}` needs a chat number from /list on `{stage}`"))]
    MissingIndex {
        stage: &'static str,
        command: &'static str,
    },
    #[snafu(display("`{raw}` is not a chat number for `/{command}` on `{stage}`"))]
    InvalidIndex {
        stage: &'static str,
        command: &'static str,
        raw: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say(String),
    Draft(String),
    SendDraft,
    New,
    List,
    /// One-based position in the session list.
    Switch(usize),
    Delete(usize),
    Copy,
    Reload,
    Help,
    Quit,
    Empty,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let Some(rest) = line.trim_start().strip_prefix('/') else {
            if line.trim().is_empty() {
                return Ok(Self::Empty);
            }
            return Ok(Self::Say(line.to_string()));
        };

        let (name, argument) = match rest.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim()),
            None => (rest, ""),
        };

        match name {
            "draft" => Ok(Self::Draft(argument.to_string())),
            "send" => Ok(Self::SendDraft),
            "new" => Ok(Self::New),
            "list" | "ls" => Ok(Self::List),
            "switch" => parse_index("switch", argument).map(Self::Switch),
            "delete" => parse_index("delete", argument).map(Self::Delete),
            "copy" => Ok(Self::Copy),
            "reload" => Ok(Self::Reload),
            "help" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            other => UnknownCommandSnafu {
                stage: "parse-command-name",
                name: other.to_string(),
            }
            .fail(),
        }
    }
}

fn parse_index(command: &'static str, raw: &str) -> Result<usize, CommandError> {
    let raw = Some(raw)
        .filter(|raw| !raw.is_empty())
        .context(MissingIndexSnafu {
            stage: "parse-command-index",
            command,
        })?;
    raw.parse::<usize>()
        .ok()
        .filter(|index| *index > 0)
        .context(InvalidIndexSnafu {
            stage: "parse-command-index",
            command,
            raw: raw.to_string(),
        })
}

/// What the input loop should do after a command ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Continue,
    Reload,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rendered {
    chars: usize,
    status: MessageStatus,
}

#[derive(Debug, Default)]
pub struct TerminalSurface {
    session: Option<SessionId>,
    rendered: HashMap<MessageId, Rendered>,
}

impl TerminalSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Output produced since the previous call. Switching sessions reprints
    /// the whole transcript under a title header.
    pub fn render(&mut self, controller: &ConversationController) -> String {
        let mut out = String::new();
        let active = controller.active_session_id();
        if self.session.as_ref() != Some(active) {
            self.session = Some(active.clone());
            self.rendered.clear();
            let title = controller
                .active_session()
                .map_or(DEFAULT_SESSION_TITLE, |session| session.title.as_str());
            out.push_str(&format!("== {title} ==\n"));
        }

        for message in controller.messages() {
            self.render_message(message, controller, &mut out);
        }
        out
    }

    fn render_message(
        &mut self,
        message: &Message,
        controller: &ConversationController,
        out: &mut String,
    ) {
        let previous = self.rendered.get(&message.id).copied();
        let current = Rendered {
            chars: message.content.chars().count(),
            status: message.status,
        };
        if previous == Some(current) {
            return;
        }

        match (message.role, message.kind) {
            (MessageRole::User, _) => {
                if previous.is_none() {
                    out.push_str(&format!("{USER_PREFIX}{}\n", message.content));
                }
            }
            (MessageRole::Assistant, MessageKind::Card) => {
                let already_shown =
                    previous.is_some_and(|rendered| rendered.status == MessageStatus::Sent);
                if message.status == MessageStatus::Sent && !already_shown {
                    let card = message
                        .card_id
                        .as_deref()
                        .and_then(|card_id| controller.find_card(card_id));
                    render_card(card, out);
                }
            }
            (MessageRole::Assistant, MessageKind::Text) => {
                render_text_delta(message, previous, out);
            }
        }

        self.rendered.insert(message.id.clone(), current);
    }

    /// Runs one parsed command and writes any feedback to `out`.
    pub fn execute(
        &mut self,
        command: Command,
        controller: &mut ConversationController,
        clipboard: &mut dyn ClipboardSink,
        out: &mut String,
    ) -> CommandOutcome {
        match command {
            Command::Empty => {}
            Command::Say(text) => {
                controller.submit_message(&text);
            }
            Command::Draft(text) => {
                controller.set_draft(&text);
                out.push_str(&format!("draft: {}\n", controller.draft()));
            }
            Command::SendDraft => {
                if controller.submit_draft().is_none() {
                    out.push_str("draft is empty\n");
                }
            }
            Command::New => {
                controller.create_session();
            }
            Command::List => render_session_list(controller, out),
            Command::Switch(position) => match session_at(controller, position) {
                Some(session_id) => controller.set_active_session(&session_id),
                None => out.push_str(&format!("no chat #{position}\n")),
            },
            Command::Delete(position) => match session_at(controller, position) {
                Some(session_id) => {
                    controller.delete_session(&session_id);
                    // Reprint under whichever session is now active.
                    self.session = None;
                }
                None => out.push_str(&format!("no chat #{position}\n")),
            },
            Command::Copy => {
                let copied = controller
                    .last_copyable_message()
                    .map(|message| message.id.clone())
                    .is_some_and(|message_id| controller.copy_message(&message_id, clipboard));
                out.push_str(if copied {
                    "copied\n"
                } else {
                    "nothing copied\n"
                });
            }
            Command::Reload => return CommandOutcome::Reload,
            Command::Help => out.push_str(HELP_TEXT),
            Command::Quit => return CommandOutcome::Quit,
        }
        CommandOutcome::Continue
    }
}

fn session_at(controller: &ConversationController, position: usize) -> Option<SessionId> {
    controller
        .sessions()
        .get(position.checked_sub(1)?)
        .map(|session| session.id.clone())
}

fn render_session_list(controller: &ConversationController, out: &mut String) {
    for (index, session) in controller.sessions().iter().enumerate() {
        let marker = if &session.id == controller.active_session_id() {
            "*"
        } else {
            " "
        };
        out.push_str(&format!("{marker}{:>3}. {}\n", index + 1, session.title));
    }
}

fn render_text_delta(message: &Message, previous: Option<Rendered>, out: &mut String) {
    match message.status {
        MessageStatus::Loading => {
            if previous.is_none() {
                out.push_str(&format!("{ASSISTANT_PREFIX}{THINKING_MARKER}\n"));
            }
        }
        MessageStatus::Typing | MessageStatus::Sent => {
            let streamed = previous.filter(|rendered| rendered.status != MessageStatus::Loading);
            if streamed.is_none() {
                out.push_str(ASSISTANT_PREFIX);
            }
            let shown = streamed.map_or(0, |rendered| rendered.chars);
            out.extend(message.content.chars().skip(shown));
            if message.status == MessageStatus::Sent {
                out.push('\n');
            }
        }
    }
}

fn render_card(card: Option<&Card>, out: &mut String) {
    let Some(card) = card else {
        out.push_str(&format!("{ASSISTANT_PREFIX}[unknown card]\n"));
        return;
    };

    match card.primary_link() {
        Some(link) => out.push_str(&format!(
            "{ASSISTANT_PREFIX}[{}]({})\n",
            card.name, link.url
        )),
        None => out.push_str(&format!("{ASSISTANT_PREFIX}[{}]\n", card.name)),
    }
    out.push_str(&format!("     {}\n", card.description));
    out.push_str(&format!("     image: {}\n", card.img));
    for link in card.secondary_links() {
        out.push_str(&format!("     - {}: {}\n", link.label, link.url));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chatbox_reply::{RandomSource, ReplyCatalog};
    use chatbox_storage::MemoryStorage;

    use super::*;
    use crate::chat::{ControllerOptions, DEFAULT_THINKING_DELAY};
    use crate::clipboard::ClipboardError;

    struct FirstCard;

    impl RandomSource for FirstCard {
        fn pick_index(&mut self, _upper: usize) -> usize {
            0
        }
    }

    #[derive(Default)]
    struct MemoryClipboard(Vec<String>);

    impl ClipboardSink for MemoryClipboard {
        fn copy_text(&mut self, text: &str) -> Result<(), ClipboardError> {
            self.0.push(text.to_string());
            Ok(())
        }
    }

    fn controller() -> ConversationController {
        ConversationController::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(ReplyCatalog::builtin().unwrap()),
            Box::new(FirstCard),
            ControllerOptions::default(),
        )
    }

    #[test]
    fn plain_lines_are_messages_and_slashes_are_commands() {
        assert_eq!(Command::parse("hello\n"), Ok(Command::Say("hello".into())));
        assert_eq!(Command::parse("   "), Ok(Command::Empty));
        assert_eq!(Command::parse("/switch 2"), Ok(Command::Switch(2)));
        assert_eq!(
            Command::parse("/draft 写个脚本 吧"),
            Ok(Command::Draft("写个脚本 吧".into()))
        );
        assert_eq!(Command::parse("/quit"), Ok(Command::Quit));
    }

    #[test]
    fn bad_commands_are_reported() {
        assert!(matches!(
            Command::parse("/dance"),
            Err(CommandError::UnknownCommand { .. })
        ));
        assert!(matches!(
            Command::parse("/delete"),
            Err(CommandError::MissingIndex { command: "delete", .. })
        ));
        assert!(matches!(
            Command::parse("/switch 0"),
            Err(CommandError::InvalidIndex { .. })
        ));
    }

    #[test]
    fn reveal_is_printed_incrementally() {
        let mut controller = controller();
        let mut surface = TerminalSurface::new();
        let header = surface.render(&controller);
        assert!(header.starts_with("== New chat =="));

        controller.submit_message("hello");
        let submitted = surface.render(&controller);
        assert_eq!(
            submitted,
            format!("{USER_PREFIX}hello\n{ASSISTANT_PREFIX}{THINKING_MARKER}\n")
        );

        controller.advance_to(DEFAULT_THINKING_DELAY + Duration::from_millis(80));
        let first = surface.render(&controller);
        assert!(first.starts_with(ASSISTANT_PREFIX));
        assert_eq!(first.chars().count(), ASSISTANT_PREFIX.len() + 2);

        controller.advance_by(Duration::from_millis(40));
        assert_eq!(surface.render(&controller).chars().count(), 1);
        assert_eq!(surface.render(&controller), "");

        controller.advance_by(Duration::from_secs(60));
        assert!(surface.render(&controller).ends_with('\n'));
    }

    #[test]
    fn card_replies_render_as_blocks() {
        let mut controller = controller();
        let mut surface = TerminalSurface::new();
        surface.render(&controller);

        controller.submit_message("介绍一下乐队");
        surface.render(&controller);
        controller.advance_by(DEFAULT_THINKING_DELAY);

        let card = controller.find_card("card1").unwrap().clone();
        let output = surface.render(&controller);
        assert!(output.contains(&card.name));
        assert!(output.contains(&card.description));
        assert_eq!(
            output.matches("     - ").count(),
            card.secondary_links().len()
        );
    }

    #[test]
    fn commands_drive_the_controller() {
        let mut controller = controller();
        let mut surface = TerminalSurface::new();
        let mut clipboard = MemoryClipboard::default();
        let mut out = String::new();

        surface.execute(Command::New, &mut controller, &mut clipboard, &mut out);
        assert_eq!(controller.sessions().len(), 2);

        surface.execute(Command::List, &mut controller, &mut clipboard, &mut out);
        assert!(out.starts_with("*  1. New chat\n"));

        out.clear();
        surface.execute(Command::Switch(9), &mut controller, &mut clipboard, &mut out);
        assert_eq!(out, "no chat #9\n");

        let second = controller.sessions()[1].id.clone();
        surface.execute(Command::Switch(2), &mut controller, &mut clipboard, &mut out);
        assert_eq!(controller.active_session_id(), &second);

        surface.execute(
            Command::Say("hello".into()),
            &mut controller,
            &mut clipboard,
            &mut out,
        );
        controller.advance_by(Duration::from_secs(60));
        out.clear();
        surface.execute(Command::Copy, &mut controller, &mut clipboard, &mut out);
        assert_eq!(out, "copied\n");
        assert_eq!(clipboard.0.len(), 1);

        assert_eq!(
            surface.execute(Command::Quit, &mut controller, &mut clipboard, &mut out),
            CommandOutcome::Quit
        );
    }
}
