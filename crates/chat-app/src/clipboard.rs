use arboard::Clipboard;
use snafu::{ResultExt, Snafu};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ClipboardError {
    #[snafu(display("failed to access clipboard on `{stage}`: {source}"))]
    Access {
        stage: &'static str,
        source: arboard::Error,
    },
}

/// Destination for copied message text.
pub trait ClipboardSink {
    fn copy_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

/// System clipboard. A fresh handle is opened per copy so nothing is held
/// between commands; headless hosts simply fail the copy.
#[derive(Debug, Default)]
pub struct SystemClipboard;

impl ClipboardSink for SystemClipboard {
    fn copy_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        let mut clipboard = Clipboard::new().context(AccessSnafu {
            stage: "open-system-clipboard",
        })?;
        clipboard.set_text(text).context(AccessSnafu {
            stage: "set-clipboard-text",
        })?;
        Ok(())
    }
}
