//! Logical key layout shared by every backend.

use super::ids::SessionId;

/// JSON array of every known session, newest explicit creation first.
pub const SESSION_LIST_KEY: &str = "chat_sessions";

/// Plain id string of the session currently on screen.
pub const CURRENT_SESSION_KEY: &str = "chat_current_session";

const SESSION_STATE_KEY_PREFIX: &str = "chat_session_";

pub fn session_state_key(session_id: &SessionId) -> String {
    format!("{SESSION_STATE_KEY_PREFIX}{session_id}")
}
