use std::sync::Arc;

use super::ids::{MessageId, SessionId};
use super::keys::session_state_key;
use super::types::{Message, SessionState};
use super::{KeyValueStore, read_json, write_json};

/// Holds the one live [`SessionState`] and mirrors every mutation to storage.
///
/// Other sessions only exist in storage until they are activated.
pub struct SessionStateStore {
    storage: Arc<dyn KeyValueStore>,
    initial_messages: Vec<Message>,
    live_id: SessionId,
    live: SessionState,
}

impl SessionStateStore {
    pub fn open(
        storage: Arc<dyn KeyValueStore>,
        initial_messages: Vec<Message>,
        session_id: SessionId,
    ) -> Self {
        let mut store = Self {
            storage,
            initial_messages,
            live_id: session_id.clone(),
            live: SessionState::default(),
        };
        store.live = store.load(&session_id);
        store
    }

    /// Reads a persisted state. Absent or malformed payloads yield the seeded default.
    pub fn load(&self, session_id: &SessionId) -> SessionState {
        let key = session_state_key(session_id);
        match read_json::<SessionState>(self.storage.as_ref(), &key) {
            Ok(Some(state)) => state,
            Ok(None) => self.empty_state(),
            Err(error) => {
                tracing::warn!("state of session {session_id} unreadable, using defaults: {error}");
                self.empty_state()
            }
        }
    }

    /// Writes the whole state verbatim; the last write wins.
    pub fn save(&self, session_id: &SessionId, state: &SessionState) {
        let key = session_state_key(session_id);
        if let Err(error) = write_json(self.storage.as_ref(), &key, state) {
            tracing::warn!("failed to persist state of session {session_id}: {error}");
        }
    }

    pub fn empty_state(&self) -> SessionState {
        SessionState::seeded(&self.initial_messages)
    }

    /// Drops the in-memory copy and replaces it with the persisted state of `session_id`.
    pub fn activate(&mut self, session_id: &SessionId) {
        self.live = self.load(session_id);
        self.live_id = session_id.clone();
        tracing::debug!(
            "loaded session {session_id} with {} messages",
            self.live.messages.len()
        );
    }

    pub fn live_id(&self) -> &SessionId {
        &self.live_id
    }

    pub fn live(&self) -> &SessionState {
        &self.live
    }

    pub fn is_live(&self, session_id: &SessionId) -> bool {
        &self.live_id == session_id
    }

    /// Mutates the live state and persists the result.
    pub fn update<R>(&mut self, mutate: impl FnOnce(&mut SessionState) -> R) -> R {
        let result = mutate(&mut self.live);
        self.save(&self.live_id, &self.live);
        result
    }

    /// Mutates one message only if it still belongs to the live session.
    ///
    /// Returns `None` when the target is stale: another session is live or the
    /// message is gone. Nothing is written in that case.
    pub fn update_message<R>(
        &mut self,
        session_id: &SessionId,
        message_id: &MessageId,
        mutate: impl FnOnce(&mut Message) -> R,
    ) -> Option<R> {
        if !self.is_live(session_id) {
            return None;
        }

        let message = self.live.message_mut(message_id)?;
        let result = mutate(message);
        self.save(&self.live_id, &self.live);
        Some(result)
    }
}
