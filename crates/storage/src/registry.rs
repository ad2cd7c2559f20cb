use std::sync::Arc;

use super::ids::SessionId;
use super::keys::{CURRENT_SESSION_KEY, SESSION_LIST_KEY, session_state_key};
use super::types::{Message, Session, SessionState};
use super::{KeyValueStore, read_json, write_json};

/// Outcome of a registry operation for whoever holds the live session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveChange {
    Unchanged,
    Switched { from: SessionId, to: SessionId },
}

impl ActiveChange {
    pub fn target(&self) -> Option<&SessionId> {
        match self {
            Self::Unchanged => None,
            Self::Switched { to, .. } => Some(to),
        }
    }
}

/// Ordered session list plus the active pointer, mirrored to storage on every change.
///
/// After [`SessionRegistry::bootstrap`] the list is never empty and the active id
/// always names a listed session.
pub struct SessionRegistry {
    storage: Arc<dyn KeyValueStore>,
    initial_messages: Vec<Message>,
    sessions: Vec<Session>,
    active_id: SessionId,
}

impl SessionRegistry {
    pub fn bootstrap(storage: Arc<dyn KeyValueStore>, initial_messages: Vec<Message>) -> Self {
        let sessions = match read_json::<Vec<Session>>(storage.as_ref(), SESSION_LIST_KEY) {
            Ok(sessions) => sessions.unwrap_or_default(),
            Err(error) => {
                tracing::warn!("session list unreadable, starting fresh: {error}");
                Vec::new()
            }
        };
        let stored_active = match storage.get(CURRENT_SESSION_KEY) {
            Ok(active) => active.map(SessionId::from),
            Err(error) => {
                tracing::warn!("active session pointer unreadable: {error}");
                None
            }
        };

        let mut registry = Self {
            storage,
            initial_messages,
            sessions,
            active_id: SessionId::new(String::new()),
        };

        if registry.sessions.is_empty() {
            let fresh = registry.insert_fresh_session();
            registry.active_id = fresh.id;
            registry.persist_sessions();
            registry.persist_active();
            tracing::info!("bootstrapped default session {}", registry.active_id);
            return registry;
        }

        match stored_active {
            Some(active_id) if registry.contains(&active_id) => {
                registry.active_id = active_id;
            }
            _ => {
                registry.active_id = registry.sessions[0].id.clone();
                registry.persist_active();
                tracing::info!(
                    "active session pointer missing, falling back to {}",
                    registry.active_id
                );
            }
        }

        registry
    }

    pub fn list_sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn active_id(&self) -> &SessionId {
        &self.active_id
    }

    pub fn active_session(&self) -> Option<&Session> {
        self.get(&self.active_id)
    }

    pub fn get(&self, session_id: &SessionId) -> Option<&Session> {
        self.sessions.iter().find(|session| &session.id == session_id)
    }

    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.get(session_id).is_some()
    }

    /// Creates a session at the head of the list and makes it active.
    pub fn create_session(&mut self) -> (Session, ActiveChange) {
        let created = self.insert_fresh_session();
        self.persist_sessions();

        let change = self.switch_to(created.id.clone());
        tracing::info!("created session {}", created.id);
        (created, change)
    }

    /// Removes a session and its persisted state. Unknown ids are ignored.
    pub fn delete_session(&mut self, session_id: &SessionId) -> ActiveChange {
        let Some(position) = self
            .sessions
            .iter()
            .position(|session| &session.id == session_id)
        else {
            tracing::debug!("ignoring delete for unknown session {session_id}");
            return ActiveChange::Unchanged;
        };

        self.sessions.remove(position);
        if let Err(error) = self.storage.remove(&session_state_key(session_id)) {
            tracing::warn!("failed to remove state of session {session_id}: {error}");
        }
        tracing::info!("deleted session {session_id}");

        if self.sessions.is_empty() {
            let replacement = self.insert_fresh_session();
            self.persist_sessions();
            tracing::info!("replaced last session with {}", replacement.id);
            return self.switch_to(replacement.id);
        }

        self.persist_sessions();
        if &self.active_id == session_id {
            let next = self.sessions[0].id.clone();
            return self.switch_to(next);
        }

        ActiveChange::Unchanged
    }

    pub fn set_active_session(&mut self, session_id: &SessionId) -> ActiveChange {
        if &self.active_id == session_id {
            return ActiveChange::Unchanged;
        }
        if !self.contains(session_id) {
            tracing::debug!("ignoring switch to unknown session {session_id}");
            return ActiveChange::Unchanged;
        }

        self.switch_to(session_id.clone())
    }

    /// Returns true when the stored title actually changed.
    pub fn rename_session(&mut self, session_id: &SessionId, title: &str) -> bool {
        let Some(session) = self
            .sessions
            .iter_mut()
            .find(|session| &session.id == session_id)
        else {
            return false;
        };
        if session.title == title {
            return false;
        }

        session.title = title.to_string();
        self.persist_sessions();
        true
    }

    fn switch_to(&mut self, session_id: SessionId) -> ActiveChange {
        let from = std::mem::replace(&mut self.active_id, session_id);
        self.persist_active();
        if from == self.active_id {
            return ActiveChange::Unchanged;
        }

        ActiveChange::Switched {
            from,
            to: self.active_id.clone(),
        }
    }

    fn insert_fresh_session(&mut self) -> Session {
        let fresh = Session::fresh();
        let state = SessionState::seeded(&self.initial_messages);
        if let Err(error) = write_json(
            self.storage.as_ref(),
            &session_state_key(&fresh.id),
            &state,
        ) {
            tracing::warn!("failed to persist state of new session {}: {error}", fresh.id);
        }

        self.sessions.insert(0, fresh.clone());
        fresh
    }

    fn persist_sessions(&self) {
        if let Err(error) = write_json(self.storage.as_ref(), SESSION_LIST_KEY, &self.sessions) {
            tracing::warn!("failed to persist session list: {error}");
        }
    }

    fn persist_active(&self) {
        if let Err(error) = self
            .storage
            .set(CURRENT_SESSION_KEY, self.active_id.as_str())
        {
            tracing::warn!("failed to persist active session pointer: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::MessageId;
    use crate::memory::MemoryStorage;
    use crate::types::DEFAULT_SESSION_TITLE;

    fn seed() -> Vec<Message> {
        let mut greeting = Message::assistant_loading(MessageId::new("welcome"));
        greeting.content = "hi there".to_string();
        greeting.status = crate::types::MessageStatus::Sent;
        vec![greeting]
    }

    fn registry_on(storage: &Arc<MemoryStorage>) -> SessionRegistry {
        SessionRegistry::bootstrap(storage.clone(), seed())
    }

    #[test]
    fn empty_storage_bootstraps_one_default_session() {
        let storage = Arc::new(MemoryStorage::new());
        let registry = registry_on(&storage);

        assert_eq!(registry.list_sessions().len(), 1);
        let session = &registry.list_sessions()[0];
        assert_eq!(session.title, DEFAULT_SESSION_TITLE);
        assert_eq!(registry.active_id(), &session.id);

        let state: SessionState = read_json(&*storage, &session_state_key(&session.id))
            .unwrap()
            .unwrap();
        assert_eq!(state.messages, seed());
        assert_eq!(
            storage.get(CURRENT_SESSION_KEY).unwrap().as_deref(),
            Some(session.id.as_str())
        );
    }

    #[test]
    fn bootstrap_is_idempotent() {
        let storage = Arc::new(MemoryStorage::new());
        let first = registry_on(&storage);
        let second = registry_on(&storage);

        assert_eq!(first.list_sessions(), second.list_sessions());
        assert_eq!(first.active_id(), second.active_id());
    }

    #[test]
    fn dangling_active_pointer_falls_back_to_first_session() {
        let storage = Arc::new(MemoryStorage::new());
        let mut registry = registry_on(&storage);
        registry.create_session();
        let head = registry.list_sessions()[0].id.clone();

        storage.set(CURRENT_SESSION_KEY, "session_gone").unwrap();
        let reloaded = registry_on(&storage);

        assert_eq!(reloaded.active_id(), &head);
        assert_eq!(
            storage.get(CURRENT_SESSION_KEY).unwrap().as_deref(),
            Some(head.as_str())
        );
    }

    #[test]
    fn malformed_session_list_is_treated_as_absent() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(SESSION_LIST_KEY, "{not json").unwrap();

        let registry = registry_on(&storage);
        assert_eq!(registry.list_sessions().len(), 1);
    }

    #[test]
    fn created_sessions_go_first_and_become_active() {
        let storage = Arc::new(MemoryStorage::new());
        let mut registry = registry_on(&storage);
        let original = registry.active_id().clone();

        let (created, change) = registry.create_session();

        assert_eq!(registry.list_sessions()[0].id, created.id);
        assert_eq!(registry.active_id(), &created.id);
        assert_eq!(
            change,
            ActiveChange::Switched {
                from: original,
                to: created.id.clone(),
            }
        );
        assert!(storage.contains(&session_state_key(&created.id)));
    }

    #[test]
    fn deleting_active_session_activates_new_head() {
        let storage = Arc::new(MemoryStorage::new());
        let mut registry = registry_on(&storage);
        let oldest = registry.active_id().clone();
        let (newest, _) = registry.create_session();

        let change = registry.delete_session(&newest.id);

        assert_eq!(change.target(), Some(&oldest));
        assert_eq!(registry.active_id(), &oldest);
        assert!(!storage.contains(&session_state_key(&newest.id)));
    }

    #[test]
    fn deleting_inactive_session_keeps_active_pointer() {
        let storage = Arc::new(MemoryStorage::new());
        let mut registry = registry_on(&storage);
        let oldest = registry.active_id().clone();
        let (newest, _) = registry.create_session();

        assert_eq!(registry.delete_session(&oldest), ActiveChange::Unchanged);
        assert_eq!(registry.active_id(), &newest.id);
    }

    #[test]
    fn deleting_last_session_synthesizes_replacement() {
        let storage = Arc::new(MemoryStorage::new());
        let mut registry = registry_on(&storage);
        let only = registry.active_id().clone();

        let change = registry.delete_session(&only);

        assert_eq!(registry.list_sessions().len(), 1);
        let replacement = &registry.list_sessions()[0];
        assert_ne!(replacement.id, only);
        assert_eq!(replacement.title, DEFAULT_SESSION_TITLE);
        assert_eq!(change.target(), Some(&replacement.id));
        assert!(storage.contains(&session_state_key(&replacement.id)));
    }

    #[test]
    fn registry_is_never_empty_across_create_delete_sequences() {
        let storage = Arc::new(MemoryStorage::new());
        let mut registry = registry_on(&storage);

        for round in 0..6 {
            if round % 3 == 0 {
                registry.create_session();
            }
            let victim = registry.list_sessions()[0].id.clone();
            registry.delete_session(&victim);
            assert!(!registry.list_sessions().is_empty());
            assert!(registry.contains(registry.active_id()));
        }
    }

    #[test]
    fn unknown_ids_are_no_ops() {
        let storage = Arc::new(MemoryStorage::new());
        let mut registry = registry_on(&storage);
        let before = registry.list_sessions().to_vec();
        let missing = SessionId::new("session_missing");

        assert_eq!(registry.delete_session(&missing), ActiveChange::Unchanged);
        assert_eq!(registry.set_active_session(&missing), ActiveChange::Unchanged);
        assert!(!registry.rename_session(&missing, "x"));
        assert_eq!(registry.list_sessions(), before.as_slice());
    }

    #[test]
    fn rename_persists_and_reports_change_once() {
        let storage = Arc::new(MemoryStorage::new());
        let mut registry = registry_on(&storage);
        let id = registry.active_id().clone();

        assert!(registry.rename_session(&id, "hello"));
        assert!(!registry.rename_session(&id, "hello"));

        let persisted: Vec<Session> = read_json(&*storage, SESSION_LIST_KEY)
            .unwrap()
            .unwrap();
        assert_eq!(persisted[0].title, "hello");
    }
}
