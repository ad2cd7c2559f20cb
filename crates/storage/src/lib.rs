pub mod error;
pub mod ids;
pub mod keys;
pub mod memory;
pub mod registry;
pub mod sqlite;
pub mod state;
pub mod types;

use serde::Serialize;
use serde::de::DeserializeOwned;
use snafu::ResultExt;

pub use error::{StorageError, StorageResult};
pub use ids::{MessageId, SessionId};
pub use keys::{CURRENT_SESSION_KEY, SESSION_LIST_KEY, session_state_key};
pub use memory::MemoryStorage;
pub use registry::{ActiveChange, SessionRegistry};
pub use sqlite::SqliteStorage;
pub use state::SessionStateStore;
pub use types::{
    DEFAULT_SESSION_TITLE, Message, MessageKind, MessageRole, MessageStatus, Session,
    SessionState, TITLE_MAX_CHARS, now_unix_millis, title_from_first_message,
};

use error::{EncodeValueSnafu, MalformedValueSnafu};

/// Durable string-keyed persistence port.
///
/// Every call is synchronous and atomic on its own: a reader never observes a
/// half-written value.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;
    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// Reads and decodes a JSON value. Absent keys yield `Ok(None)`.
pub fn read_json<T>(store: &dyn KeyValueStore, key: &str) -> StorageResult<Option<T>>
where
    T: DeserializeOwned,
{
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };

    let decoded = serde_json::from_str(&raw).context(MalformedValueSnafu {
        stage: "read-json-decode",
        key: key.to_string(),
    })?;
    Ok(Some(decoded))
}

pub fn write_json<T>(store: &dyn KeyValueStore, key: &str, value: &T) -> StorageResult<()>
where
    T: Serialize + ?Sized,
{
    let encoded = serde_json::to_string(value).context(EncodeValueSnafu {
        stage: "write-json-encode",
        key: key.to_string(),
    })?;
    store.set(key, &encoded)
}
