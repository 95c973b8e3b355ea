//! Durable session persistence.
//!
//! The whole collection is serialized as one JSON document and replaced
//! atomically on every save: last write wins, no partial-write recovery.
//! Sessions with no messages are excluded on save and on load.

use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use tempfile::NamedTempFile;

use crate::core::session::Session;

#[derive(Debug)]
pub enum StoreError {
    /// No usable data directory on this platform.
    Location,

    /// Failed to read the session document from disk.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The session document is not valid JSON of the expected shape.
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Failed to serialize the collection.
    Serialize { source: serde_json::Error },

    /// Failed to write or replace the session document.
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Location => {
                write!(f, "Could not determine a data directory for session storage")
            }
            StoreError::Read { path, source } => {
                write!(f, "Failed to read sessions at {}: {}", path.display(), source)
            }
            StoreError::Parse { path, source } => {
                write!(f, "Failed to parse sessions at {}: {}", path.display(), source)
            }
            StoreError::Serialize { source } => {
                write!(f, "Failed to serialize sessions: {source}")
            }
            StoreError::Write { path, source } => {
                write!(f, "Failed to write sessions at {}: {}", path.display(), source)
            }
        }
    }
}

impl StdError for StoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            StoreError::Location => None,
            StoreError::Read { source, .. } => Some(source),
            StoreError::Parse { source, .. } => Some(source),
            StoreError::Serialize { source } => Some(source),
            StoreError::Write { source, .. } => Some(source),
        }
    }
}

/// Load/save contract for the session collection. The store is the sole
/// authority on the durable copy; callers own the in-memory one.
pub trait SessionStore: Send + Sync {
    fn save(&self, sessions: &[Session]) -> Result<(), StoreError>;
    fn load(&self) -> Result<Vec<Session>, StoreError>;
}

pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Store under the platform data directory (`sessions.json`).
    pub fn new() -> Result<Self, StoreError> {
        let proj_dirs = ProjectDirs::from("org", "parley", "parley").ok_or(StoreError::Location)?;
        Ok(Self {
            path: proj_dirs.data_dir().join("sessions.json"),
        })
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl SessionStore for FileSessionStore {
    fn save(&self, sessions: &[Session]) -> Result<(), StoreError> {
        let retained: Vec<&Session> = sessions.iter().filter(|s| !s.is_empty()).collect();
        let contents = serde_json::to_string_pretty(&retained)
            .map_err(|source| StoreError::Serialize { source })?;

        let parent = self.path.parent().filter(|dir| !dir.as_os_str().is_empty());
        if let Some(dir) = parent {
            fs::create_dir_all(dir).map_err(|source| self.write_error(source))?;
        }

        let mut temp_file = match parent {
            Some(dir) => NamedTempFile::new_in(dir),
            None => NamedTempFile::new(),
        }
        .map_err(|source| self.write_error(source))?;

        temp_file
            .write_all(contents.as_bytes())
            .map_err(|source| self.write_error(source))?;
        temp_file
            .as_file_mut()
            .sync_all()
            .map_err(|source| self.write_error(source))?;
        temp_file
            .persist(&self.path)
            .map_err(|err| self.write_error(err.error))?;
        Ok(())
    }

    fn load(&self) -> Result<Vec<Session>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&self.path).map_err(|source| StoreError::Read {
            path: self.path.clone(),
            source,
        })?;
        let sessions: Vec<Session> =
            serde_json::from_str(&contents).map_err(|source| StoreError::Parse {
                path: self.path.clone(),
                source,
            })?;
        Ok(sessions.into_iter().filter(|s| !s.is_empty()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Message;
    use crate::core::models::ChatModel;
    use tempfile::TempDir;

    fn session_with_messages(id: u32, count: usize) -> Session {
        let mut session = Session::new(id, ChatModel::Gpt5);
        for i in 0..count {
            let message_id = (id as i64) * 100 + i as i64;
            if i % 2 == 0 {
                session.messages.push(Message::user(message_id, format!("turn {i}")));
            } else {
                let mut reply = Message::assistant_placeholder(message_id);
                reply.text = format!("reply {i}");
                session.messages.push(reply);
            }
        }
        session
    }

    #[test]
    fn missing_document_loads_as_empty_collection() {
        let dir = TempDir::new().expect("temp dir");
        let store = FileSessionStore::with_path(dir.path().join("sessions.json"));
        assert!(store.load().expect("load").is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().expect("temp dir");
        let store = FileSessionStore::with_path(dir.path().join("sessions.json"));

        let sessions = vec![session_with_messages(1, 2), session_with_messages(2, 4)];
        store.save(&sessions).expect("save");

        let loaded = store.load().expect("load");
        assert_eq!(loaded, sessions);
    }

    #[test]
    fn empty_sessions_are_dropped_on_save() {
        let dir = TempDir::new().expect("temp dir");
        let store = FileSessionStore::with_path(dir.path().join("sessions.json"));

        let sessions = vec![
            Session::new(1, ChatModel::Gpt5),
            session_with_messages(2, 2),
        ];
        store.save(&sessions).expect("save");

        let loaded = store.load().expect("load");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, 2);
    }

    #[test]
    fn empty_sessions_are_dropped_on_load() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("sessions.json");
        let document = r#"[
            {"id": 1, "messages": [], "title": "Empty", "model": "gpt5"},
            {"id": 2, "messages": [{"id": 10, "text": "hi", "isUser": true}]}
        ]"#;
        fs::write(&path, document).expect("write document");

        let store = FileSessionStore::with_path(path);
        let loaded = store.load().expect("load");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, 2);
    }

    #[test]
    fn save_creates_missing_parent_directories() {
        let dir = TempDir::new().expect("temp dir");
        let store = FileSessionStore::with_path(dir.path().join("nested").join("sessions.json"));

        store
            .save(&[session_with_messages(1, 2)])
            .expect("save into missing directory");
        assert_eq!(store.load().expect("load").len(), 1);
    }

    #[test]
    fn corrupt_documents_surface_a_parse_error() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("sessions.json");
        fs::write(&path, "not json").expect("write document");

        let store = FileSessionStore::with_path(path);
        assert!(matches!(store.load(), Err(StoreError::Parse { .. })));
    }

    #[test]
    fn last_write_wins() {
        let dir = TempDir::new().expect("temp dir");
        let store = FileSessionStore::with_path(dir.path().join("sessions.json"));

        store.save(&[session_with_messages(1, 2)]).expect("first save");
        store.save(&[session_with_messages(7, 2)]).expect("second save");

        let loaded = store.load().expect("load");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, 7);
    }
}
