//! Session log: question/answer interactions grouped by inactivity
//!
//! A session opens on the first entry after startup or after the previous
//! session timed out, and is mirrored to one JSON file that is rewritten in
//! full on every append. One mutex covers the in-memory entries and the
//! file so appends and the timeout check never interleave.

pub mod service;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{Local, SecondsFormat};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub use service::{TIMEOUT_CHECK_INTERVAL, run_timeout_watcher, serve};

/// One persisted interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEntry {
    /// Local time the entry was recorded (RFC 3339)
    pub timestamp: String,
    /// The interaction as received
    pub interaction: serde_json::Value,
}

#[derive(Debug)]
struct ActiveSession {
    id: String,
    path: PathBuf,
    entries: Vec<SessionEntry>,
    last_activity: Instant,
}

impl ActiveSession {
    fn save(&self) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.entries)?;
        std::fs::write(&self.path, json).map_err(|e| {
            Error::Session(format!("failed to write {}: {e}", self.path.display()))
        })
    }
}

/// Thread-safe store for the current session
#[derive(Debug)]
pub struct SessionStore {
    dir: PathBuf,
    timeout: Duration,
    current: Mutex<Option<ActiveSession>>,
}

impl SessionStore {
    /// Create a store writing into `dir`, creating the directory if needed
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn open(dir: impl Into<PathBuf>, timeout: Duration) -> Result<Self> {
        let dir = dir.into();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                Error::Session(format!("failed to create {}: {e}", dir.display()))
            })?;
            tracing::info!(path = %dir.display(), "created session log directory");
        }

        Ok(Self {
            dir,
            timeout,
            current: Mutex::new(None),
        })
    }

    /// Directory session files are written to
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append an interaction, opening a session if none is active
    ///
    /// Returns the path of the session file that was rewritten.
    ///
    /// # Errors
    ///
    /// Returns error if the session file cannot be written
    pub fn add_entry(&self, interaction: serde_json::Value) -> Result<PathBuf> {
        let mut current = self.lock()?;
        let session = current.get_or_insert_with(|| self.new_session());

        session.entries.push(SessionEntry {
            timestamp: Local::now().to_rfc3339_opts(SecondsFormat::Micros, false),
            interaction,
        });
        session.last_activity = Instant::now();
        session.save()?;

        tracing::info!(
            session = %session.id,
            entries = session.entries.len(),
            "added entry to session"
        );
        Ok(session.path.clone())
    }

    /// Close the session if it has been idle longer than the timeout
    ///
    /// Returns the finalized file, if any.
    ///
    /// # Errors
    ///
    /// Returns error if the final save fails; the session is closed anyway
    pub fn expire_idle(&self) -> Result<Option<PathBuf>> {
        self.expire_idle_at(Instant::now())
    }

    fn expire_idle_at(&self, now: Instant) -> Result<Option<PathBuf>> {
        let mut current = self.lock()?;
        let idle = current
            .as_ref()
            .is_some_and(|s| now.saturating_duration_since(s.last_activity) > self.timeout);
        if !idle {
            return Ok(None);
        }

        tracing::info!("session timed out, closing");
        Self::finalize(current.take())
    }

    /// Save and close the current session regardless of activity
    ///
    /// # Errors
    ///
    /// Returns error if the final save fails
    pub fn close(&self) -> Result<Option<PathBuf>> {
        let mut current = self.lock()?;
        Self::finalize(current.take())
    }

    /// Id of the open session
    #[must_use]
    pub fn current_id(&self) -> Option<String> {
        self.lock()
            .ok()
            .and_then(|current| current.as_ref().map(|s| s.id.clone()))
    }

    fn finalize(session: Option<ActiveSession>) -> Result<Option<PathBuf>> {
        let Some(session) = session else {
            return Ok(None);
        };
        session.save()?;
        tracing::info!(session = %session.id, path = %session.path.display(), "session closed");
        Ok(Some(session.path))
    }

    fn new_session(&self) -> ActiveSession {
        let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        let (id, path) = self.unique_path(&stamp);
        tracing::info!(session = %id, path = %path.display(), "starting new session");

        ActiveSession {
            id,
            path,
            entries: Vec::new(),
            last_activity: Instant::now(),
        }
    }

    /// `session_<stamp>.json`, suffixed when a session started in the same second
    fn unique_path(&self, stamp: &str) -> (String, PathBuf) {
        let mut id = stamp.to_string();
        let mut suffix = 1;
        loop {
            let path = self.dir.join(format!("session_{id}.json"));
            if !path.exists() {
                return (id, path);
            }
            id = format!("{stamp}-{suffix}");
            suffix += 1;
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<ActiveSession>>> {
        self.current
            .lock()
            .map_err(|_| Error::Session("session lock poisoned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn read_entries(path: &Path) -> Vec<SessionEntry> {
        serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
    }

    #[test]
    fn creates_missing_directory() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("logs").join("sessions");
        let store = SessionStore::open(&dir, Duration::from_secs(60)).unwrap();
        assert!(dir.is_dir());
        assert_eq!(store.dir(), dir);
        assert_eq!(store.current_id(), None);
    }

    #[test]
    fn appends_rewrite_the_whole_file() {
        let temp = tempfile::tempdir().unwrap();
        let store = SessionStore::open(temp.path(), Duration::from_secs(60)).unwrap();

        let first = store
            .add_entry(json!({"question": "hi", "answer": "hello"}))
            .unwrap();
        let second = store
            .add_entry(json!({"question": "time?", "answer": "noon"}))
            .unwrap();
        assert_eq!(first, second);

        let entries = read_entries(&second);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].interaction["answer"], "hello");
        assert_eq!(entries[1].interaction["question"], "time?");
        assert!(chrono::DateTime::parse_from_rfc3339(&entries[0].timestamp).is_ok());

        let name = second.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("session_") && name.ends_with(".json"), "{name}");
    }

    #[test]
    fn active_session_is_not_expired() {
        let temp = tempfile::tempdir().unwrap();
        let store = SessionStore::open(temp.path(), Duration::from_secs(60)).unwrap();
        store.add_entry(json!("hello")).unwrap();

        assert_eq!(store.expire_idle().unwrap(), None);
        assert!(store.current_id().is_some());
    }

    #[test]
    fn idle_session_closes_and_next_entry_starts_a_new_file() {
        let temp = tempfile::tempdir().unwrap();
        let store = SessionStore::open(temp.path(), Duration::from_secs(60)).unwrap();

        let first = store.add_entry(json!({"question": "a", "answer": "b"})).unwrap();
        let first_id = store.current_id().unwrap();

        let later = Instant::now() + Duration::from_secs(61);
        assert_eq!(store.expire_idle_at(later).unwrap(), Some(first.clone()));
        assert_eq!(store.current_id(), None);
        assert_eq!(read_entries(&first).len(), 1);

        let second = store.add_entry(json!({"question": "c", "answer": "d"})).unwrap();
        assert_ne!(first, second);
        assert_ne!(store.current_id().unwrap(), first_id);
        assert_eq!(read_entries(&first).len(), 1);
        assert_eq!(read_entries(&second).len(), 1);
    }

    #[test]
    fn expire_without_session_is_noop() {
        let temp = tempfile::tempdir().unwrap();
        let store = SessionStore::open(temp.path(), Duration::ZERO).unwrap();
        assert_eq!(store.expire_idle().unwrap(), None);
        assert_eq!(store.close().unwrap(), None);
    }

    #[test]
    fn close_finalizes_open_session() {
        let temp = tempfile::tempdir().unwrap();
        let store = SessionStore::open(temp.path(), Duration::from_secs(600)).unwrap();
        let path = store.add_entry(json!([1, 2, 3])).unwrap();

        assert_eq!(store.close().unwrap(), Some(path.clone()));
        assert_eq!(read_entries(&path)[0].interaction, json!([1, 2, 3]));
        assert_eq!(store.current_id(), None);
    }
}
