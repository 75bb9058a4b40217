//! # File-Per-Event JSON Store
//!
//! Durable `EventStore` writing one pretty-printed JSON file per event into
//! a trial directory, named `{sequence:08}_{kind}.json` so a plain
//! directory listing reads as the audit trail.
//!
//! ## Locking
//!
//! Holds an exclusive `fs2` advisory lock on a `LOCK` file inside the
//! directory for the lifetime of the store, so two processes cannot append
//! to the same trial. The lock is released when the store is dropped.
//!
//! ## Atomicity
//!
//! Each event is written to a temp file and renamed into place; a crashed
//! append leaves at most a `.tmp` file, which load ignores.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use shared_types::{Event, TrialError};

use crate::ports::outbound::EventStore;

pub struct JsonFileEventStore {
    dir: PathBuf,
    /// Kept open to hold the advisory lock.
    _lock: File,
}

impl JsonFileEventStore {
    const LOCK_FILE: &'static str = "LOCK";

    /// Open (creating if needed) the event directory and take its lock.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, TrialError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| storage("create event directory", &e))?;

        let lock_path = dir.join(Self::LOCK_FILE);
        let mut lock = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&lock_path)
            .map_err(|e| storage("create lock file", &e))?;

        if lock.try_lock_exclusive().is_err() {
            return Err(TrialError::Storage(format!(
                "event directory already in use: {}",
                dir.display()
            )));
        }
        writeln!(lock, "{}", std::process::id()).map_err(|e| storage("write lock file", &e))?;

        Ok(Self { dir, _lock: lock })
    }

    fn event_path(&self, event: &Event) -> PathBuf {
        self.dir
            .join(format!("{:08}_{}.json", event.sequence, event.payload.kind()))
    }
}

impl EventStore for JsonFileEventStore {
    fn append(&mut self, event: &Event) -> Result<(), TrialError> {
        let path = self.event_path(event);
        if path.exists() {
            return Err(TrialError::Storage(format!(
                "event file already exists: {}",
                path.display()
            )));
        }
        let bytes =
            serde_json::to_vec_pretty(event).map_err(|e| TrialError::Storage(e.to_string()))?;

        let temp_path = path.with_extension("tmp");
        let mut file = File::create(&temp_path).map_err(|e| storage("create event file", &e))?;
        file.write_all(&bytes)
            .map_err(|e| storage("write event file", &e))?;
        file.sync_all().map_err(|e| storage("sync event file", &e))?;
        fs::rename(&temp_path, &path).map_err(|e| storage("publish event file", &e))?;

        tracing::debug!("[tm-04] appended {} as {}", event.sequence, path.display());
        Ok(())
    }

    fn load(&self) -> Result<Vec<Event>, TrialError> {
        let mut names: Vec<String> = Vec::new();
        let entries = fs::read_dir(&self.dir).map_err(|e| storage("read event directory", &e))?;
        for entry in entries {
            let entry = entry.map_err(|e| storage("read event directory", &e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".json") {
                names.push(name);
            }
        }
        // Zero-padded sequence prefixes make lexical order event order.
        names.sort();

        let mut events = Vec::with_capacity(names.len());
        for name in names {
            let bytes = fs::read(self.dir.join(&name)).map_err(|e| storage("read event file", &e))?;
            let event: Event = serde_json::from_slice(&bytes).map_err(|e| TrialError::Integrity {
                sequence: events.len() as u64 + 1,
                reason: format!("undecodable event file {name}: {e}"),
            })?;
            events.push(event);
        }

        tracing::info!(
            "[tm-04] loaded {} events from {}",
            events.len(),
            self.dir.display()
        );
        Ok(events)
    }
}

fn storage(action: &str, err: &std::io::Error) -> TrialError {
    TrialError::Storage(format!("failed to {action}: {err}"))
}
