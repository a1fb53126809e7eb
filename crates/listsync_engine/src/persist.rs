use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use listsync_core::HealthRecord;
use serde::{Deserialize, Serialize};
use sync_logging::sync_info;
use tempfile::NamedTempFile;
use thiserror::Error;

pub const HEALTH_FILENAME: &str = ".listsync_health.ron";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("state directory missing or not writable: {0}")]
    StateDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("failed to serialize state: {0}")]
    Serialize(String),
}

/// Ensure the state directory exists; create if missing.
pub fn ensure_state_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::StateDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::StateDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::StateDir(e.to_string()))?;
    }
    Ok(())
}

/// Atomically write content to `{dir}/{filename}` by writing a temp file then renaming.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, filename: &str, content: &str) -> Result<PathBuf, PersistError> {
        ensure_state_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PersistedHealth {
    records: Vec<HealthRecord>,
}

/// Health records kept between runs in the state directory.
pub struct HealthStore {
    dir: PathBuf,
}

impl HealthStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(HEALTH_FILENAME)
    }

    /// Missing file means no history yet.
    pub fn load(&self) -> Result<Vec<HealthRecord>, PersistError> {
        let path = self.path();
        let content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let state: PersistedHealth = ron::from_str(&content).map_err(|err| PersistError::Parse {
            path: path.clone(),
            message: err.to_string(),
        })?;
        sync_info!("Loaded {} health records from {:?}", state.records.len(), path);
        Ok(state.records)
    }

    pub fn save(&self, records: &[HealthRecord]) -> Result<PathBuf, PersistError> {
        let state = PersistedHealth {
            records: records.to_vec(),
        };
        let content = ron::ser::to_string_pretty(&state, ron::ser::PrettyConfig::new())
            .map_err(|err| PersistError::Serialize(err.to_string()))?;
        AtomicFileWriter::new(self.dir.clone()).write(HEALTH_FILENAME, &content)
    }
}
