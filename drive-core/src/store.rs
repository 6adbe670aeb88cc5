use drive_types::CarId;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Key used by manual saves and by the brain carried across level clears.
pub const BEST_BRAIN_KEY: &str = "best-brain";

const CHECKPOINT_SEED_DIGITS: usize = 16;
const BRAIN_FILE_EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("brain store I/O failed for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode brain: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("invalid brain store key {0:?}")]
    InvalidKey(String),
    #[error("no brain available to save")]
    NothingToSave,
}

/// Key/value persistence for serialized brains.
pub trait BrainStore: Debug + Send {
    fn put(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn delete(&mut self, key: &str) -> Result<(), StoreError>;
}

/// Deterministic key for a level-clear checkpoint.
pub fn checkpoint_key(car: CarId, seed: &str, level: u32) -> String {
    let seed: String = seed.chars().take(CHECKPOINT_SEED_DIGITS).collect();
    format!("brain-{}-{seed}-{level}", car.0)
}

#[derive(Debug, Default, Clone)]
pub struct MemoryBrainStore {
    entries: BTreeMap<String, String>,
}

impl MemoryBrainStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl BrainStore for MemoryBrainStore {
    fn put(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per entry inside `dir`.
#[derive(Debug, Clone)]
pub struct FileBrainStore {
    dir: PathBuf,
}

impl FileBrainStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            key: dir.display().to_string(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_owned()));
        }
        Ok(self.dir.join(format!("{key}.{BRAIN_FILE_EXTENSION}")))
    }
}

impl BrainStore for FileBrainStore {
    fn put(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let staging = path.with_extension("json.tmp");
        let io_err = |source| StoreError::Io {
            key: key.to_owned(),
            source,
        };
        fs::write(&staging, value).map_err(io_err)?;
        fs::rename(&staging, &path).map_err(io_err)
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                key: key.to_owned(),
                source,
            }),
        }
    }

    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                key: key.to_owned(),
                source,
            }),
        }
    }
}
