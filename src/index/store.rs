//! Persistent storage behind the test index.
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::errors::{Result, VerifyError};

/// Version of the on-disk index layout.
pub const INDEX_VERSION: u32 = 1;

/// One row of the index: where test `config::name` is defined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub config: String,
    pub name: String,
    /// Test file, relative to the test root.
    pub file: PathBuf,
    /// Line of the `test:` line.
    pub line: usize,
    /// Byte offset of the `test:` line.
    pub offset: u64,
}

impl IndexEntry {
    pub fn key(&self) -> (String, String) {
        (self.config.clone(), self.name.clone())
    }
}

/// Backing storage for a [super::TestIndex].
///
/// Readers may run concurrently with each other. Callers must serialize
/// writers.
pub trait Store {
    /// True if the storage has been created.
    fn exists(&self) -> bool;
    /// Read every stored entry.
    fn load(&self) -> Result<Vec<IndexEntry>>;
    /// Replace the stored entries.
    fn save(&self, entries: &[IndexEntry]) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
    version: u32,
    #[serde(default)]
    tests: Vec<IndexEntry>,
}

/// Index stored as a single TOML file.
#[derive(Debug, Clone)]
pub struct TomlStore {
    path: PathBuf,
}

impl TomlStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store `index.toml` inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join("index.toml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn corrupt(&self, msg: String) -> VerifyError {
        VerifyError::Index {
            path: self.path.clone(),
            msg,
        }
    }
}

impl Store for TomlStore {
    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn load(&self) -> Result<Vec<IndexEntry>> {
        let contents = fs::read_to_string(&self.path)
            .map_err(|err| VerifyError::io(&self.path, err))?;
        let index: IndexFile =
            toml::from_str(&contents).map_err(|err| self.corrupt(err.to_string()))?;
        if index.version != INDEX_VERSION {
            return Err(self.corrupt(format!(
                "index version {} is not supported (expected {})",
                index.version, INDEX_VERSION
            )));
        }
        Ok(index.tests)
    }

    /// Writes a sibling temporary file and renames it over the index so
    /// readers never see a partial table.
    fn save(&self, entries: &[IndexEntry]) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|err| VerifyError::io(dir, err))?;
        }
        let index = IndexFile {
            version: INDEX_VERSION,
            tests: entries.to_vec(),
        };
        let contents =
            toml::to_string(&index).map_err(|err| self.corrupt(err.to_string()))?;

        let tmp = self
            .path
            .with_extension(format!("toml.{}.tmp", std::process::id()));
        fs::write(&tmp, contents).map_err(|err| VerifyError::io(&tmp, err))?;
        fs::rename(&tmp, &self.path).map_err(|err| VerifyError::io(&self.path, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(config: &str, name: &str, file: &str) -> IndexEntry {
        IndexEntry {
            config: config.to_string(),
            name: name.to_string(),
            file: PathBuf::from(file),
            line: 3,
            offset: 42,
        }
    }

    #[test]
    fn saves_and_loads() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = TomlStore::in_dir(&dir.path().join(".verify"));
        assert!(!store.exists());

        let entries = vec![entry("x86", "add", "a/add.test"), entry("arm", "add", "b.test")];
        store.save(&entries).unwrap();
        assert!(store.exists());
        assert_eq!(store.load().unwrap(), entries);
    }

    #[test]
    fn empty_index_round_trips() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = TomlStore::in_dir(dir.path());
        store.save(&[]).unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn garbage_is_reported_as_corrupt() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = TomlStore::in_dir(dir.path());
        fs::write(store.path(), "tests = 12 [[").unwrap();
        assert!(matches!(store.load(), Err(VerifyError::Index { .. })));
    }
}
