//! Maps `(config, name)` to the file that defines the test.
//!
//! The index only saves rescanning the test tree. It is never trusted on its
//! own: every hit is confirmed by parsing the file it points to, and a miss or
//! a failed confirmation repairs the index from the file system before giving
//! up.
pub mod scan;
pub mod store;

use std::{
    collections::{btree_map, BTreeMap},
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

use crate::{
    errors::{Result, VerifyError},
    parser::{get_test_near, quick_parse, TestRecord, TestSummary},
};
pub use scan::scan;
pub use store::{IndexEntry, Store, TomlStore};

type Key = (String, String);

/// Test index over every test file below a root directory.
pub struct TestIndex<S = TomlStore> {
    root: PathBuf,
    suffix: String,
    store: S,
    /// `None` until the index has been loaded or built.
    entries: Option<BTreeMap<Key, IndexEntry>>,
}

/// Summarize every test below `root`, in file order. Malformed blocks are
/// logged and left out.
pub fn list_tests(root: &Path, suffix: &str) -> Result<Vec<TestSummary>> {
    let mut found = Vec::new();
    scan(root, suffix, |file| {
        found.extend(quick_parse(&root.join(file))?);
        Ok(())
    })?;
    Ok(found)
}

/// Add the entry for `summary` unless its key is already indexed. Returns the
/// number of entries added.
fn insert(entries: &mut BTreeMap<Key, IndexEntry>, file: &Path, summary: TestSummary) -> usize {
    match entries.entry(summary.key()) {
        btree_map::Entry::Occupied(existing) => {
            if existing.get().file != file {
                warn!(
                    "{}::{} is defined in both {} and {}; using the former",
                    summary.config,
                    summary.name,
                    existing.get().file.display(),
                    file.display()
                );
            }
            0
        }
        btree_map::Entry::Vacant(slot) => {
            slot.insert(IndexEntry {
                config: summary.config,
                name: summary.name,
                file: file.to_path_buf(),
                line: summary.loc.line,
                offset: summary.loc.offset,
            });
            1
        }
    }
}

impl<S: Store> TestIndex<S> {
    /// Open the index for the tests under `root` in files ending with
    /// `suffix`. Nothing is scanned yet; an unreadable index is dropped and
    /// rebuilt on first use.
    pub fn open(root: impl Into<PathBuf>, suffix: impl Into<String>, store: S) -> Result<Self> {
        let entries = if store.exists() {
            match store.load() {
                Ok(list) => Some(list.into_iter().map(|e| (e.key(), e)).collect()),
                Err(err @ VerifyError::Index { .. }) => {
                    warn!("{}; rebuilding", err);
                    None
                }
                Err(err) => return Err(err),
            }
        } else {
            None
        };

        Ok(Self {
            root: root.into(),
            suffix: suffix.into(),
            store,
            entries,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// True once entries have been loaded from storage or built by a scan.
    pub fn is_built(&self) -> bool {
        self.entries.is_some()
    }

    /// Where the index says `config::name` lives. Does not touch the test
    /// files.
    pub fn lookup(&self, config: &str, name: &str) -> Option<&IndexEntry> {
        self.entries
            .as_ref()?
            .get(&(config.to_string(), name.to_string()))
    }

    /// All entries, ordered by `(config, name)`.
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter().flat_map(|map| map.values())
    }

    /// Throw away the current entries and index the whole tree.
    pub fn rebuild(&mut self) -> Result<usize> {
        let previous = self.entries.replace(BTreeMap::new());
        match self.reconcile() {
            Ok((added, _)) => Ok(added),
            Err(err) => {
                self.entries = previous;
                Err(err)
            }
        }
    }

    /// Bring the index in line with the test files. Returns the number of
    /// entries added and removed.
    ///
    /// Entries are dropped when their file is gone or no longer defines the
    /// test. Tests found in indexed files or in files not indexed yet are
    /// added. On an unchanged tree a second call changes nothing. On error
    /// the entries are left as they were.
    pub fn reconcile(&mut self) -> Result<(usize, usize)> {
        let mut entries = self.entries.clone().unwrap_or_default();
        let (mut added, mut removed) = (0, 0);

        let mut by_file: BTreeMap<PathBuf, Vec<Key>> = BTreeMap::new();
        for (key, entry) in &entries {
            by_file.entry(entry.file.clone()).or_default().push(key.clone());
        }

        // Drop stale entries before adding anything so a test that moved
        // between two indexed files is picked up in one pass.
        let mut found = Vec::new();
        for (file, keys) in &by_file {
            let path = self.root.join(file);
            if !path.is_file() {
                debug!("{} is gone; dropping {} entries", file.display(), keys.len());
                for key in keys {
                    entries.remove(key);
                    removed += 1;
                }
                continue;
            }

            let summaries = quick_parse(&path)?;
            let mut defined: BTreeMap<Key, &TestSummary> = BTreeMap::new();
            for summary in &summaries {
                defined.entry(summary.key()).or_insert(summary);
            }
            for key in keys {
                if let (Some(summary), Some(entry)) = (defined.get(key), entries.get_mut(key)) {
                    entry.line = summary.loc.line;
                    entry.offset = summary.loc.offset;
                    continue;
                }
                debug!("{}::{} left {}", key.0, key.1, file.display());
                entries.remove(key);
                removed += 1;
            }
            found.push((file.clone(), summaries));
        }

        for (file, summaries) in found {
            for summary in summaries {
                added += insert(&mut entries, &file, summary);
            }
        }

        let mut unindexed = Vec::new();
        scan(&self.root, &self.suffix, |file| {
            if !by_file.contains_key(file) {
                unindexed.push(file.to_path_buf());
            }
            Ok(())
        })?;
        for file in unindexed {
            for summary in quick_parse(&self.root.join(&file))? {
                added += insert(&mut entries, &file, summary);
            }
        }

        self.store
            .save(&entries.values().cloned().collect::<Vec<_>>())?;
        self.entries = Some(entries);
        info!(added, removed, "reconciled test index");
        Ok((added, removed))
    }

    /// Find and parse the test, repairing the index once if it is missing
    /// or wrong.
    fn locate(&mut self, config: &str, name: &str, cli_params: &str) -> Result<TestRecord> {
        let mut repaired = false;
        if !self.is_built() {
            info!("building test index for {}", self.root.display());
            self.rebuild()?;
            repaired = true;
        }

        loop {
            if let Some(entry) = self.lookup(config, name).cloned() {
                let path = self.root.join(&entry.file);
                if path.is_file() {
                    match get_test_near(&path, entry.offset, config, name, cli_params) {
                        Ok(Some(record)) => {
                            debug!("{}::{} resolved to {}", config, name, record.loc);
                            return Ok(record);
                        }
                        Ok(None) => {}
                        // The test may have left a file that is now broken.
                        Err(err) if err.is_parse_error() && !repaired => {
                            debug!("{}; checking whether {}::{} moved", err, config, name);
                        }
                        Err(err) => return Err(err),
                    }
                }
                debug!("index entry for {}::{} is stale", config, name);
            }

            if repaired {
                return Err(VerifyError::TestNotFound {
                    config: config.to_string(),
                    name: name.to_string(),
                });
            }
            self.reconcile()?;
            repaired = true;
        }
    }

    /// Path of the file defining `config::name`, confirmed by parsing it.
    pub fn resolve(&mut self, config: &str, name: &str) -> Result<PathBuf> {
        self.locate(config, name, "").map(|record| record.loc.path)
    }

    /// Resolve `config::name` and return its complete record with
    /// `cli_params` merged in.
    pub fn resolve_and_parse(
        &mut self,
        config: &str,
        name: &str,
        cli_params: &str,
    ) -> Result<TestRecord> {
        self.locate(config, name, cli_params)
    }
}
