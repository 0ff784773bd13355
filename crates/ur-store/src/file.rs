//! JSON rule file
//!
//! Layout: `{"version": 1, "rules": [...]}`, rules in the order they were
//! added. Every change rewrites the whole file through a sibling temp file
//! and a rename, so readers see either the old or the new file.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use ur_core::{Filter, PersistenceError, RuleRepository};

use crate::error::StoreError;

/// Current rule file format version.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct RuleFileRef<'a> {
    version: u32,
    rules: &'a [Filter],
}

#[derive(Deserialize)]
struct RuleFile {
    version: u32,
    rules: Vec<Filter>,
}

/// Rule repository stored in a single JSON file.
///
/// Keeps a copy of the file contents in memory; the copy only changes after
/// the file was written successfully.
#[derive(Debug)]
pub struct JsonFileRepository {
    path: PathBuf,
    rules: Mutex<Vec<Filter>>,
}

impl JsonFileRepository {
    /// Open a rule file, creating an empty one if it does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let rules = match fs::read(&path) {
            Ok(bytes) => parse(&path, &bytes)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                write_file(&path, &[])?;
                debug!("created empty rule file '{}'", path.display());
                Vec::new()
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        debug!("opened rule file '{}' with {} rules", path.display(), rules.len());
        Ok(Self {
            path,
            rules: Mutex::new(rules),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.rules.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.lock().is_empty()
    }

    fn update<F>(&self, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Vec<Filter>) -> bool,
    {
        let mut rules = self.rules.lock();
        let mut next = rules.clone();
        if !change(&mut next) {
            return Ok(());
        }
        if let Err(err) = write_file(&self.path, &next) {
            warn!("rule file '{}' not updated: {}", self.path.display(), err);
            return Err(err);
        }
        *rules = next;
        Ok(())
    }
}

impl RuleRepository for JsonFileRepository {
    fn get_all_rules(&self) -> Result<Vec<Filter>, PersistenceError> {
        Ok(self.rules.lock().clone())
    }

    fn add_rules(&self, filters: &[Filter]) -> Result<(), PersistenceError> {
        self.update(|rules| {
            let before = rules.len();
            for filter in filters {
                if !rules.contains(filter) {
                    rules.push(filter.clone());
                }
            }
            rules.len() != before
        })
        .map_err(Into::into)
    }

    fn remove_rule(&self, filter: &Filter) -> Result<(), PersistenceError> {
        self.update(|rules| {
            let before = rules.len();
            rules.retain(|f| f != filter);
            rules.len() != before
        })
        .map_err(Into::into)
    }
}

fn parse(path: &Path, bytes: &[u8]) -> Result<Vec<Filter>, StoreError> {
    let file: RuleFile = serde_json::from_slice(bytes).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    if file.version != FORMAT_VERSION {
        return Err(StoreError::UnsupportedVersion(file.version));
    }
    Ok(file.rules)
}

fn write_file(path: &Path, rules: &[Filter]) -> Result<(), StoreError> {
    let io_err = |source: io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let body = serde_json::to_vec_pretty(&RuleFileRef {
        version: FORMAT_VERSION,
        rules,
    })
    .map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let tmp = tmp_path(path);
    let mut file = fs::File::create(&tmp).map_err(io_err)?;
    file.write_all(&body).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    drop(file);
    fs::rename(&tmp, path).map_err(io_err)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
