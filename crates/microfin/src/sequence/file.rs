use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{SequenceError, SequenceStore};

/// Counters persisted as a JSON object on disk.
///
/// Every mutation rewrites the document through a temp file and an atomic rename while the
/// in-process lock is held. One service instance per file.
#[derive(Debug)]
pub struct FileSequenceStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSequenceStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SequenceError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| unavailable(&path, err))?;
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    fn load(&self) -> Result<BTreeMap<String, u64>, SequenceError> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|err| {
                SequenceError::Unavailable(format!(
                    "counter file {} is corrupt: {err}",
                    self.path.display()
                ))
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(unavailable(&self.path, err)),
        }
    }

    fn store(&self, counters: &BTreeMap<String, u64>) -> Result<(), SequenceError> {
        let payload = serde_json::to_vec_pretty(counters)
            .map_err(|err| SequenceError::Unavailable(err.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        let mut file = fs::File::create(&tmp).map_err(|err| unavailable(&tmp, err))?;
        file.write_all(&payload)
            .and_then(|_| file.sync_all())
            .map_err(|err| unavailable(&tmp, err))?;
        fs::rename(&tmp, &self.path).map_err(|err| unavailable(&self.path, err))
    }

    fn with_counters<T>(
        &self,
        apply: impl FnOnce(&mut BTreeMap<String, u64>) -> Result<(T, bool), SequenceError>,
    ) -> Result<T, SequenceError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| SequenceError::Unavailable("counter lock poisoned".to_string()))?;
        let mut counters = self.load()?;
        let (result, dirty) = apply(&mut counters)?;
        if dirty {
            self.store(&counters)?;
        }
        Ok(result)
    }
}

fn unavailable(path: &Path, err: io::Error) -> SequenceError {
    SequenceError::Unavailable(format!("{}: {err}", path.display()))
}

impl SequenceStore for FileSequenceStore {
    fn next(&self, name: &str) -> Result<u64, SequenceError> {
        self.with_counters(|counters| {
            let value = counters.entry(name.to_string()).or_insert(0);
            *value = value.checked_add(1).ok_or_else(|| SequenceError::Exhausted {
                name: name.to_string(),
            })?;
            Ok((*value, true))
        })
    }

    fn current(&self, name: &str) -> Result<u64, SequenceError> {
        self.with_counters(|counters| Ok((counters.get(name).copied().unwrap_or(0), false)))
    }

    fn reset_to(&self, name: &str, value: u64) -> Result<(), SequenceError> {
        self.with_counters(|counters| {
            counters.insert(name.to_string(), value);
            Ok(((), true))
        })
    }
}
