use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::errors::Error;

use super::{Credential, CredentialSnapshot};

/// Single-slot credential storage.
///
/// Reads must not block; the refresh coordinator is the only writer.
pub trait TokenStore: Send + Sync {
    fn get(&self) -> Option<Credential>;
    fn set(&self, credential: Credential) -> Result<(), Error>;
    fn clear(&self) -> Result<(), Error>;
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: RwLock<Option<Credential>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            slot: RwLock::new(Some(credential)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<Credential> {
        self.slot.read().clone()
    }

    fn set(&self, credential: Credential) -> Result<(), Error> {
        *self.slot.write() = Some(credential);
        Ok(())
    }

    fn clear(&self) -> Result<(), Error> {
        *self.slot.write() = None;
        Ok(())
    }
}

/// JSON file of `key -> credential`, loaded once and written through on change.
///
/// Other keys in the file are preserved untouched.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    key: String,
    entries: RwLock<BTreeMap<String, CredentialSnapshot>>,
}

impl FileTokenStore {
    pub fn open(path: impl Into<PathBuf>, key: impl Into<String>) -> Result<Self, Error> {
        let path = path.into();
        let entries = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            if contents.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&contents).map_err(|e| {
                    Error::Store(format!("Unreadable token file '{}': {e}", path.display()))
                })?
            }
        } else {
            BTreeMap::new()
        };
        debug!(
            "token store opened: path='{}' entries={}",
            path.display(),
            entries.len()
        );
        Ok(Self {
            path,
            key: key.into(),
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, CredentialSnapshot>) -> Result<(), Error> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Option<Credential> {
        let snapshot = self.entries.read().get(&self.key).cloned()?;
        match Credential::from_snapshot(snapshot) {
            Ok(credential) => Some(credential),
            Err(err) => {
                warn!("ignoring stored credential: {}", err);
                None
            }
        }
    }

    /// The slot only changes once the file write has succeeded.
    fn set(&self, credential: Credential) -> Result<(), Error> {
        let mut entries = self.entries.write();
        let mut next = entries.clone();
        next.insert(self.key.clone(), credential.to_snapshot());
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }

    fn clear(&self) -> Result<(), Error> {
        let mut entries = self.entries.write();
        if !entries.contains_key(&self.key) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.remove(&self.key);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }
}
