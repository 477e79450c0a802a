//! On-disk credential storage.

use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::credential::Credential;
use crate::error::{SessionError, SessionResult};

/// Durable storage for one credential record per profile.
///
/// The file is opened, read or written, and closed on every call; it is
/// never held open between operations, so external edits (switching
/// profiles from another process) are always picked up on the next
/// `load`. Writes take an exclusive advisory lock for their duration.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Creates a store backed by the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the persisted credential, if any.
    pub fn load(&self) -> SessionResult<Option<Credential>> {
        let mut file = match OpenOptions::new().read(true).open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        drop(file);

        let credential = serde_json::from_str(&contents)
            .map_err(|err| SessionError::store(format!("malformed credential file: {err}")))?;
        Ok(Some(credential))
    }

    /// Persists a credential, creating the parent directory if needed.
    ///
    /// The file ends up owner-readable only: it holds bearer tokens.
    pub fn save(&self, credential: &Credential) -> SessionResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&self.path)?;
        file.lock_exclusive()?;

        // An existing file keeps its old mode, so re-assert it.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = file.metadata()?.permissions();
            perms.set_mode(0o600);
            file.set_permissions(perms)?;
        }

        let json = serde_json::to_string_pretty(credential)
            .map_err(|err| SessionError::store(err.to_string()))?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;

        // Lock releases with the handle.
        Ok(())
    }
}
