//! File-backed credential cache.
//!
//! Each datastore is one JSON file under the store directory holding a map from user key
//! to [`Credential`]. Programs pick their own datastore name so that consenting to one
//! set of scopes doesn't clobber the credential another program relies on.

use crate::credential::Credential;
use crate::error::Error;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The key credentials are stored under; the samples only ever act for one user.
pub const USER_KEY: &str = "user";

#[derive(Debug, Clone)]
pub struct FileTokenStore {
    dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the file backing `datastore`.
    pub fn path_for(&self, datastore: &str) -> Result<PathBuf, Error> {
        if datastore.is_empty()
            || datastore == "."
            || datastore == ".."
            || datastore.contains(['/', '\\'])
        {
            return Err(Error::Configuration(format!(
                "invalid datastore name {datastore:?}"
            )));
        }
        Ok(self.dir.join(format!("{datastore}.json")))
    }

    /// Looks up the credential stored for `user` in `datastore`.
    ///
    /// A datastore that was never written is simply empty.
    pub async fn load(&self, datastore: &str, user: &str) -> Result<Option<Credential>, Error> {
        let mut entries = self.read_all(datastore).await?;
        Ok(entries.remove(user))
    }

    /// Stores `credential` for `user` in `datastore`, creating the store if needed.
    pub async fn save(
        &self,
        datastore: &str,
        user: &str,
        credential: &Credential,
    ) -> Result<(), Error> {
        let path = self.path_for(datastore)?;
        let mut entries = self.read_all(datastore).await?;
        entries.insert(user.to_string(), credential.clone());

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::file(&self.dir, e))?;

        let json = encode(&path, &entries)?;
        // write-then-rename so a crash never leaves a half-written store behind
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| Error::file(&tmp, e))?;
        restrict_permissions(&tmp).await?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| Error::file(&path, e))?;

        tracing::debug!(path = %path.display(), user, "stored credential");
        Ok(())
    }

    async fn read_all(&self, datastore: &str) -> Result<BTreeMap<String, Credential>, Error> {
        let path = self.path_for(datastore)?;
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::trace!(path = %path.display(), "no stored credentials yet");
                return Ok(BTreeMap::new());
            }
            Err(e) => return Err(Error::file(&path, e)),
        };
        serde_json::from_slice(&raw).map_err(|e| {
            Error::file(
                &path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })
    }
}

fn encode(path: &Path, entries: &BTreeMap<String, Credential>) -> Result<Vec<u8>, Error> {
    serde_json::to_vec_pretty(entries).map_err(|e| Error::file(path, std::io::Error::other(e)))
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> Result<(), Error> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .await
        .map_err(|e| Error::file(path, e))
}

#[cfg(not(unix))]
async fn restrict_permissions(_: &Path) -> Result<(), Error> {
    Ok(())
}
