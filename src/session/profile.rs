//! On-disk session profile.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::driver::DriverOptions;

/// Lock artifacts a crashed browser can leave behind.
const LOCK_FILES: &[&str] = &["SingletonLock", "SingletonCookie", "SingletonSocket", "LOCK"];

/// Location of the persisted authentication data for one client id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProfile {
    client_id: String,
    root: PathBuf,
}

impl SessionProfile {
    pub fn new(client_id: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            client_id: client_id.into(),
            root: root.into(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Directory handed to the driver.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory the driver keeps this client's browser profile in.
    pub fn session_dir(&self) -> PathBuf {
        self.root.join(format!("session-{}", self.client_id))
    }

    pub fn driver_options(&self) -> DriverOptions {
        DriverOptions {
            client_id: self.client_id.clone(),
            data_path: self.root.clone(),
        }
    }

    /// Make sure the profile root exists.
    pub async fn ensure(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// Delete everything stored in the profile and leave an empty root.
    ///
    /// Stale lock files are removed first so a half-dead browser cannot keep
    /// the directory busy. Missing files are not an error.
    pub async fn wipe(&self) -> io::Result<()> {
        for dir in [self.root.clone(), self.session_dir()] {
            for name in LOCK_FILES {
                let path = dir.join(name);
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => debug!(path = %path.display(), "removed lock file"),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => {
                        debug!(path = %path.display(), error = %e, "could not remove lock file")
                    }
                }
            }
        }

        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => info!(path = %self.root.display(), "session profile deleted"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        self.ensure().await
    }
}
