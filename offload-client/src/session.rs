//! Persisted session token
//!
//! The token lives in a single file at the workspace root. Writers replace
//! the file with write-to-temp plus rename so a reader sees either the old
//! token, the new one, or no file at all.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use offload_core::SessionToken;
use offload_core::artifact::TOKEN_FILE;

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// File-backed store for the one active session token
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Creates a store for the token file under `workspace_root`
    pub fn new(workspace_root: &Path) -> Self {
        Self {
            path: workspace_root.join(TOKEN_FILE),
        }
    }

    /// Location of the token file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the persisted token
    ///
    /// Absent, unreadable, empty or truncated files all read as `None`.
    pub fn current_token(&self) -> Option<SessionToken> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Cannot read token file {}: {}", self.path.display(), e);
                return None;
            }
        };
        SessionToken::from_file_contents(&contents)
    }

    /// Atomically replaces the persisted token
    pub fn save(&self, token: &SessionToken) -> io::Result<()> {
        let dir = self.path.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(dir)?;

        let tmp = dir.join(format!(
            "{}.{}.{}.tmp",
            TOKEN_FILE,
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        if let Err(e) = write_private(&tmp, token.to_file_contents().as_bytes()) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }

        debug!("Saved session token for {}", token.server_url);
        Ok(())
    }

    /// Removes the persisted token; a missing file is not an error
    pub fn invalidate(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Removed session token {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    std::fs::write(path, contents)
}
