//! Job workspaces
//!
//! Every job owns `<root>/<handle>/`. The directory holds the packaged
//! artifact and, once the job is terminal, the downloaded result and error
//! artifacts. A record can be rebuilt from those files after a restart.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use offload_core::artifact::{ERROR_FILE, RESULT_FILE};
use offload_core::{JobHandle, JobRecord, RemoteJobId};

use crate::error::{EngineError, Result};

/// The workspace root and its per-job directories
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

/// Artifacts found in a job directory
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Artifacts {
    pub result: Option<Vec<u8>>,
    pub error: Option<String>,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the root directory if needed
    pub fn ensure_root(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }

    pub fn job_dir(&self, handle: JobHandle) -> PathBuf {
        self.root.join(handle.to_string())
    }

    /// Default download directory for a job known only by its remote id
    pub fn remote_dir(&self, id: RemoteJobId) -> PathBuf {
        self.root.join(id.to_string())
    }

    pub fn exists(&self, handle: JobHandle) -> bool {
        self.job_dir(handle).is_dir()
    }

    /// Creates the directory of a fresh handle
    ///
    /// Fails if the directory already exists; handles are never reused.
    pub fn create(&self, handle: JobHandle) -> io::Result<PathBuf> {
        self.ensure_root()?;
        let dir = self.job_dir(handle);
        std::fs::create_dir(&dir)?;
        debug!("Created workspace {}", dir.display());
        Ok(dir)
    }

    /// Removes a job directory after a failed submission
    pub fn rollback(&self, handle: JobHandle) {
        let dir = self.job_dir(handle);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => debug!("Rolled back workspace {}", dir.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove workspace {}: {}", dir.display(), e),
        }
    }

    /// Reads the result and error artifacts of a job directory
    pub fn read_artifacts(&self, handle: JobHandle) -> io::Result<Artifacts> {
        let dir = self.job_dir(handle);
        Ok(Artifacts {
            result: read_optional(&dir.join(RESULT_FILE))?,
            error: read_optional(&dir.join(ERROR_FILE))?
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()),
        })
    }

    /// Rebuilds a terminal record from the artifacts on disk
    ///
    /// An error artifact with content wins over a result artifact.
    pub fn reconstruct(&self, handle: JobHandle) -> Option<JobRecord> {
        if !self.exists(handle) {
            return None;
        }

        let artifacts = match self.read_artifacts(handle) {
            Ok(artifacts) => artifacts,
            Err(e) => {
                warn!("Cannot read artifacts of job {}: {}", handle, e);
                return None;
            }
        };

        match artifacts {
            Artifacts {
                error: Some(message),
                ..
            } if !message.is_empty() => Some(JobRecord::exit(handle, None, message)),
            Artifacts {
                result: Some(output),
                ..
            } => Some(JobRecord::done(handle, None, output)),
            _ => None,
        }
    }

    /// Validates dependency files and resolves them to absolute paths
    ///
    /// Each file must exist, be a regular file and be readable; the total
    /// size must stay within `ceiling` bytes.
    pub fn validate_dependencies(&self, files: &[PathBuf], ceiling: u64) -> Result<Vec<PathBuf>> {
        let mut resolved = Vec::with_capacity(files.len());
        let mut total: u64 = 0;

        for file in files {
            let path = if file.is_absolute() {
                file.clone()
            } else {
                std::env::current_dir()?.join(file)
            };

            let metadata = std::fs::metadata(&path).map_err(|_| {
                EngineError::InvalidInput(format!("No such file: {}", path.display()))
            })?;
            if !metadata.is_file() {
                return Err(EngineError::InvalidInput(format!(
                    "Not a regular file: {}",
                    path.display()
                )));
            }
            if std::fs::File::open(&path).is_err() {
                return Err(EngineError::InvalidInput(format!(
                    "No read permission on file: {}",
                    path.display()
                )));
            }

            total = total.saturating_add(metadata.len());
            resolved.push(path);
        }

        if total > ceiling {
            return Err(EngineError::InvalidInput(format!(
                "The total size of the upload files ({} bytes) exceeds {} bytes",
                total, ceiling
            )));
        }

        Ok(resolved)
    }
}

fn read_optional(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
