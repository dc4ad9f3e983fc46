//! File retrieval from a job's working directory

use std::path::{Component, Path, PathBuf};
use tracing::{error, info};

use offload_core::JobRef;

use crate::engine::Engine;
use crate::error::{EngineError, Result};

/// How [`Engine::download`] returns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Files written, in the order the scheduler returned them
    Written(Vec<PathBuf>),
    /// Handed to the worker pool; completion is logged
    Scheduled,
}

/// Accepts `name` or `./name`, nothing absolute or deeper
pub fn validate_file_name(name: &str) -> Result<()> {
    let invalid = || {
        EngineError::InvalidInput(format!(
            "Invalid file name {}, only relative names such as a.txt or ./a.txt are supported",
            name
        ))
    };

    let path = Path::new(name);
    if name.is_empty() || path.is_absolute() || name.starts_with('/') || name.starts_with('\\') {
        return Err(invalid());
    }

    let components: Vec<Component<'_>> = path.components().collect();
    match components.as_slice() {
        [Component::Normal(_)] => Ok(()),
        [Component::CurDir, Component::Normal(_)] => Ok(()),
        _ => Err(invalid()),
    }
}

/// Requires an existing directory the current user can create files in
///
/// Writability is tested by creating and dropping a temporary file, which
/// honours ownership, ACLs and read-only mounts.
pub fn check_destination(dir: &Path) -> Result<PathBuf> {
    let metadata = std::fs::metadata(dir)
        .map_err(|_| EngineError::InvalidInput(format!("No such directory: {}", dir.display())))?;
    if !metadata.is_dir() {
        return Err(EngineError::InvalidInput(format!(
            "Not a directory: {}",
            dir.display()
        )));
    }
    tempfile::NamedTempFile::new_in(dir).map_err(|_| {
        EngineError::InvalidInput(format!(
            "No write permission on directory: {}",
            dir.display()
        ))
    })?;
    Ok(dir.to_path_buf())
}

impl Engine {
    /// Downloads files of a job
    ///
    /// # Arguments
    /// * `job` - A tracked handle or a scheduler id
    /// * `files` - Names relative to the job's working directory
    /// * `destination` - Existing writable directory; defaults to the job's
    ///   directory under the workspace root, created on demand
    /// * `asynchronous` - Run the retrieval on the worker pool
    ///
    /// File names are checked before any remote call.
    pub async fn download(
        &self,
        job: JobRef,
        files: &[String],
        destination: Option<&Path>,
        asynchronous: bool,
    ) -> Result<DownloadOutcome> {
        let files: Vec<String> = files
            .iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
        for file in &files {
            validate_file_name(file)?;
        }

        let token = self.session.require_token()?;
        let (handle, remote_id) = self.resolve_remote(job)?;

        if files.is_empty() {
            return Ok(DownloadOutcome::Written(Vec::new()));
        }

        let destination = match destination {
            Some(dir) => check_destination(dir)?,
            None => {
                let dir = match handle {
                    Some(handle) => self.workspace.job_dir(handle),
                    None => self.workspace.remote_dir(remote_id),
                };
                std::fs::create_dir_all(&dir)?;
                dir
            }
        };

        if asynchronous {
            let claim = match handle {
                Some(handle) => Some(
                    self.registry
                        .try_begin(handle)
                        .ok_or(EngineError::Busy(handle))?,
                ),
                None => None,
            };
            let engine = self.clone();
            self.pool.spawn("download", async move {
                let _claim = claim;
                match engine
                    .client
                    .download(&token, remote_id, &files, &destination, None)
                    .await
                {
                    Ok(paths) => info!(
                        "Downloaded {} file(s) of scheduler job {} to {}",
                        paths.len(),
                        remote_id,
                        destination.display()
                    ),
                    Err(e) => {
                        let err = engine.session.screen(e);
                        error!("Download for scheduler job {} failed: {}", remote_id, err);
                    }
                }
            })?;
            info!("Downloading files of scheduler job {}", remote_id);
            return Ok(DownloadOutcome::Scheduled);
        }

        let written = self
            .client
            .download(
                &token,
                remote_id,
                &files,
                &destination,
                self.client.request_timeout(),
            )
            .await
            .map_err(|e| self.session.screen(e))?;
        Ok(DownloadOutcome::Written(written))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_and_dot_slash_names() {
        assert!(validate_file_name("a.txt").is_ok());
        assert!(validate_file_name("./a.txt").is_ok());
    }

    #[test]
    fn test_check_destination() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(check_destination(dir.path()).unwrap(), dir.path());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        let file = dir.path().join("plain.txt");
        std::fs::write(&file, "x").unwrap();
        assert!(matches!(
            check_destination(&file),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            check_destination(&dir.path().join("missing")),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_check_destination_rejects_unwritable_directory() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555)).unwrap();

        // Privileged users write through mode bits; nothing to assert then.
        let writable = std::fs::write(locked.join("canary"), "x").is_ok();
        let result = check_destination(&locked);
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        if !writable {
            assert!(matches!(result, Err(EngineError::InvalidInput(_))));
        }
    }

    #[test]
    fn test_rejects_absolute_and_deep_names() {
        for name in ["/etc/passwd", "dir/a.txt", "./dir/a.txt", "a/b/c", "../a.txt", "", "."] {
            assert!(
                matches!(validate_file_name(name), Err(EngineError::InvalidInput(_))),
                "{} should be rejected",
                name
            );
        }
    }
}
