//! Work packaging
//!
//! A [`Packager`] turns a [`WorkUnit`] into a self-contained artifact inside
//! a job workspace, plus the command the scheduler runs to execute it. The
//! artifact must leave its result base64-encoded in `output.out` in the job's
//! working directory; stderr is collected by the scheduler into `lsf.errput`.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use offload_core::artifact::RESULT_FILE;

/// A unit of work to run remotely
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkUnit {
    /// Program or entry point to run
    pub command: String,
    /// Arguments, rendered by the packager
    #[serde(default)]
    pub args: Vec<JsonValue>,
}

impl WorkUnit {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
        }
    }

    /// Appends one argument
    pub fn arg(mut self, value: impl Into<JsonValue>) -> Self {
        self.args.push(value.into());
        self
    }
}

/// The packaged artifact of one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedArtifact {
    /// Artifact file inside the job workspace
    pub path: PathBuf,
    /// Command line the scheduler runs in the job's working directory
    pub command: String,
}

/// Errors raised while packaging
#[derive(Debug, Error)]
pub enum PackagingError {
    #[error("Nothing to run: the work unit has an empty command")]
    EmptyCommand,

    #[error("Cannot package argument {index}: {reason}")]
    Argument { index: usize, reason: String },

    #[error("Failed to write the artifact: {0}")]
    Io(#[from] io::Error),
}

/// Turns work units into remotely executable artifacts
pub trait Packager: Send + Sync {
    /// Writes the artifact for `unit` into `dir`
    fn package(&self, unit: &WorkUnit, dir: &Path) -> Result<PackagedArtifact, PackagingError>;
}

/// Packages a command line as a POSIX shell script
#[derive(Debug, Clone)]
pub struct ShellPackager {
    script_name: String,
}

impl ShellPackager {
    pub const DEFAULT_SCRIPT: &'static str = "job.sh";

    pub fn new() -> Self {
        Self {
            script_name: Self::DEFAULT_SCRIPT.to_string(),
        }
    }

    pub fn with_script_name(mut self, name: impl Into<String>) -> Self {
        self.script_name = name.into();
        self
    }

    fn render(unit: &WorkUnit) -> Result<String, PackagingError> {
        let command = unit.command.trim();
        if command.is_empty() {
            return Err(PackagingError::EmptyCommand);
        }

        let mut line = command.to_string();
        for (index, arg) in unit.args.iter().enumerate() {
            let text = match arg {
                JsonValue::String(s) => s.clone(),
                JsonValue::Number(n) => n.to_string(),
                JsonValue::Bool(b) => b.to_string(),
                JsonValue::Null => {
                    return Err(PackagingError::Argument {
                        index,
                        reason: "null has no command-line form".to_string(),
                    });
                }
                other => other.to_string(),
            };
            line.push(' ');
            line.push_str(&shell_quote(&text));
        }

        Ok(format!(
            "#!/bin/sh\n\
             {line} > {RESULT_FILE}.raw || exit $?\n\
             base64 < {RESULT_FILE}.raw > {RESULT_FILE}\n\
             rm -f {RESULT_FILE}.raw\n"
        ))
    }
}

impl Default for ShellPackager {
    fn default() -> Self {
        Self::new()
    }
}

impl Packager for ShellPackager {
    fn package(&self, unit: &WorkUnit, dir: &Path) -> Result<PackagedArtifact, PackagingError> {
        let script = Self::render(unit)?;
        let path = dir.join(&self.script_name);
        std::fs::write(&path, script)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o744))?;
        }

        Ok(PackagedArtifact {
            path,
            command: format!("sh {}", self.script_name),
        })
    }
}

/// Single-quotes `value` for a POSIX shell
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
