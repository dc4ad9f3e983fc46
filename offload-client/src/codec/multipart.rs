//! Submission body encoding
//!
//! The scheduler's `submitapp` endpoint takes a `multipart/mixed` body with
//! two nested boundaries:
//!
//! ```text
//! --outer  AppName part
//! --outer  data part (multipart/mixed; boundary=inner)
//!          --inner  <AppParam> per plain parameter
//!          --inner  <AppParam type=file> per file parameter
//!          --inner--
//! --outer  raw bytes per upload-mode file
//! --outer--
//! ```
//!
//! Parts are emitted in insertion order; the scheduler correlates file
//! parameters and raw parts by name and position.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Outer boundary separating the application name, parameters and files
pub const OUTER_BOUNDARY: &str = "_lsf_faas_boundary";

/// Inner boundary separating parameters inside the `data` part
pub const INNER_BOUNDARY: &str = "_lsf_faas_file_boundary";

const CRLF: &[u8] = b"\r\n";

/// Errors raised while building a submission body
#[derive(Debug, Error)]
pub enum EncodeError {
    /// An upload-mode file could not be read
    #[error("Submit job failed, no such file or directory: {}", .0.display())]
    MissingFile(PathBuf),

    /// A file parameter was declared without any file
    #[error("File parameter {0} has no files")]
    EmptyFileParam(String),
}

/// How the scheduler obtains a file parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    /// Bytes are sent in the request body
    Upload,
    /// Symlinked from a path visible to the execution host
    Link,
    /// Copied from a path visible to the execution host
    Copy,
    /// Passed through as a path
    Path,
}

impl UploadMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadMode::Upload => "upload",
            UploadMode::Link => "link",
            UploadMode::Copy => "copy",
            UploadMode::Path => "path",
        }
    }

    /// Parses the wire name; unknown names fall back to `Upload`
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "link" => UploadMode::Link,
            "copy" => UploadMode::Copy,
            "path" => UploadMode::Path,
            _ => UploadMode::Upload,
        }
    }
}

/// One file referenced by a file parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub mode: UploadMode,
}

impl FileEntry {
    pub fn upload(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: UploadMode::Upload,
        }
    }

    /// Name the entry takes inside the `<value>` of its parameter
    fn value(&self) -> String {
        match self.mode {
            UploadMode::Upload => base_name(&self.path),
            _ => self.path.to_string_lossy().into_owned(),
        }
    }
}

/// A submission request: application name, parameters and file parameters
#[derive(Debug, Clone)]
pub struct SubmitForm {
    app_name: String,
    params: Vec<(String, String)>,
    files: Vec<(String, Vec<FileEntry>)>,
}

impl SubmitForm {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            params: Vec::new(),
            files: Vec::new(),
        }
    }

    /// Appends a plain parameter
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Appends a file parameter referencing a single file
    pub fn file(self, name: impl Into<String>, entry: FileEntry) -> Self {
        self.files_param(name, vec![entry])
    }

    /// Appends a file parameter referencing several files
    pub fn files_param(mut self, name: impl Into<String>, entries: Vec<FileEntry>) -> Self {
        self.files.push((name.into(), entries));
        self
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Upload-mode files, in the order their raw parts are emitted
    pub fn upload_files(&self) -> impl Iterator<Item = &FileEntry> {
        self.files
            .iter()
            .flat_map(|(_, entries)| entries.iter())
            .filter(|entry| entry.mode == UploadMode::Upload)
    }

    /// `Content-Type` header value for the encoded body
    pub fn content_type() -> String {
        format!("multipart/mixed; boundary={}", OUTER_BOUNDARY)
    }

    /// Encodes the body
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut lines: Vec<Vec<u8>> = Vec::new();

        push_line(&mut lines, format!("--{}", OUTER_BOUNDARY));
        push_line(&mut lines, "Content-Disposition: form-data; name=\"AppName\"");
        push_line(&mut lines, "Content-ID: <AppName>");
        push_line(&mut lines, String::new());
        push_line(&mut lines, self.app_name.clone());

        push_line(&mut lines, format!("--{}", OUTER_BOUNDARY));
        push_line(&mut lines, "Content-Disposition: form-data; name=\"data\"");
        push_line(
            &mut lines,
            format!("Content-Type: multipart/mixed; boundary={}", INNER_BOUNDARY),
        );
        push_line(&mut lines, "Accept-Language: en-us");
        push_line(&mut lines, "Content-ID: <data>");
        push_line(&mut lines, String::new());

        for (name, value) in &self.params {
            for line in app_param(name, value, "") {
                push_line(&mut lines, line);
            }
        }

        for (name, entries) in &self.files {
            if entries.is_empty() {
                return Err(EncodeError::EmptyFileParam(name.clone()));
            }
            let value = entries
                .iter()
                .map(FileEntry::value)
                .collect::<Vec<_>>()
                .join(";");
            for line in app_param(name, &value, "file") {
                push_line(&mut lines, line);
            }
        }

        push_line(&mut lines, format!("--{}--", INNER_BOUNDARY));
        push_line(&mut lines, String::new());

        for entry in self.upload_files() {
            let content = std::fs::read(&entry.path)
                .map_err(|_| EncodeError::MissingFile(entry.path.clone()))?;
            let filename = base_name(&entry.path);

            push_line(&mut lines, format!("--{}", OUTER_BOUNDARY));
            push_line(
                &mut lines,
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"",
                    filename, filename
                ),
            );
            push_line(&mut lines, "Content-Type: application/octet-stream");
            push_line(&mut lines, "Content-Transfer-Encoding: binary");
            push_line(&mut lines, "Accept-Language: en-us");
            push_line(
                &mut lines,
                format!("Content-ID: <{}>", urlencoding::encode(&filename)),
            );
            push_line(&mut lines, String::new());
            lines.push(content);
        }

        push_line(&mut lines, format!("--{}--", OUTER_BOUNDARY));
        push_line(&mut lines, String::new());

        Ok(lines.join(CRLF))
    }
}

fn push_line(lines: &mut Vec<Vec<u8>>, line: impl Into<String>) {
    lines.push(line.into().into_bytes());
}

fn app_param(name: &str, value: &str, kind: &str) -> [String; 7] {
    [
        format!("--{}", INNER_BOUNDARY),
        format!("Content-Disposition: form-data; name=\"{}\"", name),
        "Content-Type: application/xml; charset=UTF-8".to_string(),
        "Content-Transfer-Encoding: 8bit".to_string(),
        "Accept-Language: en-us".to_string(),
        String::new(),
        format!(
            "<AppParam><id>{}</id><value>{}</value><type>{}</type></AppParam>",
            name, value, kind
        ),
    ]
}

/// Last path segment, treating both separators alike
pub fn base_name(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    raw.rsplit('/').next().unwrap_or_default().to_string()
}
