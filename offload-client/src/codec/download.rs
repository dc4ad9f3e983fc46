//! File retrieval body decoding
//!
//! The `file/<id>` endpoint answers with a multipart message whose boundary
//! is not announced in a header: it is the first line of the body, or the
//! second when the first line carries no `--` marker. Each section with a
//! `Content-ID:` header is one returned file.

use base64::Engine;
use std::path::{Path, PathBuf};
use thiserror::Error;

use offload_core::artifact::RESULT_FILE;

use super::multipart::base_name;

/// Errors raised while decoding a file retrieval body
#[derive(Debug, Error)]
pub enum DecodeError {
    /// No boundary line could be found
    #[error("Failed to parse downloaded content: no multipart boundary")]
    MissingBoundary,

    /// The body carried no `Content-ID:` section
    #[error("Failed to parse downloaded content: no file parts in response")]
    NoFiles,

    /// The result artifact was not valid base64
    #[error("Failed to parse downloaded content: {file} is not base64 ({source})")]
    Base64 {
        file: String,
        #[source]
        source: base64::DecodeError,
    },
}

/// How the outer body was interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEncoding {
    /// Valid UTF-8: the result artifact is base64 text
    Text,
    /// Arbitrary bytes: every artifact is written as received
    Binary,
}

impl BodyEncoding {
    /// Text decoding is attempted first; bodies that are not UTF-8 fall back to bytes
    pub fn detect(body: &[u8]) -> Self {
        if std::str::from_utf8(body).is_ok() {
            BodyEncoding::Text
        } else {
            BodyEncoding::Binary
        }
    }
}

/// One file carried by a retrieval body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedPart {
    pub filename: String,
    pub content: Vec<u8>,
}

/// Splits a retrieval body into its files, in body order
pub fn decode_download(body: &[u8]) -> Result<Vec<DownloadedPart>, DecodeError> {
    let encoding = BodyEncoding::detect(body);
    let boundary = find_boundary(body).ok_or(DecodeError::MissingBoundary)?;

    let sections = split(body, boundary);
    let multiple = sections.len().saturating_sub(1) > 1;

    let mut parts = Vec::new();
    for section in sections {
        let Some(header) = find(section, b"Content-ID: ") else {
            continue;
        };
        let after = &section[header + b"Content-ID: ".len()..];
        let Some(close) = find(after, b">") else {
            continue;
        };

        let raw_name = String::from_utf8_lossy(after.get(1..close).unwrap_or_default());
        let decoded_name = urlencoding::decode(&raw_name)
            .map(|name| name.into_owned())
            .unwrap_or_else(|_| raw_name.to_string());
        let filename = base_name(Path::new(&decoded_name));

        let close_in_section = header + b"Content-ID: ".len() + close;
        let start = close_in_section + 5;
        let end = if multiple {
            section.len().saturating_sub(2)
        } else {
            section.len()
        };
        let data = section.get(start..end).unwrap_or_default();

        let content = if encoding == BodyEncoding::Text && filename == RESULT_FILE {
            let compact: Vec<u8> = data
                .iter()
                .copied()
                .filter(|b| !b.is_ascii_whitespace())
                .collect();
            base64::engine::general_purpose::STANDARD
                .decode(compact)
                .map_err(|source| DecodeError::Base64 {
                    file: filename.clone(),
                    source,
                })?
        } else {
            data.to_vec()
        };

        parts.push(DownloadedPart { filename, content });
    }

    Ok(parts)
}

/// Writes decoded parts under `destination`, returning the written paths
pub fn write_parts(destination: &Path, parts: &[DownloadedPart]) -> std::io::Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(parts.len());
    for part in parts {
        let path = destination.join(&part.filename);
        std::fs::write(&path, &part.content)?;
        written.push(path);
    }
    Ok(written)
}

fn find_boundary(body: &[u8]) -> Option<&[u8]> {
    let mut lines = body.split(|b| *b == b'\n');
    let first = lines.next().map(<[u8]>::trim_ascii)?;
    let boundary = if find(first, b"--").is_some() {
        first
    } else {
        lines.next().map(<[u8]>::trim_ascii)?
    };

    if boundary.is_empty() {
        None
    } else {
        Some(boundary)
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn split<'a>(haystack: &'a [u8], separator: &[u8]) -> Vec<&'a [u8]> {
    let mut out = Vec::new();
    let mut rest = haystack;
    while let Some(index) = find(rest, separator) {
        out.push(&rest[..index]);
        rest = &rest[index + separator.len()..];
    }
    out.push(rest);
    out
}
