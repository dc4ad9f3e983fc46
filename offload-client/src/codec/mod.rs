//! Scheduler wire format
//!
//! - [`multipart`]: encoding of the nested multipart submission body
//! - [`download`]: decoding of the multipart file retrieval body
//! - [`xml`]: field extraction from the small XML control responses

pub mod download;
pub mod multipart;
pub mod xml;

pub use download::{DecodeError, DownloadedPart, decode_download, write_parts};
pub use multipart::{EncodeError, FileEntry, SubmitForm, UploadMode};
