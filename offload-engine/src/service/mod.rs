//! Service layer
//!
//! Job operations of the [`crate::Engine`], split by concern. Every remote
//! failure is passed through the session guard before it reaches the caller.

mod download;
mod query;
mod submit;
mod wait;

pub use download::{DownloadOutcome, check_destination, validate_file_name};
pub use submit::{SubmitMode, Submission};
