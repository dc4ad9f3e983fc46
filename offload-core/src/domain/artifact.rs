//! Fixed artifact names
//!
//! The packaged script writes its return value to [`RESULT_FILE`]; the
//! scheduler writes the job's stderr and stdout to [`ERROR_FILE`] and
//! [`STDOUT_FILE`]. All three live in the job's working directory on the
//! execution host and are mirrored into the local job workspace.

/// Result artifact, base64-encoded on the wire
pub const RESULT_FILE: &str = "output.out";

/// Error artifact (the job's stderr)
pub const ERROR_FILE: &str = "lsf.errput";

/// Scheduler stdout artifact
pub const STDOUT_FILE: &str = "lsf.output";

/// Token file kept at the workspace root
pub const TOKEN_FILE: &str = ".lsfpass";

/// CA bundle required when the scheduler is reached over TLS
pub const CA_BUNDLE_FILE: &str = "cacert.pem";
