//! Offload Engine
//!
//! Hands units of work to a remote batch scheduler and tracks them to
//! completion.
//!
//! This crate provides:
//! - [`Engine`]: logon/logout, submit, wait, get, download, cancel
//! - [`JobRegistry`]: in-process job records with per-handle claims
//! - [`Workspace`]: per-job directories and recovery from disk
//! - [`Packager`]: the seam that turns work into a runnable artifact
//! - [`WorkerPool`]: the bounded pool for background uploads and downloads
//! - [`EngineConfig`]: configuration with environment overrides
//!
//! The library never installs a `tracing` subscriber.
//!
//! # Example
//!
//! ```no_run
//! use offload_core::{Credentials, JobRef};
//! use offload_engine::{Engine, EngineConfig, SubmitMode, WorkUnit};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Engine::new(EngineConfig::from_env()?)?;
//!     engine
//!         .logon(&Credentials::new("alice", "secret", "scheduler.local", 8080))
//!         .await?;
//!
//!     let unit = WorkUnit::new("python3 -c").arg("print(6 * 7)");
//!     let submission = engine
//!         .submit(&unit, &[], SubmitMode::blocking(Duration::from_secs(60)))
//!         .await?;
//!     println!("{:?}", submission.waited);
//!
//!     let outcome = engine.get(JobRef::Handle(submission.handle)).await?;
//!     println!("{:?}", outcome.output_text());
//!
//!     engine.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod config;
mod engine;
pub mod error;
pub mod packager;
pub mod registry;
pub mod scheduler;
pub mod service;
pub mod session;
pub mod workspace;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{AuthError, EngineError, Result};
pub use packager::{PackagedArtifact, Packager, PackagingError, ShellPackager, WorkUnit};
pub use registry::JobRegistry;
pub use scheduler::{Interrupt, WaitOutcome, WorkerPool};
pub use service::{DownloadOutcome, SubmitMode, Submission};
pub use session::SessionGuard;
pub use workspace::Workspace;
