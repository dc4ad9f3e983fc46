//! Offload Core
//!
//! Core types shared by the Offload scheduler client and lifecycle engine.
//!
//! This crate contains:
//! - Domain types: job handles, job records, states and outcomes
//! - Session types: credentials and persisted session tokens
//! - Artifact names: the fixed file names exchanged with the scheduler

pub mod domain;

pub use domain::artifact;
pub use domain::job::{
    InvalidJobRef, JobHandle, JobOutcome, JobRecord, JobRef, JobState, RemoteJobId, RemoteStatus,
};
pub use domain::session::{Credentials, SessionToken};
