//! Core domain types
//!
//! These types are shared between the scheduler client (wire level) and the
//! lifecycle engine (registry and workspace level).

pub mod artifact;
pub mod job;
pub mod session;
