//! Concurrent privileged deletion of local filesystem snapshots.
//!
//! The engine verifies an administrator password, then deletes a list of
//! snapshots through `sudo` with a bounded number of deletions in flight,
//! stopping new work as soon as the password is rejected and reporting a
//! per-snapshot outcome for every target.

pub mod classify;
pub mod commands;
pub mod config;
pub mod credential;
pub mod error;
pub mod events;
pub mod privilege;
pub mod progress;
pub mod runner;
pub mod summary;
pub mod target;

pub use error::SweepError;
