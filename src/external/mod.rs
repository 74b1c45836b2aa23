//! External tool abstractions
//!
//! Trait-based wrappers around command-line tools so the cleanup logic can
//! be tested with scripted executors.

pub mod command;
pub mod cluster;

pub use command::{CommandExecutor, ProcessCommandExecutor, CommandError, CommandOutput};
pub use cluster::{CleanupReport, CleanupRequest, ClusterCleanup, OpenShiftCleaner};
