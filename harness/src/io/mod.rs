//! I/O helpers for harness commands.

pub mod config;
pub mod cycle_log;
pub mod engine;
pub mod files;
pub mod git;
pub mod health_store;
pub mod prompt;
pub mod report;
pub mod session;
