//! Command-line interface
//!
//! Argument parsing for the `hashlink-ledger` binary.

pub mod commands;

pub use commands::{Command, Opt};
