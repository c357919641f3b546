//! Configuration management
//!
//! Where the chain and the wallet file live, and how loud the logs are.

pub mod settings;

pub use settings::{global_config, Config, Settings};
