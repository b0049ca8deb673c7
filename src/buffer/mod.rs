//! Replay buffer
//!
//! Configuration and the explicitly owned buffer instance.

pub mod config;
pub mod instance;

pub use config::BufferConfig;
pub use instance::{replay_file_name, ReplayBuffer};
