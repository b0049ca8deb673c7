//! Replay module
//!
//! This module turns the live segment window into standalone replay files
//! and reports buffer health.

pub mod assembler;
pub mod status;
pub mod types;

pub use assembler::ReplayAssembler;
pub use status::buffer_info;
pub use types::{BufferInfo, SavedReplay};
