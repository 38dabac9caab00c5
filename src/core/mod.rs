//! Core functionality for kvsget

pub mod progress;
pub mod resolver;
pub mod video_info;

pub use progress::*;
pub use resolver::*;
pub use video_info::*;
