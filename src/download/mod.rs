//! Download system for kvsget

pub mod downloader;
pub mod retry;

pub use downloader::*;
pub use retry::*;
