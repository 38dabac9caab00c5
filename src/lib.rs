//! # kvsget - KVS player page resolver
//!
//! Resolves video pages of sites running the Kernel Video Sharing player
//! (ThisVid) into playable media URLs, and downloads them.
//!
//! ## Features
//!
//! - Player configuration (`flashvars`) extraction from page scripts
//! - License-keyed media URL deobfuscation
//! - Format ranking and selection
//! - Member and playlist listings with pagination
//! - Rate limiting and retry logic
//!
//! ## Example
//!
//! ```rust,no_run
//! use kvsget::{HttpFetcher, Resolver};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let resolver = Resolver::new(Arc::new(HttpFetcher::new()?));
//!     let video = resolver
//!         .resolve("https://thisvid.com/videos/sitting-on-ball-tight-jeans/")
//!         .await?;
//!     if let Some(best) = video.best_format() {
//!         println!("{}: {}", video.title, best.url);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod core;
pub mod download;
pub mod error;
pub mod platform;
pub mod utils;

// Re-export main types
pub use core::{
    FormatCandidate, FormatSelector, Listing, Progress, QualitySelector, Resolved, Resolver,
    ResolverOptions, VideoMetadata,
};
pub use download::MediaDownloader;
pub use error::KvsError;
pub use platform::{HttpClientConfig, HttpFetcher, PageFetcher};

/// Result type alias for kvsget operations
pub type Result<T> = std::result::Result<T, KvsError>;
