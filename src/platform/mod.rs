//! Site-specific extraction: player configuration, URL cipher and page scraping

pub mod cipher;
pub mod client;
pub mod flashvars;
pub mod formats;
pub mod license;
pub mod listing;
pub mod page;

pub use cipher::*;
pub use client::*;
pub use flashvars::*;
pub use formats::*;
pub use license::*;
pub use listing::*;
pub use page::*;
