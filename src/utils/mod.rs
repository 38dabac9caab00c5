//! Utility functions for kvsget

pub mod filename;
pub mod html;
pub mod js;
pub mod url;

pub use self::url::*;
pub use filename::*;
pub use html::*;
pub use js::*;
