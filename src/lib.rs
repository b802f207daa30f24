//! # appcast-reader
//!
//! Reads Sparkle-style appcast feeds and turns them into the list of updates
//! that apply to a platform, each either directly downloadable or pointing to
//! a web page.
//!
//! Fetching the feed, checking signatures, comparing versions and installing
//! are left to the caller.
pub mod config;
pub mod feed;
pub mod platform;
pub mod report;
pub mod util;

// Re-export the main types for convenience
pub use feed::{load, load_for, AppcastError, Enclosure, UpdateRecord};
pub use platform::{OsVersion, Platform};
