//! Utility functions for presenting appcast contents.
//!
//! This module provides reusable utilities for:
//!
//! - **URL validation**: Checks that download and web URLs are usable http(s) URLs
//! - **Text processing**: Control-character stripping and Unicode-aware width handling
//!
//! # Examples
//!
//! ```
//! use appcast_reader::util::{strip_control_chars, truncate_to_width, validate_url};
//!
//! assert!(validate_url("https://example.com/app.exe").is_ok());
//! assert_eq!(strip_control_chars("\x1b[31mv2.0\x1b[0m"), "v2.0");
//! assert_eq!(truncate_to_width("Version 2.0 released", 10), "Version...");
//! ```

mod text;
mod url_validator;

pub use text::{display_width, one_line, pad_to_width, strip_control_chars, truncate_to_width};
pub use url_validator::{validate_url, UrlValidationError};
