//! Utility functions shared across the crate.
//!
//! - **URL validation**: turning user input into a validated feed URL, or
//!   failing explicitly before any network I/O
//! - **Text processing**: sanitizing feed metadata for terminal output

mod text;
mod url_validator;

pub use text::{strip_control_chars, truncate_chars};
pub use url_validator::{validate_feed_url, UrlPolicy, UrlValidationError};
