//! Utility functions for common operations.
//!
//! - **URL validation**: accept only absolute http(s) URLs for catalogs and feeds
//! - **Text processing**: sanitize third-party text and normalize blank values

mod text;
mod url_validator;

pub use text::{non_blank, strip_control_chars};
pub use url_validator::{validate_url, UrlValidationError};
