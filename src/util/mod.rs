//! Utility functions shared by configuration and fetching.
//!
//! - **URL validation**: rejects feed URLs that would turn the server into an
//!   SSRF proxy (non-HTTP schemes, localhost, private ranges)

mod url_validator;

pub use url_validator::{validate_url, UrlValidationError};
