//! A utility model with helpers for making and parsing API requests.

mod error;
mod provider;

pub(crate) use error::Error as ReqwestError;
pub(crate) use error::ErrorKind as ReqwestErrorKind;
pub(crate) use reqwest::Url;

use std::time::Duration;

/// Builds the HTTP client shared by every request a backend makes. The timeout
/// bounds each request end to end.
pub(crate) fn client_with_timeout(timeout: Duration) -> Result<reqwest::Client, ReqwestError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}
