//! Traits and type definitions for talking to a generative model platform.
//!
//! Model selection and generation go through two traits:
//! - [`ModelBackend`]: the operations the resolver needs, namely listing the catalog of
//!   deployed models and issuing a minimal test call against one candidate.
//! - [`GenerationProvider`]: the actual inference calls, producing images or text with a
//!   concrete model identifier chosen by the resolver.
//!
//! ## Error Handling
//!
//! Each platform has its own bespoke error payloads. These are encapsulated in [`Error`],
//! and the [`ErrorKind`] enum provides an indication of the category of error that was raised.
//! The categories matter downstream: a rate limit must never be retried, while an
//! authentication failure calls for a configuration change.

mod apireq;
mod vertex;

pub(crate) mod providers;

use async_trait::async_trait;
use std::error::Error as StdError;
use std::fmt;

use crate::capability::CapabilityClass;

/// This is a list specifying general categories of errors that
/// can be returned by a [`ModelBackend`] or a [`GenerationProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    /// Failed to connect to the underlying API service.
    /// This could be due to network issues like DNS
    /// resolution, connectivity issues, or routing problems.
    Connection,
    /// A request timed out.
    TimedOut,
    /// Credentials were not provided, could not be obtained, or were rejected.
    Authentication,
    /// The credentials are valid but lack access to the resource. Usually
    /// an API has not been enabled for the project or a role is missing.
    PermissionDenied,
    /// A rate limit was reached or a quota was exceeded.
    ExcessUsage,
    /// The servers are overloaded. This is non-fatal
    /// and indicates that a retry may be needed later.
    ApiOverloaded,
    /// The requested resource was not found. This likely means that
    /// the model does not exist in the configured region.
    NotFound,
    /// The request was malformed or is otherwise improper. This
    /// often corresponds to errors with HTTP status codes in
    /// the 400s.
    BadRequest,
    /// The server encountered an error. This often corresponds to
    /// errors with HTTP status codes in the 500s.
    InternalError,
    /// An API response was unable to be deserialized, malformed,
    /// or otherwise violated the assumptions of the client.
    UnexpectedResponse,
    /// An error that does not fit into any of the other categories.
    UnspecifiedError,
}

#[derive(Debug)]
pub(crate) struct Error {
    kind: ErrorKind,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub(crate) fn from_kind(kind: ErrorKind) -> Error {
        Error { kind, source: None }
    }

    pub(crate) fn from_source(kind: ErrorKind, source: Box<dyn StdError + Send + Sync>) -> Error {
        Error {
            kind,
            source: Some(source),
        }
    }

    pub(crate) fn kind(&self) -> ErrorKind {
        self.kind
    }

    fn message(&self) -> &'static str {
        match self.kind {
            ErrorKind::Connection => "failed to connect to the API service",
            ErrorKind::TimedOut => "request timed out",
            ErrorKind::Authentication => "authentication failed or not provided",
            ErrorKind::PermissionDenied => "permission denied",
            ErrorKind::ExcessUsage => "rate limit exceeded or quota crossed",
            ErrorKind::ApiOverloaded => "API server(s) are currently overloaded",
            ErrorKind::NotFound => "the requested resource was not found",
            ErrorKind::BadRequest => "the request was bad or malformed",
            ErrorKind::InternalError => "the server encountered an internal error",
            ErrorKind::UnexpectedResponse => "API response was unexpected or malformed",
            ErrorKind::UnspecifiedError => "an unspecified error occurred",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {}", self.message(), source),
            None => write!(f, "{}", self.message()),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_ref().map(|e| &**e as _)
    }
}

/// The raw outcome of one minimal test call against a candidate model.
/// Any HTTP response, successful or not, is a `ProbeResponse`; only
/// transport failures are reported as [`Error`].
#[derive(Debug, Clone)]
pub(crate) struct ProbeResponse {
    pub status: u16,
    pub body: String,
}

/// One generated image, as returned by the platform.
#[derive(Debug, Clone)]
pub(crate) struct GeneratedImage {
    /// Encoded image bytes.
    pub bytes: Vec<u8>,
    /// The MIME type reported by the platform, if any.
    pub mime_type: Option<String>,
}

/// The catalog and probing operations used for model selection.
#[async_trait]
pub(crate) trait ModelBackend: Send + Sync {
    /// Returns the resource names of the models currently deployed. Names
    /// may be hierarchical (e.g., `publishers/google/models/imagen-4`).
    async fn list_models(&self) -> Result<Vec<String>, Error>;

    /// Issues a minimal real request against `model` for the given capability
    /// and reports the HTTP status and body.
    async fn probe(&self, capability: CapabilityClass, model: &str)
        -> Result<ProbeResponse, Error>;
}

/// A trait implemented by platforms that can run inference.
#[async_trait]
pub(crate) trait GenerationProvider: Send + Sync {
    /// Generates up to `count` images for `prompt` with the image model `model`.
    async fn generate_images(
        &self,
        model: &str,
        prompt: &str,
        count: u32,
    ) -> Result<Vec<GeneratedImage>, Error>;

    /// Generates a single text completion for `prompt` with the text model `model`.
    async fn generate_text(&self, model: &str, prompt: &str) -> Result<String, Error>;
}
