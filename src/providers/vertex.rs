//! An umbrella module for the Vertex AI provider

mod api;
pub(crate) mod auth;
mod provider;

pub(crate) use self::provider::{VertexApiConfig, VertexBackend};
