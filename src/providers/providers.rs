//! Concrete types for providers

pub(crate) use super::vertex::auth::{
    project_id_from_service_account, Credentials, DEFAULT_TOKEN_COMMAND,
};
pub(crate) use super::vertex::{VertexApiConfig, VertexBackend};
