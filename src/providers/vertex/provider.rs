use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::time::Duration;

use super::api;
use super::auth::{Credentials, TokenSource};
use crate::capability::CapabilityClass;
use crate::providers::apireq;
use crate::providers::{
    Error, ErrorKind, GeneratedImage, GenerationProvider, ModelBackend, ProbeResponse,
};

impl From<api::Error> for Error {
    fn from(value: api::Error) -> Self {
        let kind = match &value {
            api::Error::Authentication(_) => Some(ErrorKind::Authentication),
            api::Error::PermissionDenied(_) => Some(ErrorKind::PermissionDenied),
            api::Error::BadRequest(_)
            | api::Error::InvalidApiBase(_)
            | api::Error::InvalidEndpoint(_) => Some(ErrorKind::BadRequest),
            api::Error::MalformedResponse(_) => Some(ErrorKind::UnexpectedResponse),
            api::Error::InternalError(_) => Some(ErrorKind::InternalError),
            api::Error::NotFound(_) => Some(ErrorKind::NotFound),
            api::Error::RateLimit(_) => Some(ErrorKind::ExcessUsage),
            api::Error::UnknownStatus(_) => Some(ErrorKind::UnspecifiedError),
            api::Error::ApiOverloaded(_) => Some(ErrorKind::ApiOverloaded),

            api::Error::RequestFailed(_) => None,
        };

        match (kind, value) {
            (None, api::Error::RequestFailed(err)) => err.into(),
            (Some(kind), value) => Error::from_source(kind, Box::new(value)),
            (None, value) => Error::from_source(ErrorKind::UnspecifiedError, Box::new(value)),
        }
    }
}

/// Everything needed to reach the platform for one project and region.
#[derive(Debug, Clone)]
pub(crate) struct VertexApiConfig {
    pub project_id: String,
    pub region: String,
    /// Overrides the regional endpoint; used with proxies and local emulators.
    pub api_base: Option<String>,
    pub credentials: Credentials,
    pub request_timeout: Duration,
}

pub(crate) struct VertexBackend {
    api: api::VertexApi,
    tokens: TokenSource,
}

impl VertexBackend {
    pub(crate) fn new(config: VertexApiConfig) -> Result<VertexBackend, Error> {
        let client = apireq::client_with_timeout(config.request_timeout)?;

        let api = api::VertexApi::new(
            client,
            &config.project_id,
            &config.region,
            config.api_base.as_deref(),
        )?;

        Ok(VertexBackend {
            api,
            tokens: TokenSource::new(config.credentials),
        })
    }
}

fn decode_prediction(index: usize, prediction: api::Prediction) -> Option<GeneratedImage> {
    let encoded = match prediction.bytes_base64_encoded {
        Some(encoded) => encoded,
        None => {
            tracing::warn!(index, "prediction is missing image bytes");
            return None;
        }
    };

    match BASE64.decode(encoded.as_bytes()) {
        Ok(bytes) => Some(GeneratedImage {
            bytes,
            mime_type: prediction.mime_type,
        }),
        Err(err) => {
            tracing::warn!(index, error = %err, "prediction carries invalid base64");
            None
        }
    }
}

#[async_trait]
impl ModelBackend for VertexBackend {
    async fn list_models(&self) -> Result<Vec<String>, Error> {
        let token = self.tokens.token().await?;

        let models = self.api.list_publisher_models(&token).await?;

        Ok(models.into_iter().map(|m| m.name).collect())
    }

    async fn probe(
        &self,
        capability: CapabilityClass,
        model: &str,
    ) -> Result<ProbeResponse, Error> {
        let token = self.tokens.token().await?;

        let (status, body) = match capability {
            CapabilityClass::Image => self.api.probe_predict(model, &token).await?,
            CapabilityClass::Text => self.api.probe_generate_content(model, &token).await?,
        };

        Ok(ProbeResponse {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl GenerationProvider for VertexBackend {
    async fn generate_images(
        &self,
        model: &str,
        prompt: &str,
        count: u32,
    ) -> Result<Vec<GeneratedImage>, Error> {
        let token = self.tokens.token().await?;

        let res = self.api.predict(model, &token, prompt, count).await?;

        tracing::debug!(model, predictions = res.predictions.len(), "predict returned");

        let images: Vec<GeneratedImage> = res
            .predictions
            .into_iter()
            .enumerate()
            .filter_map(|(i, p)| decode_prediction(i, p))
            .collect();

        if images.is_empty() {
            return Err(Error::from_kind(ErrorKind::UnexpectedResponse));
        }

        Ok(images)
    }

    async fn generate_text(&self, model: &str, prompt: &str) -> Result<String, Error> {
        let token = self.tokens.token().await?;

        let res = self.api.generate_content(model, &token, prompt).await?;

        res.text()
            .ok_or_else(|| Error::from_kind(ErrorKind::UnexpectedResponse))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn api_errors_keep_their_category() {
        let quota = r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;

        let err: Error = api::Error::from_response(StatusCode::TOO_MANY_REQUESTS, quota).into();

        assert_eq!(err.kind(), ErrorKind::ExcessUsage);
        assert!(err.to_string().contains("Quota exceeded"));

        let err: Error = api::Error::from_response(StatusCode::FORBIDDEN, "{}").into();

        assert_eq!(err.kind(), ErrorKind::PermissionDenied);

        let err: Error = api::Error::from_response(StatusCode::UNAUTHORIZED, "{}").into();

        assert_eq!(err.kind(), ErrorKind::Authentication);
    }

    #[test]
    fn predictions_without_bytes_are_skipped() {
        let ok = api::Prediction {
            bytes_base64_encoded: Some(BASE64.encode(b"\x89PNG")),
            mime_type: Some("image/png".to_string()),
        };

        let image = decode_prediction(0, ok).unwrap();

        assert_eq!(image.bytes, b"\x89PNG");
        assert_eq!(image.mime_type.as_deref(), Some("image/png"));

        assert!(decode_prediction(1, api::Prediction::default()).is_none());

        let garbage = api::Prediction {
            bytes_base64_encoded: Some("***".to_string()),
            mime_type: None,
        };

        assert!(decode_prediction(2, garbage).is_none());
    }

    #[tokio::test]
    async fn unreachable_backend_reports_a_transport_error() {
        let backend = VertexBackend::new(VertexApiConfig {
            project_id: "p".to_string(),
            region: "us-central1".to_string(),
            api_base: Some("http://127.0.0.1:9/".to_string()),
            credentials: Credentials::AccessToken("token".to_string()),
            request_timeout: Duration::from_secs(5),
        })
        .unwrap();

        let err = backend.list_models().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Connection);

        let err = backend
            .probe(CapabilityClass::Image, "imagen-4")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Connection);
    }
}
