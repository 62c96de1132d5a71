use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::providers::apireq::{self, Url};

const PUBLISHER: &str = "google";

/// Models are listed 100 at a time; the catalog is a few hundred entries.
const LIST_PAGE_SIZE: u32 = 100;

#[derive(thiserror::Error, Debug)]
pub(super) enum Error {
    /// The API base is not a URL that can be used in a network request
    #[error("invalid api base \"{0}\"")]
    InvalidApiBase(String),

    /// Endpoint URL is invalid
    #[error("invalid endpoint")]
    InvalidEndpoint(
        #[from]
        #[source]
        url::ParseError,
    ),

    /// Some issue with the request
    #[error("{}", .0)]
    RequestFailed(
        #[from]
        #[source]
        apireq::ReqwestError,
    ),

    /// The response had a success status but a body we could not decode
    #[error("malformed response body")]
    MalformedResponse(#[source] serde_json::Error),

    /// The request was malformed or named a model the platform does not know.
    #[error("{}", .0)]
    BadRequest(ApiErrorPayload),

    /// The access token is missing, expired or invalid.
    #[error("{}", .0)]
    Authentication(ApiErrorPayload),

    /// The caller may not use the resource. Usually the API is not enabled
    /// for the project or the account is missing a role.
    #[error("{}", .0)]
    PermissionDenied(ApiErrorPayload),

    /// Requested resource does not exist.
    #[error("{}", .0)]
    NotFound(ApiErrorPayload),

    /// The project quota is exhausted.
    #[error("{}", .0)]
    RateLimit(ApiErrorPayload),

    /// The platform has an internal issue
    #[error("{}", .0)]
    InternalError(ApiErrorPayload),

    /// The service is temporarily unavailable
    #[error("{}", .0)]
    ApiOverloaded(ApiErrorPayload),

    /// Some unknown error was returned by the API
    #[error("{}", .0)]
    UnknownStatus(ApiErrorPayload),
}

impl Error {
    pub(super) fn from_response(status: StatusCode, body: &str) -> Error {
        let payload = ApiErrorPayload::parse(status, body);

        // The platform reports quota exhaustion by status name as well as code.
        if payload.status.as_deref() == Some("RESOURCE_EXHAUSTED") {
            return Error::RateLimit(payload);
        }

        match status.as_u16() {
            400 => Error::BadRequest(payload),
            401 => Error::Authentication(payload),
            403 => Error::PermissionDenied(payload),
            404 => Error::NotFound(payload),
            429 => Error::RateLimit(payload),
            500 => Error::InternalError(payload),
            503 => Error::ApiOverloaded(payload),
            _ => Error::UnknownStatus(payload),
        }
    }
}

/* API Errors */

#[derive(Deserialize, Debug, Clone)]
pub(super) struct ApiErrorPayload {
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    error: ApiErrorPayload,
}

impl ApiErrorPayload {
    fn parse(status: StatusCode, body: &str) -> ApiErrorPayload {
        match serde_json::from_str::<ApiErrorResponse>(body) {
            Ok(res) => res.error,
            Err(_) => ApiErrorPayload {
                code: status.as_u16(),
                message: body.trim().to_string(),
                status: None,
            },
        }
    }
}

impl std::fmt::Display for ApiErrorPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.status {
            Some(status) => write!(f, "{} {}: {}", self.code, status, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

/* Structures to deserialize publishers/google/models */

#[derive(Deserialize, Debug)]
pub(super) struct PublisherModel {
    pub name: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ListPublisherModelsResponse {
    #[serde(default)]
    publisher_models: Vec<PublisherModel>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/* Structures to serialize {model}:predict */

#[derive(Serialize, Debug)]
struct PredictInstance<'p> {
    prompt: &'p str,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PredictParameters {
    sample_count: u32,
    aspect_ratio: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    safety_filter_level: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    person_generation: Option<&'static str>,
}

#[derive(Serialize, Debug)]
struct PredictRequest<'p> {
    instances: [PredictInstance<'p>; 1],
    parameters: PredictParameters,
}

impl<'p> PredictRequest<'p> {
    fn probe() -> PredictRequest<'static> {
        PredictRequest {
            instances: [PredictInstance { prompt: "test" }],
            parameters: PredictParameters {
                sample_count: 1,
                aspect_ratio: "3:4",
                safety_filter_level: None,
                person_generation: None,
            },
        }
    }

    fn generate(prompt: &'p str, count: u32) -> PredictRequest<'p> {
        PredictRequest {
            instances: [PredictInstance { prompt }],
            parameters: PredictParameters {
                sample_count: count,
                aspect_ratio: "3:4",
                safety_filter_level: Some("block_some"),
                person_generation: Some("allow_adult"),
            },
        }
    }
}

/* Structures to deserialize {model}:predict */

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub(super) struct Prediction {
    pub bytes_base64_encoded: Option<String>,
    pub mime_type: Option<String>,
}

#[derive(Deserialize, Debug)]
pub(super) struct PredictResponse {
    #[serde(default)]
    pub predictions: Vec<Prediction>,
}

/* Structures to serialize {model}:generateContent */

#[derive(Serialize, Debug)]
struct Part<'p> {
    text: &'p str,
}

#[derive(Serialize, Debug)]
struct Content<'p> {
    role: &'static str,
    parts: [Part<'p>; 1],
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'p> {
    contents: [Content<'p>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

impl<'p> GenerateContentRequest<'p> {
    fn new(prompt: &'p str, max_output_tokens: Option<u32>) -> GenerateContentRequest<'p> {
        GenerateContentRequest {
            contents: [Content {
                role: "user",
                parts: [Part { text: prompt }],
            }],
            generation_config: max_output_tokens.map(|max_output_tokens| GenerationConfig {
                max_output_tokens,
            }),
        }
    }
}

/* Structures to deserialize {model}:generateContent */

#[derive(Deserialize, Debug, Default)]
pub(super) struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub(super) struct ResponseContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
pub(super) struct Candidate {
    #[serde(default)]
    pub content: ResponseContent,
}

#[derive(Deserialize, Debug)]
pub(super) struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate
    pub(super) fn text(&self) -> Option<String> {
        let candidate = self.candidates.first()?;

        let text: String = candidate
            .content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();

        Some(text)
    }
}

pub(super) struct VertexApi {
    client: Client,
    api_base: Url,
    project_id: String,
    region: String,
}

impl VertexApi {
    pub(super) fn new(
        client: Client,
        project_id: &str,
        region: &str,
        api_base: Option<&str>,
    ) -> Result<VertexApi, Error> {
        let api_base = match api_base {
            Some(api_base) => api_base.to_string(),
            None => format!("https://{}-aiplatform.googleapis.com/", region),
        };

        // Url::join replaces the last path segment unless the base ends in a slash
        let normalized = if api_base.ends_with('/') {
            api_base.clone()
        } else {
            format!("{}/", api_base)
        };

        let api_base = Url::parse(&normalized).map_err(|_| Error::InvalidApiBase(api_base))?;

        Ok(VertexApi {
            client,
            api_base,
            project_id: project_id.to_string(),
            region: region.to_string(),
        })
    }

    fn model_url(&self, model: &str, method: &str) -> Result<Url, Error> {
        let path = format!(
            "v1/projects/{}/locations/{}/publishers/{}/models/{}:{}",
            self.project_id, self.region, PUBLISHER, model, method
        );

        Ok(self.api_base.join(&path)?)
    }

    pub(super) async fn list_publisher_models(
        &self,
        token: &str,
    ) -> Result<Vec<PublisherModel>, Error> {
        let url = self
            .api_base
            .join(&format!("v1beta1/publishers/{}/models", PUBLISHER))?;

        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut req = self
                .client
                .get(url.clone())
                .bearer_auth(token)
                .header("x-goog-user-project", &self.project_id)
                .query(&[("pageSize", LIST_PAGE_SIZE.to_string())]);

            if let Some(page_token) = &page_token {
                req = req.query(&[("pageToken", page_token)]);
            }

            let (status, body) = Self::send(req).await?;

            if !status.is_success() {
                return Err(Error::from_response(status, &body));
            }

            let page: ListPublisherModelsResponse =
                serde_json::from_str(&body).map_err(Error::MalformedResponse)?;

            models.extend(page.publisher_models);

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        Ok(models)
    }

    async fn send(req: reqwest::RequestBuilder) -> Result<(StatusCode, String), Error> {
        let res = req
            .send()
            .await
            .map_err(|e| Error::RequestFailed(e.into()))?;

        let status = res.status();

        let body = res
            .text()
            .await
            .map_err(|e| Error::RequestFailed(e.into()))?;

        Ok((status, body))
    }

    async fn post<T: Serialize>(
        &self,
        url: Url,
        token: &str,
        body: &T,
    ) -> Result<(StatusCode, String), Error> {
        let req = self.client.post(url).bearer_auth(token).json(body);

        Self::send(req).await
    }

    /// Sends the smallest possible predict request. The response is returned
    /// as-is, whatever its status.
    pub(super) async fn probe_predict(
        &self,
        model: &str,
        token: &str,
    ) -> Result<(StatusCode, String), Error> {
        let url = self.model_url(model, "predict")?;

        self.post(url, token, &PredictRequest::probe()).await
    }

    /// Sends a one-token generateContent request. The response is returned
    /// as-is, whatever its status.
    pub(super) async fn probe_generate_content(
        &self,
        model: &str,
        token: &str,
    ) -> Result<(StatusCode, String), Error> {
        let url = self.model_url(model, "generateContent")?;

        self.post(url, token, &GenerateContentRequest::new("ping", Some(1)))
            .await
    }

    pub(super) async fn predict(
        &self,
        model: &str,
        token: &str,
        prompt: &str,
        count: u32,
    ) -> Result<PredictResponse, Error> {
        let url = self.model_url(model, "predict")?;

        let (status, body) = self
            .post(url, token, &PredictRequest::generate(prompt, count))
            .await?;

        if !status.is_success() {
            return Err(Error::from_response(status, &body));
        }

        serde_json::from_str(&body).map_err(Error::MalformedResponse)
    }

    pub(super) async fn generate_content(
        &self,
        model: &str,
        token: &str,
        prompt: &str,
    ) -> Result<GenerateContentResponse, Error> {
        let url = self.model_url(model, "generateContent")?;

        let (status, body) = self
            .post(url, token, &GenerateContentRequest::new(prompt, None))
            .await?;

        if !status.is_success() {
            return Err(Error::from_response(status, &body));
        }

        serde_json::from_str(&body).map_err(Error::MalformedResponse)
    }
}
