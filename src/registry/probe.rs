//! Discovering which candidate models are usable.
//!
//! Two modes are supported. Listing asks the catalog which models are deployed and
//! leaves ranking to the priority table. Active probing issues a minimal real request
//! against each candidate, most preferred first, and stops at the first one that
//! answers successfully. Neither mode ever fails: problems are logged and turned into
//! "nothing found" so the resolver can fall back.

use serde::Serialize;

use crate::capability::CapabilityClass;
use crate::providers::{ModelBackend, ProbeResponse};

/// The last segment of a hierarchical resource name
/// (`publishers/google/models/imagen-4` becomes `imagen-4`).
pub(crate) fn extract_identifier(resource_name: &str) -> Option<&str> {
    resource_name
        .rsplit('/')
        .next()
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

/// Lists the catalog and extracts model identifiers. A failed listing
/// yields an empty list.
pub(crate) async fn list_candidates<B: ModelBackend + ?Sized>(backend: &B) -> Vec<String> {
    match backend.list_models().await {
        Ok(names) => {
            let ids: Vec<String> = names
                .iter()
                .filter_map(|name| extract_identifier(name))
                .map(str::to_string)
                .collect();

            tracing::debug!(count = ids.len(), "catalog listed");

            ids
        }
        Err(err) => {
            tracing::warn!(error = %err, "model catalog unavailable");

            Vec::new()
        }
    }
}

/// The classified outcome of probing one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ProbeResult {
    pub identifier: String,
    pub available: bool,
    /// The platform said the model does not exist.
    pub not_found: bool,
    pub permission_denied: bool,
    pub http_status: Option<u16>,
}

impl ProbeResult {
    fn unreachable(identifier: &str) -> ProbeResult {
        ProbeResult {
            identifier: identifier.to_string(),
            available: false,
            not_found: false,
            permission_denied: false,
            http_status: None,
        }
    }

    /// Short human-readable verdict, used in reports.
    pub(crate) fn verdict(&self) -> &'static str {
        if self.available {
            "available"
        } else if self.permission_denied {
            "permission denied"
        } else if self.not_found {
            "not found"
        } else if self.http_status.is_some() {
            "unavailable"
        } else {
            "unreachable"
        }
    }
}

fn names_unknown_resource(body: &str) -> bool {
    let body = body.to_lowercase();

    body.contains("not found") || body.contains("does not exist")
}

/// Classifies the response to a probe request.
pub(crate) fn classify_probe(identifier: &str, response: &ProbeResponse) -> ProbeResult {
    let status = response.status;

    let mut result = ProbeResult {
        identifier: identifier.to_string(),
        available: false,
        not_found: false,
        permission_denied: false,
        http_status: Some(status),
    };

    match status {
        200..=299 => {
            tracing::debug!(model = identifier, status, "candidate is available");
            result.available = true;
        }
        400 | 404 if names_unknown_resource(&response.body) => {
            tracing::debug!(model = identifier, status, "candidate does not exist");
            result.not_found = true;
        }
        403 => {
            tracing::warn!(
                model = identifier,
                status,
                "candidate exists but access is denied; the API may need to be enabled for the project"
            );
            result.permission_denied = true;
        }
        _ => {
            tracing::debug!(model = identifier, status, "candidate is unavailable");
        }
    }

    result
}

/// The outcome of an active probe: the first available candidate, if any,
/// and a result for every candidate that was tried.
#[derive(Debug, Clone, Default)]
pub(crate) struct ProbeOutcome {
    pub selected: Option<String>,
    pub results: Vec<ProbeResult>,
}

/// Probes `candidates` in order and stops at the first success.
pub(crate) async fn probe_candidates<B: ModelBackend + ?Sized, S: AsRef<str>>(
    backend: &B,
    capability: CapabilityClass,
    candidates: &[S],
) -> ProbeOutcome {
    let mut outcome = ProbeOutcome::default();

    for candidate in candidates {
        let candidate = candidate.as_ref();

        let result = match backend.probe(capability, candidate).await {
            Ok(response) => classify_probe(candidate, &response),
            Err(err) => {
                tracing::debug!(model = candidate, error = %err, "probe failed");
                ProbeResult::unreachable(candidate)
            }
        };

        let available = result.available;

        outcome.results.push(result);

        if available {
            outcome.selected = Some(candidate.to_string());
            break;
        }
    }

    outcome
}

#[cfg(test)]
pub(crate) mod testing {
    //! A scripted [`ModelBackend`] which records every call.

    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::capability::CapabilityClass;
    use crate::providers::{Error, ErrorKind, ModelBackend, ProbeResponse};

    #[derive(Default)]
    pub(crate) struct ScriptedBackend {
        /// `None` makes the listing fail.
        pub catalog: Option<Vec<String>>,
        /// Status and body per model; unknown models answer 404.
        pub responses: HashMap<String, (u16, String)>,
        /// Models whose probe fails at the transport level
        pub unreachable: Vec<String>,
        /// Delay applied to every call, to widen race windows in tests
        pub latency: Option<Duration>,
        pub list_calls: AtomicUsize,
        pub probed: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        pub(crate) fn with_catalog<S: AsRef<str>>(catalog: &[S]) -> ScriptedBackend {
            ScriptedBackend {
                catalog: Some(catalog.iter().map(|s| s.as_ref().to_string()).collect()),
                ..Default::default()
            }
        }

        pub(crate) fn failing() -> ScriptedBackend {
            ScriptedBackend::default()
        }

        pub(crate) fn respond(mut self, model: &str, status: u16, body: &str) -> ScriptedBackend {
            self.responses
                .insert(model.to_string(), (status, body.to_string()));
            self
        }

        pub(crate) fn list_calls(&self) -> usize {
            self.list_calls.load(Ordering::SeqCst)
        }

        pub(crate) fn probed(&self) -> Vec<String> {
            self.probed.lock().unwrap().clone()
        }

        async fn delay(&self) {
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
        }
    }

    #[async_trait]
    impl ModelBackend for ScriptedBackend {
        async fn list_models(&self) -> Result<Vec<String>, Error> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            self.delay().await;

            match &self.catalog {
                Some(catalog) => Ok(catalog.clone()),
                None => Err(Error::from_kind(ErrorKind::Authentication)),
            }
        }

        async fn probe(
            &self,
            _capability: CapabilityClass,
            model: &str,
        ) -> Result<ProbeResponse, Error> {
            self.probed.lock().unwrap().push(model.to_string());
            self.delay().await;

            if self.unreachable.iter().any(|m| m == model) {
                return Err(Error::from_kind(ErrorKind::Connection));
            }

            let (status, body) = self
                .responses
                .get(model)
                .cloned()
                .unwrap_or((404, format!("Publisher Model `{}` not found.", model)));

            Ok(ProbeResponse { status, body })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedBackend;
    use super::*;

    fn response(status: u16, body: &str) -> ProbeResponse {
        ProbeResponse {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn identifiers_are_the_last_path_segment() {
        assert_eq!(
            extract_identifier("publishers/google/models/imagen-4.0-generate-001"),
            Some("imagen-4.0-generate-001")
        );
        assert_eq!(extract_identifier("gemini-2.0-flash"), Some("gemini-2.0-flash"));
        assert_eq!(extract_identifier("projects/p/models/"), None);
        assert_eq!(extract_identifier(""), None);
    }

    #[test]
    fn classification() {
        assert!(classify_probe("a", &response(200, "{}")).available);

        let missing = classify_probe("a", &response(404, "Model does not exist"));
        assert!(!missing.available && !missing.permission_denied);
        assert_eq!(missing.verdict(), "not found");

        let denied = classify_probe("a", &response(403, "PERMISSION_DENIED"));
        assert!(denied.permission_denied && !denied.available);
        assert_eq!(denied.verdict(), "permission denied");

        let throttled = classify_probe("a", &response(429, "RESOURCE_EXHAUSTED"));
        assert!(!throttled.available && !throttled.permission_denied);
        assert_eq!(throttled.http_status, Some(429));
        assert_eq!(throttled.verdict(), "unavailable");

        let bad = classify_probe("a", &response(400, "invalid aspect ratio"));
        assert!(!bad.available && !bad.not_found);
        assert_eq!(bad.verdict(), "unavailable");

        let unknown = classify_probe("a", &response(400, "Publisher Model `a` was not found"));
        assert!(unknown.not_found);
        assert_eq!(unknown.verdict(), "not found");

        let gone = classify_probe("a", &response(404, ""));
        assert!(!gone.not_found);
        assert_eq!(gone.verdict(), "unavailable");
    }

    #[tokio::test]
    async fn failed_listing_is_empty() {
        let backend = ScriptedBackend::failing();

        assert!(list_candidates(&backend).await.is_empty());
        assert_eq!(backend.list_calls(), 1);
    }

    #[tokio::test]
    async fn listing_extracts_identifiers() {
        let backend = ScriptedBackend::with_catalog(&[
            "publishers/google/models/imagen-3.0-generate-001",
            "publishers/google/models/",
            "publishers/google/models/gemini-2.0-flash-001",
        ]);

        assert_eq!(
            list_candidates(&backend).await,
            vec!["imagen-3.0-generate-001", "gemini-2.0-flash-001"]
        );
    }

    #[tokio::test]
    async fn probing_stops_at_the_first_success() {
        let backend = ScriptedBackend::failing()
            .respond("a", 200, "{}")
            .respond("b", 200, "{}")
            .respond("c", 200, "{}");

        let outcome = probe_candidates(&backend, CapabilityClass::Image, &["a", "b", "c"]).await;

        assert_eq!(outcome.selected.as_deref(), Some("a"));
        assert_eq!(backend.probed(), vec!["a"]);
    }

    #[tokio::test]
    async fn permission_denied_does_not_abort_the_scan() {
        let backend = ScriptedBackend::failing()
            .respond("a", 403, "Vertex AI API has not been enabled")
            .respond("b", 200, "{}");

        let outcome = probe_candidates(&backend, CapabilityClass::Image, &["a", "b", "c"]).await;

        assert_eq!(outcome.selected.as_deref(), Some("b"));
        assert_eq!(backend.probed(), vec!["a", "b"]);
        assert!(outcome.results[0].permission_denied);
        assert!(outcome.results[1].available);
    }

    #[tokio::test]
    async fn only_the_second_candidate_answers() {
        let backend = ScriptedBackend::failing().respond("v4-b", 200, "{}");

        let outcome =
            probe_candidates(&backend, CapabilityClass::Image, &["v4-a", "v4-b", "v4-c"]).await;

        assert_eq!(outcome.selected.as_deref(), Some("v4-b"));
        assert_eq!(backend.probed().len(), 2);
    }

    #[tokio::test]
    async fn exhausted_candidates_select_nothing() {
        let mut backend = ScriptedBackend::failing().respond("b", 500, "internal");
        backend.unreachable.push("c".to_string());

        let outcome = probe_candidates(&backend, CapabilityClass::Text, &["a", "b", "c"]).await;

        assert_eq!(outcome.selected, None);
        assert_eq!(outcome.results.len(), 3);
        assert_eq!(outcome.results[2].verdict(), "unreachable");
    }
}
