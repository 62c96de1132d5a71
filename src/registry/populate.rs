use std::sync::Arc;
use strum::IntoEnumIterator;

use super::priority::PriorityTable;
use super::resolver::{CapabilityPolicy, Resolver};
use crate::capability::CapabilityClass;
use crate::config::{CapabilityConfig, Config, PROJECT_ID_VAR, SERVICE_ACCOUNT_KEY_VAR};
use crate::providers::providers::{
    project_id_from_service_account, Credentials, VertexApiConfig, VertexBackend,
    DEFAULT_TOKEN_COMMAND,
};
use crate::providers::{self, ModelBackend};

#[derive(thiserror::Error, Debug)]
pub(crate) enum Error {
    #[error("no project is configured; set {0} or vertex.project_id in the config")]
    MissingProjectId(&'static str),

    #[error("{0} is neither valid JSON nor a readable key file")]
    InvalidServiceAccountKey(&'static str, #[source] serde_json::Error),

    #[error("invalid {capability} priority pattern")]
    InvalidPattern {
        capability: CapabilityClass,
        #[source]
        source: regex::Error,
    },

    #[error("no {0} fallback model is configured")]
    EmptyFallback(CapabilityClass),

    #[error("failed to set up the model platform client: {0}")]
    Backend(#[source] providers::Error),
}

/// The key may be given inline or as a path to the key file.
fn service_account_project_id(key: &str) -> Result<Option<String>, Error> {
    let key = key.trim();

    let contents = if key.starts_with('{') {
        key.to_string()
    } else {
        match std::fs::read_to_string(key) {
            Ok(contents) => contents,
            Err(_) => key.to_string(),
        }
    };

    project_id_from_service_account(&contents)
        .map_err(|e| Error::InvalidServiceAccountKey(SERVICE_ACCOUNT_KEY_VAR, e))
}

fn project_id(config: &Config, service_account_key: Option<String>) -> Result<String, Error> {
    if let Some(project_id) = &config.vertex.project_id {
        return Ok(project_id.clone());
    }

    if let Some(key) = service_account_key {
        if let Some(project_id) = service_account_project_id(&key)? {
            return Ok(project_id);
        }
    }

    Err(Error::MissingProjectId(PROJECT_ID_VAR))
}

fn credentials(config: &Config) -> Credentials {
    match (&config.vertex.access_token, &config.vertex.token_command) {
        (Some(token), _) => Credentials::AccessToken(token.clone()),
        (None, Some(command)) => Credentials::TokenCommand(command.clone()),
        (None, None) => Credentials::TokenCommand(DEFAULT_TOKEN_COMMAND.to_string()),
    }
}

/// Builds the platform client described by `config`.
pub(crate) fn vertex_backend(config: &Config) -> Result<Arc<VertexBackend>, Error> {
    let service_account_key = std::env::var(SERVICE_ACCOUNT_KEY_VAR).ok();

    let api_config = VertexApiConfig {
        project_id: project_id(config, service_account_key)?,
        region: config.region().to_string(),
        api_base: config.vertex.api_base.clone(),
        credentials: credentials(config),
        request_timeout: config.request_timeout(),
    };

    tracing::debug!(
        project = %api_config.project_id,
        region = %api_config.region,
        "configured model platform"
    );

    let backend = VertexBackend::new(api_config).map_err(Error::Backend)?;

    Ok(Arc::new(backend))
}

/// The default policy for `capability` with the overrides of `overrides` applied.
pub(crate) fn capability_policy(
    capability: CapabilityClass,
    overrides: &CapabilityConfig,
) -> Result<CapabilityPolicy, Error> {
    let mut policy = CapabilityPolicy::default_for(capability);

    if let Some(strategy) = overrides.strategy {
        policy.strategy = strategy;
    }

    if let Some(patterns) = &overrides.priority {
        policy.table = PriorityTable::new(patterns)
            .map_err(|source| Error::InvalidPattern { capability, source })?;
    }

    if let Some(candidates) = &overrides.candidates {
        policy.probe_candidates = candidates.clone();
    }

    if let Some(fallback) = &overrides.fallback {
        if fallback.trim().is_empty() {
            return Err(Error::EmptyFallback(capability));
        }

        policy.fallback = fallback.trim().to_string();
    }

    Ok(policy)
}

/// Builds a resolver over `backend` configured by `config`.
pub(crate) fn populated_resolver(
    config: &Config,
    backend: Arc<dyn ModelBackend>,
) -> Result<Resolver, Error> {
    let mut resolver = Resolver::new(backend).with_ttl(config.cache_ttl());

    for capability in CapabilityClass::iter() {
        let policy = capability_policy(capability, config.capabilities.get(capability))?;

        tracing::debug!(
            %capability,
            strategy = %policy.strategy,
            patterns = policy.table.patterns().len(),
            candidates = policy.probe_candidates.len(),
            fallback = %policy.fallback,
            "capability policy"
        );

        resolver = resolver.with_policy(capability, policy);
    }

    Ok(resolver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::probe::testing::ScriptedBackend;
    use crate::registry::resolver::Strategy;
    use std::time::Duration;

    #[test]
    fn overrides_replace_only_what_they_name() {
        let overrides = CapabilityConfig {
            strategy: Some(Strategy::Catalog),
            priority: Some(vec!["fast".to_string(), "v3".to_string(), "v4".to_string()]),
            candidates: None,
            fallback: None,
        };

        let policy = capability_policy(CapabilityClass::Image, &overrides).unwrap();

        assert_eq!(policy.strategy, Strategy::Catalog);
        assert_eq!(policy.table.patterns().len(), 3);
        assert_eq!(policy.fallback, "imagen-3.0-generate-001");
        assert_eq!(policy.probe_candidates[0], "imagen-4.0-generate-001");
    }

    #[test]
    fn bad_patterns_and_fallbacks_are_rejected() {
        let overrides = CapabilityConfig {
            priority: Some(vec!["gemini-(".to_string()]),
            ..Default::default()
        };

        assert!(matches!(
            capability_policy(CapabilityClass::Text, &overrides),
            Err(Error::InvalidPattern {
                capability: CapabilityClass::Text,
                ..
            })
        ));

        let overrides = CapabilityConfig {
            fallback: Some(" ".to_string()),
            ..Default::default()
        };

        assert!(matches!(
            capability_policy(CapabilityClass::Image, &overrides),
            Err(Error::EmptyFallback(CapabilityClass::Image))
        ));
    }

    #[test]
    fn project_id_comes_from_config_then_key() {
        let mut config = Config::default();

        assert!(matches!(
            project_id(&config, None),
            Err(Error::MissingProjectId(_))
        ));

        let key = r#"{"type":"service_account","project_id":"from-key"}"#.to_string();

        assert_eq!(project_id(&config, Some(key.clone())).unwrap(), "from-key");

        config.vertex.project_id = Some("from-config".to_string());

        assert_eq!(project_id(&config, Some(key)).unwrap(), "from-config");
    }

    #[test]
    fn credentials_prefer_a_literal_token() {
        let mut config = Config::default();

        assert_eq!(
            credentials(&config),
            Credentials::TokenCommand(DEFAULT_TOKEN_COMMAND.to_string())
        );

        config.vertex.token_command = Some("print-token".to_string());
        assert_eq!(
            credentials(&config),
            Credentials::TokenCommand("print-token".to_string())
        );

        config.vertex.access_token = Some("ya29".to_string());
        assert_eq!(credentials(&config), Credentials::AccessToken("ya29".to_string()));
    }

    #[tokio::test]
    async fn configured_tables_drive_resolution() {
        let mut config = Config::default();
        config.cache_ttl_secs = Some(5);
        config.capabilities.image = CapabilityConfig {
            strategy: Some(Strategy::Catalog),
            priority: Some(vec!["fast".to_string(), "v3".to_string(), "v4".to_string()]),
            ..Default::default()
        };

        let backend: Arc<dyn ModelBackend> =
            Arc::new(ScriptedBackend::with_catalog(&["v3", "fast"]));

        let resolver = populated_resolver(&config, backend).unwrap();

        assert_eq!(resolver.ttl(), Duration::from_secs(5));
        assert_eq!(resolver.resolve(CapabilityClass::Image, false).await, "v3");
    }
}
