use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::capability::CapabilityClass;
use crate::registry::resolver::{Strategy, DEFAULT_CACHE_TTL};
use crate::warn;

pub(crate) const DEFAULT_REGION: &str = "us-central1";
pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const DEFAULT_GENERATION_INTERVAL: Duration = Duration::from_secs(30);

pub(crate) const PROJECT_ID_VAR: &str = "GOOGLE_CLOUD_PROJECT_ID";
pub(crate) const REGION_VAR: &str = "GOOGLE_CLOUD_REGION";
pub(crate) const ACCESS_TOKEN_VAR: &str = "GOOGLE_CLOUD_ACCESS_TOKEN";
pub(crate) const SERVICE_ACCOUNT_KEY_VAR: &str = "GOOGLE_SERVICE_ACCOUNT_KEY";
pub(crate) const CACHE_TTL_VAR: &str = "MODELSCOUT_CACHE_TTL_SECS";

#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub(crate) struct Vertex {
    pub project_id: Option<String>,
    pub region: Option<String>,
    /// Overrides the regional endpoint
    pub api_base: Option<String>,
    pub access_token: Option<String>,
    pub token_command: Option<String>,
}

/// Per-capability overrides. Anything left unset keeps its built-in default.
#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub(crate) struct CapabilityConfig {
    pub strategy: Option<Strategy>,
    /// Regular expressions, least preferred first
    pub priority: Option<Vec<String>>,
    /// Identifiers to probe, most preferred first
    pub candidates: Option<Vec<String>>,
    pub fallback: Option<String>,
}

#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub(crate) struct Capabilities {
    #[serde(default)]
    pub text: CapabilityConfig,
    #[serde(default)]
    pub image: CapabilityConfig,
}

impl Capabilities {
    pub(crate) fn get(&self, capability: CapabilityClass) -> &CapabilityConfig {
        match capability {
            CapabilityClass::Text => &self.text,
            CapabilityClass::Image => &self.image,
        }
    }
}

#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub(crate) struct Config {
    pub cache_ttl_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub min_generation_interval_secs: Option<u64>,
    #[serde(default)]
    pub vertex: Vertex,
    #[serde(default)]
    pub capabilities: Capabilities,
}

impl Config {
    pub(crate) fn cache_ttl(&self) -> Duration {
        self.cache_ttl_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CACHE_TTL)
    }

    pub(crate) fn request_timeout(&self) -> Duration {
        self.request_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT)
    }

    pub(crate) fn min_generation_interval(&self) -> Duration {
        self.min_generation_interval_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_GENERATION_INTERVAL)
    }

    pub(crate) fn region(&self) -> &str {
        self.vertex.region.as_deref().unwrap_or(DEFAULT_REGION)
    }

    /// Applies environment overrides. Environment values win over the file.
    pub(crate) fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| var(name).filter(|v| !v.trim().is_empty());

        if let Some(project_id) = non_empty(PROJECT_ID_VAR) {
            self.vertex.project_id = Some(project_id);
        }

        if let Some(region) = non_empty(REGION_VAR) {
            self.vertex.region = Some(region);
        }

        if let Some(token) = non_empty(ACCESS_TOKEN_VAR) {
            self.vertex.access_token = Some(token);
        }

        if let Some(ttl) = non_empty(CACHE_TTL_VAR) {
            match ttl.trim().parse::<u64>() {
                Ok(ttl) => self.cache_ttl_secs = Some(ttl),
                Err(_) => warn!("ignoring {}: \"{}\" is not a number of seconds", CACHE_TTL_VAR, ttl),
            }
        }
    }
}

fn get_config_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME");

    if let Some(home) = home {
        let home = PathBuf::from(home);

        const USER_PATHS: [&str; 2] = [".config/modelscout/config.toml", ".modelscout.toml"];

        for &path in USER_PATHS.iter() {
            let fullpath = home.join(path);

            if fullpath.exists() {
                return Some(fullpath);
            }
        }
    }

    let system_config = PathBuf::from("/etc/modelscout.toml");

    if system_config.exists() {
        Some(system_config)
    } else {
        None
    }
}

fn parse_config_or_die<S: serde::de::DeserializeOwned>(config: &str) -> S {
    let r: Result<S, toml::de::Error> = toml::de::from_str(config);

    match r {
        Ok(s) => s,
        Err(err) => die::die!("failed to parse config: {}", err),
    }
}

fn extra_fields_helper<'a>(
    path: &mut Vec<&'a str>,
    user_config: &'a toml::Table,
    config: &'a toml::Table,
    extra: &mut Vec<String>,
) {
    for (user_key, user_value) in user_config {
        path.push(user_key);

        match (user_value, config.get(user_key)) {
            (toml::Value::Table(user_value), Some(toml::Value::Table(config_value))) => {
                extra_fields_helper(path, user_value, config_value, extra)
            }
            (_, Some(_)) => {}
            (_, None) => extra.push(path.join(".")),
        }

        path.pop();
    }
}

/// Dotted paths of keys present in `raw_config` that the parsed config does not know about.
fn extra_fields(config: &Config, raw_config: &str) -> Vec<String> {
    let user_config: toml::Table = parse_config_or_die(raw_config);

    let config: toml::Table = match toml::ser::to_string(config) {
        Ok(serialized_config) => parse_config_or_die(&serialized_config),
        Err(err) => die::die!("failed to reserialize config: {}", err),
    };

    let mut path = Vec::new();
    let mut extra = Vec::new();

    extra_fields_helper(&mut path, &user_config, &config, &mut extra);

    extra
}

fn parse_config(raw_config: &str) -> Config {
    let config: Config = parse_config_or_die(raw_config);

    for key in extra_fields(&config, raw_config) {
        warn!("config contains extraneous key \"{}\", ignoring", key);
    }

    config
}

/// Reads the config file (if any) and applies environment overrides.
pub(crate) fn read_config(config: Option<PathBuf>) -> Config {
    let config_path = config.or_else(get_config_path);

    let mut config = match config_path {
        Some(path) => match std::fs::read_to_string(&path) {
            Ok(raw_config) => parse_config(&raw_config),
            Err(err) => die::die!("failed to read config {}: {}", path.display(), err),
        },
        None => Config::default(),
    };

    config.apply_env(|name| std::env::var(name).ok());

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
cache_ttl_secs = 600

[vertex]
project_id = "ad-studio"
token_command = "gcloud auth print-access-token"

[capabilities.text]
strategy = "catalog"
priority = ["gemini-1\\.5", "gemini-2\\.0"]

[capabilities.image]
strategy = "catalog_then_probe"
candidates = ["imagen-4.0-generate-001"]
fallback = "imagen-3.0-generate-001"
"#;

    #[test]
    fn parses_a_full_config() {
        let config = parse_config(SAMPLE);

        assert_eq!(config.cache_ttl(), Duration::from_secs(600));
        assert_eq!(config.request_timeout(), DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(config.region(), DEFAULT_REGION);
        assert_eq!(config.vertex.project_id.as_deref(), Some("ad-studio"));

        let text = config.capabilities.get(CapabilityClass::Text);
        assert_eq!(text.strategy, Some(Strategy::Catalog));
        assert_eq!(text.priority.as_ref().unwrap()[1], r"gemini-2\.0");
        assert!(text.fallback.is_none());

        let image = config.capabilities.get(CapabilityClass::Image);
        assert_eq!(image.strategy, Some(Strategy::CatalogThenProbe));
        assert_eq!(image.fallback.as_deref(), Some("imagen-3.0-generate-001"));
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = parse_config("");

        assert_eq!(config.cache_ttl(), DEFAULT_CACHE_TTL);
        assert_eq!(config.min_generation_interval(), DEFAULT_GENERATION_INTERVAL);
        assert!(config.capabilities.image.strategy.is_none());
    }

    #[test]
    fn unknown_keys_are_reported() {
        let raw = r#"
cache_ttl = 5

[vertex]
project_id = "p"
zone = "a"
"#;

        let config: Config = parse_config_or_die(raw);

        let mut extra = extra_fields(&config, raw);
        extra.sort();

        assert_eq!(extra, vec!["cache_ttl", "vertex.zone"]);

        assert!(extra_fields(&parse_config_or_die(SAMPLE), SAMPLE).is_empty());
    }

    #[test]
    fn environment_overrides_the_file() {
        let mut config = parse_config(SAMPLE);

        let env: HashMap<&str, &str> = HashMap::from([
            (PROJECT_ID_VAR, "from-env"),
            (REGION_VAR, "europe-west4"),
            (ACCESS_TOKEN_VAR, ""),
            (CACHE_TTL_VAR, "90"),
        ]);

        config.apply_env(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.vertex.project_id.as_deref(), Some("from-env"));
        assert_eq!(config.region(), "europe-west4");
        assert!(config.vertex.access_token.is_none());
        assert_eq!(config.cache_ttl(), Duration::from_secs(90));
    }

    #[test]
    fn malformed_ttl_is_ignored() {
        let mut config = Config::default();

        config.apply_env(|name| (name == CACHE_TTL_VAR).then(|| "soon".to_string()));

        assert_eq!(config.cache_ttl(), DEFAULT_CACHE_TTL);
    }
}
