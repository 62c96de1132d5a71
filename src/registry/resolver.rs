use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use strum::IntoEnumIterator;
use tokio::sync::Mutex;

use super::default_priority::{default_fallback, default_priority, default_probe_candidates};
use super::priority::PriorityTable;
use super::probe::{list_candidates, probe_candidates};
use crate::capability::CapabilityClass;
use crate::clock::{Clock, SystemClock};
use crate::providers::ModelBackend;

pub(crate) const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// How candidates are discovered for a capability.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub(crate) enum Strategy {
    /// List the catalog and rank what is deployed
    #[default]
    Catalog,
    /// Call each probe candidate in order until one answers
    Probe,
    /// Rank the catalog; probe only when nothing in it ranks
    CatalogThenProbe,
}

/// Everything the resolver needs to know about one capability class.
#[derive(Debug, Clone)]
pub(crate) struct CapabilityPolicy {
    pub table: PriorityTable,
    pub strategy: Strategy,
    /// Most preferred first
    pub probe_candidates: Vec<String>,
    pub fallback: String,
}

impl CapabilityPolicy {
    pub(crate) fn default_for(capability: CapabilityClass) -> CapabilityPolicy {
        CapabilityPolicy {
            table: default_priority(capability),
            strategy: match capability {
                CapabilityClass::Text => Strategy::Catalog,
                CapabilityClass::Image => Strategy::Probe,
            },
            probe_candidates: default_probe_candidates(capability),
            fallback: default_fallback(capability).to_string(),
        }
    }
}

/// Where a selection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub(crate) enum SelectionSource {
    Catalog,
    Probe,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolvedSelection {
    pub capability: CapabilityClass,
    pub identifier: String,
    pub resolved_at: Instant,
    pub source: SelectionSource,
}

/// One value per capability class.
#[derive(Debug, Default)]
struct PerCapability<T> {
    text: T,
    image: T,
}

impl<T> PerCapability<T> {
    fn get(&self, capability: CapabilityClass) -> &T {
        match capability {
            CapabilityClass::Text => &self.text,
            CapabilityClass::Image => &self.image,
        }
    }

    fn get_mut(&mut self, capability: CapabilityClass) -> &mut T {
        match capability {
            CapabilityClass::Text => &mut self.text,
            CapabilityClass::Image => &mut self.image,
        }
    }
}

#[derive(Debug, Default)]
struct CacheSlot {
    selection: Option<ResolvedSelection>,
    /// Bumped on every completed refresh
    generation: u64,
}

/// Picks the best available model for each capability class and caches the choice.
///
/// A cached selection is served until it is older than the TTL. Refreshes are
/// single-flight per capability: callers that miss the cache while a refresh is
/// running wait for it and share its result. Resolution never fails; when nothing
/// better can be confirmed, the policy's fallback identifier is selected.
pub(crate) struct Resolver {
    backend: Arc<dyn ModelBackend>,
    policies: PerCapability<CapabilityPolicy>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    cache: RwLock<PerCapability<CacheSlot>>,
    refresh: PerCapability<Mutex<()>>,
}

impl Resolver {
    pub(crate) fn new(backend: Arc<dyn ModelBackend>) -> Resolver {
        Resolver {
            backend,
            policies: PerCapability {
                text: CapabilityPolicy::default_for(CapabilityClass::Text),
                image: CapabilityPolicy::default_for(CapabilityClass::Image),
            },
            ttl: DEFAULT_CACHE_TTL,
            clock: Arc::new(SystemClock),
            cache: RwLock::new(PerCapability::default()),
            refresh: PerCapability::default(),
        }
    }

    pub(crate) fn with_ttl(mut self, ttl: Duration) -> Resolver {
        self.ttl = ttl;
        self
    }

    pub(crate) fn with_clock(mut self, clock: Arc<dyn Clock>) -> Resolver {
        self.clock = clock;
        self
    }

    pub(crate) fn with_policy(
        mut self,
        capability: CapabilityClass,
        policy: CapabilityPolicy,
    ) -> Resolver {
        *self.policies.get_mut(capability) = policy;
        self
    }

    pub(crate) fn policy(&self, capability: CapabilityClass) -> &CapabilityPolicy {
        self.policies.get(capability)
    }

    pub(crate) fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached selection, fresh or not. Never probes.
    pub(crate) fn cached(&self, capability: CapabilityClass) -> Option<ResolvedSelection> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);

        cache.get(capability).selection.clone()
    }

    fn fresh(&self, capability: CapabilityClass) -> Option<ResolvedSelection> {
        let selection = self.cached(capability)?;

        let age = self.clock.now().saturating_duration_since(selection.resolved_at);

        if age < self.ttl {
            Some(selection)
        } else {
            None
        }
    }

    fn generation(&self, capability: CapabilityClass) -> u64 {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);

        cache.get(capability).generation
    }

    /// Resolves the best identifier for `capability`.
    pub(crate) async fn resolve(&self, capability: CapabilityClass, force_refresh: bool) -> String {
        self.resolve_selection(capability, force_refresh)
            .await
            .identifier
    }

    pub(crate) async fn resolve_selection(
        &self,
        capability: CapabilityClass,
        force_refresh: bool,
    ) -> ResolvedSelection {
        if !force_refresh {
            if let Some(selection) = self.fresh(capability) {
                tracing::debug!(%capability, model = %selection.identifier, "using cached model");
                return selection;
            }
        }

        let seen_generation = self.generation(capability);

        let _refreshing = self.refresh.get(capability).lock().await;

        // Another caller finished a refresh while this one was waiting
        if self.generation(capability) != seen_generation {
            if let Some(selection) = self.cached(capability) {
                return selection;
            }
        }

        let (identifier, source) = self.select(capability).await;

        self.store(capability, identifier, source)
    }

    fn store(
        &self,
        capability: CapabilityClass,
        identifier: String,
        source: SelectionSource,
    ) -> ResolvedSelection {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);

        let slot = cache.get_mut(capability);

        let now = self.clock.now();

        let resolved_at = match &slot.selection {
            Some(previous) if previous.resolved_at > now => previous.resolved_at,
            _ => now,
        };

        let selection = ResolvedSelection {
            capability,
            identifier,
            resolved_at,
            source,
        };

        slot.selection = Some(selection.clone());
        slot.generation += 1;

        tracing::info!(
            %capability,
            model = %selection.identifier,
            source = %selection.source,
            "selected model"
        );

        selection
    }

    async fn select(&self, capability: CapabilityClass) -> (String, SelectionSource) {
        let policy = self.policy(capability);

        tracing::debug!(%capability, strategy = %policy.strategy, "probing for best available model");

        let selected = match policy.strategy {
            Strategy::Catalog => self.select_from_catalog(capability, policy).await,
            Strategy::Probe => self.select_by_probing(capability, policy).await,
            Strategy::CatalogThenProbe => {
                match self.select_from_catalog(capability, policy).await {
                    Some(selected) => Some(selected),
                    None => self.select_by_probing(capability, policy).await,
                }
            }
        };

        selected.unwrap_or_else(|| {
            tracing::warn!(%capability, model = %policy.fallback, "no preferred model confirmed, using fallback");

            (policy.fallback.clone(), SelectionSource::Fallback)
        })
    }

    async fn select_from_catalog(
        &self,
        capability: CapabilityClass,
        policy: &CapabilityPolicy,
    ) -> Option<(String, SelectionSource)> {
        let candidates = list_candidates(self.backend.as_ref()).await;

        if candidates.is_empty() {
            return None;
        }

        match policy.table.rank(&candidates) {
            Some(best) => Some((best.to_string(), SelectionSource::Catalog)),
            None => {
                tracing::warn!(
                    %capability,
                    listed = candidates.len(),
                    "no listed model matches the priority table"
                );
                None
            }
        }
    }

    async fn select_by_probing(
        &self,
        capability: CapabilityClass,
        policy: &CapabilityPolicy,
    ) -> Option<(String, SelectionSource)> {
        let outcome =
            probe_candidates(self.backend.as_ref(), capability, &policy.probe_candidates).await;

        let denied = outcome.results.iter().filter(|r| r.permission_denied).count();

        if outcome.selected.is_none() && denied > 0 {
            tracing::warn!(
                %capability,
                denied,
                "candidates exist but access was denied; enable the API or grant access to use them"
            );
        }

        outcome
            .selected
            .map(|selected| (selected, SelectionSource::Probe))
    }

    /// Clears the cached selection for one capability, or for all of them.
    pub(crate) fn invalidate(&self, capability: Option<CapabilityClass>) {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);

        let mut clear = |capability: CapabilityClass| {
            cache.get_mut(capability).selection = None;
        };

        match capability {
            Some(capability) => clear(capability),
            None => CapabilityClass::iter().for_each(clear),
        }

        tracing::debug!(capability = ?capability, "model cache cleared");
    }

    /// Whether `model` is the currently selected model of any capability.
    pub(crate) async fn is_model_available(&self, model: &str) -> bool {
        for capability in CapabilityClass::iter() {
            if self.resolve(capability, false).await == model {
                return true;
            }
        }

        false
    }
}
