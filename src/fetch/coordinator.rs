//! The fetch pipeline: plan → cache → throttle → endpoint → network → parse
//! → level of detail → cache.
//!
//! Every network call goes through one [`ThrottleController`] gate. Identical
//! requests (same layer, quantized bounds and bucket) that overlap in time
//! share a single in-flight future, so they never cost two network calls.

use crate::core::{config::PipelineConfig, geo::BoundingBox, zoom::ZoomBucket};
use crate::data::{
    feature::LayerKind, lod::apply_lod, overpass::parse_response, query::build_query,
};
use crate::fetch::{
    bbox_policy::{BoundingBoxPolicy, QueryPlan},
    cache::{FeatureList, GeoDataCache},
    endpoints::{EndpointRegistry, EndpointState},
    error::FetchError,
    throttle::{
        is_rate_limit_signal, SkipReason, ThrottleController, ThrottleDecision, ThrottlePhase,
        ThrottleState,
    },
    transport::{GeoDataTransport, HttpTransport, TransportResponse},
};
use crate::prelude::{Arc, HashMap, Mutex};
use crate::traits::{CacheStats, Cacheable};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::{MutexGuard, PoisonError};
use tokio::time::Instant;

/// Longest slice of an error body kept in an [`FetchError::UpstreamError`]
const ERROR_BODY_LIMIT: usize = 256;

/// Where the features of a [`FetchOutcome`] came from
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureSource {
    Network,
    Cache,
    /// Nothing is requested for this layer at this bucket
    NotRequested,
    /// The fetch failed and an expired cache entry stands in
    StaleCache,
    /// The throttle refused the request; features are the last cached value
    Skipped(SkipReason),
    /// The fetch failed with nothing cached to fall back on
    Failed(FetchError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub features: FeatureList,
    pub source: FeatureSource,
    /// Cache key the request resolved to (empty for invalid bounds)
    pub key: String,
}

impl FetchOutcome {
    pub fn is_fresh(&self) -> bool {
        matches!(self.source, FeatureSource::Network | FeatureSource::Cache)
    }
}

/// Counters for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchStats {
    pub requests: u64,
    pub cache_hits: u64,
    pub network_calls: u64,
    pub successes: u64,
    pub failures: u64,
    pub rate_limited: u64,
    pub skipped: u64,
    /// Requests that joined an identical in-flight request
    pub deduplicated: u64,
}

type SharedFetch = Shared<BoxFuture<'static, Result<FetchOutcome, FetchError>>>;

struct FetchState {
    throttle: ThrottleController,
    registry: EndpointRegistry,
    cache: GeoDataCache,
    stats: FetchStats,
}

struct Inner {
    config: PipelineConfig,
    policy: BoundingBoxPolicy,
    transport: Arc<dyn GeoDataTransport>,
    state: Mutex<FetchState>,
    in_flight: Mutex<HashMap<String, SharedFetch>>,
    /// Serializes throttle decisions so spacing holds across concurrent callers
    gate: tokio::sync::Mutex<()>,
}

/// Cheaply cloneable handle to the shared fetch pipeline
#[derive(Clone)]
pub struct FetchCoordinator {
    inner: Arc<Inner>,
}

impl FetchCoordinator {
    pub fn new(config: PipelineConfig, transport: Arc<dyn GeoDataTransport>) -> Self {
        let state = FetchState {
            throttle: ThrottleController::new(config.throttle.clone()),
            registry: EndpointRegistry::from_config(&config.endpoints),
            cache: GeoDataCache::from_config(&config.cache),
            stats: FetchStats::default(),
        };
        let inner = Inner {
            policy: BoundingBoxPolicy::from_config(&config.lod, &config.cache),
            config,
            transport,
            state: Mutex::new(state),
            in_flight: Mutex::new(HashMap::default()),
            gate: tokio::sync::Mutex::new(()),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Coordinator talking HTTP with a client built from the transport config
    pub fn with_http(config: PipelineConfig) -> crate::Result<Self> {
        let transport = HttpTransport::new(&config.transport)?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    pub fn policy(&self) -> &BoundingBoxPolicy {
        &self.inner.policy
    }

    /// Fetches one layer for `bbox` at `bucket`.
    ///
    /// A throttle skip is not an error: it yields the last cached value for
    /// the key, or an empty list.
    pub async fn fetch(
        &self,
        kind: LayerKind,
        bbox: &BoundingBox,
        bucket: ZoomBucket,
    ) -> Result<FeatureList, FetchError> {
        self.fetch_outcome(kind, bbox, bucket)
            .await
            .map(|outcome| outcome.features)
    }

    /// Like [`fetch`](Self::fetch) but never fails: transient failures fall
    /// back to the last cached value, everything else to an empty list.
    pub async fn fetch_or_fallback(
        &self,
        kind: LayerKind,
        bbox: &BoundingBox,
        bucket: ZoomBucket,
    ) -> FetchOutcome {
        match self.fetch_outcome(kind, bbox, bucket).await {
            Ok(outcome) => outcome,
            Err(err) => {
                let key = self
                    .inner
                    .policy
                    .plan(kind, bbox, bucket)
                    .map(|plan| plan.key)
                    .unwrap_or_default();
                let stale = match err {
                    FetchError::InvalidBounds { .. } | FetchError::ParseFailure(_) => None,
                    _ => self.inner.state().cache.get_stale(&key),
                };
                match stale {
                    Some(features) => FetchOutcome {
                        features,
                        source: FeatureSource::StaleCache,
                        key,
                    },
                    None => FetchOutcome {
                        features: FeatureList::default(),
                        source: FeatureSource::Failed(err),
                        key,
                    },
                }
            }
        }
    }

    /// Full outcome of one fetch, including where the features came from
    pub async fn fetch_outcome(
        &self,
        kind: LayerKind,
        bbox: &BoundingBox,
        bucket: ZoomBucket,
    ) -> Result<FetchOutcome, FetchError> {
        self.inner.state().stats.requests += 1;

        let plan = self.inner.policy.plan(kind, bbox, bucket).map_err(|err| {
            log::warn!("refusing {kind} fetch: {err}");
            err
        })?;

        {
            let mut state = self.inner.state();
            if let Some(features) = state.cache.get(&plan.key, Instant::now()) {
                state.stats.cache_hits += 1;
                log::debug!("cache hit for {}", plan.key);
                return Ok(FetchOutcome {
                    features,
                    source: FeatureSource::Cache,
                    key: plan.key,
                });
            }
        }

        let shared = {
            let mut in_flight = lock(&self.inner.in_flight);
            match in_flight.get(&plan.key) {
                Some(existing) => {
                    self.inner.state().stats.deduplicated += 1;
                    log::debug!("joining in-flight request for {}", plan.key);
                    existing.clone()
                }
                None => {
                    let inner = Arc::clone(&self.inner);
                    let key = plan.key.clone();
                    let fetch = async move {
                        let result = inner.fetch_network(kind, &plan).await;
                        lock(&inner.in_flight).remove(&plan.key);
                        result
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(key, fetch.clone());
                    fetch
                }
            }
        };

        shared.await
    }

    /// Last cached value for a request regardless of freshness
    pub fn cached(
        &self,
        kind: LayerKind,
        bbox: &BoundingBox,
        bucket: ZoomBucket,
    ) -> Option<FeatureList> {
        let plan = self.inner.policy.plan(kind, bbox, bucket).ok()?;
        self.inner.state().cache.get_stale(&plan.key)
    }

    pub fn stats(&self) -> FetchStats {
        self.inner.state().stats.clone()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.state().cache.cache_stats()
    }

    pub fn throttle_state(&self) -> ThrottleState {
        self.inner.state().throttle.state()
    }

    pub fn throttle_phase(&self) -> ThrottlePhase {
        self.inner.state().throttle.phase(Instant::now())
    }

    pub fn endpoint_states(&self) -> Vec<EndpointState> {
        self.inner.state().registry.states()
    }

    pub fn active_endpoint(&self) -> Option<String> {
        self.inner.state().registry.active_url().map(str::to_string)
    }

    pub fn clear_cache(&self) {
        self.inner.state().cache.clear_cache();
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, FetchState> {
        lock(&self.state)
    }

    async fn fetch_network(
        &self,
        kind: LayerKind,
        plan: &QueryPlan,
    ) -> Result<FetchOutcome, FetchError> {
        let Some(query) = build_query(
            kind,
            &plan.bbox,
            plan.bucket,
            &self.config.lod,
            self.config.transport.query_timeout_secs,
        ) else {
            return Ok(FetchOutcome {
                features: FeatureList::default(),
                source: FeatureSource::NotRequested,
                key: plan.key.clone(),
            });
        };

        if let Err(reason) = self.acquire_slot().await {
            let mut state = self.state();
            state.stats.skipped += 1;
            log::debug!("skipping {} ({reason:?})", plan.key);
            let features = state.cache.get_stale(&plan.key).unwrap_or_default();
            return Ok(FetchOutcome {
                features,
                source: FeatureSource::Skipped(reason),
                key: plan.key.clone(),
            });
        }

        let endpoint = {
            let mut state = self.state();
            state.stats.network_calls += 1;
            state.registry.select(Instant::now())
        }
        .ok_or_else(|| FetchError::NetworkFailure {
            endpoint: String::new(),
            message: "no endpoints configured".to_string(),
        })?;

        log::debug!("fetching {} from {}", plan.key, endpoint.url);
        let result = match self.transport.post_query(&endpoint.url, &query).await {
            Ok(response) => classify_response(response, kind, &endpoint.url),
            Err(err) => Err(err),
        };

        let now = Instant::now();
        let mut state = self.state();
        match result {
            Ok(features) => {
                let parsed = features.len();
                let features = Arc::new(apply_lod(kind, features, plan.bucket, &self.config.lod));
                let evicted = state.cache.insert(plan.key.clone(), features.clone(), now);
                state.throttle.record_success(now);
                state.registry.record_success(&endpoint.url, now);
                state.stats.successes += 1;
                log::info!(
                    "{}: {} features ({parsed} parsed) from {}{}",
                    plan.key,
                    features.len(),
                    endpoint.url,
                    if evicted > 0 {
                        format!(", evicted {evicted} cache entries")
                    } else {
                        String::new()
                    }
                );
                Ok(FetchOutcome {
                    features,
                    source: FeatureSource::Network,
                    key: plan.key.clone(),
                })
            }
            Err(err) => {
                state.stats.failures += 1;
                state.record_error(&err, &endpoint.url, now);
                Err(err)
            }
        }
    }

    /// Waits for the throttle to allow a request and marks its start
    async fn acquire_slot(&self) -> Result<(), SkipReason> {
        let _gate = self.gate.lock().await;
        loop {
            let decision = self.state().throttle.check(Instant::now());
            match decision {
                ThrottleDecision::Proceed => {
                    self.state().throttle.begin_request(Instant::now());
                    return Ok(());
                }
                ThrottleDecision::Wait(delay) => {
                    log::trace!("throttled for {delay:?}");
                    tokio::time::sleep(delay).await;
                }
                ThrottleDecision::Skip(reason) => return Err(reason),
            }
        }
    }
}

impl FetchState {
    fn record_error(&mut self, err: &FetchError, url: &str, now: Instant) {
        match err {
            FetchError::RateLimited { .. } => {
                self.stats.rate_limited += 1;
                self.throttle.record_rate_limit(now);
            }
            err if err.counts_as_endpoint_failure() => {
                log::warn!("{err}");
                let outcome = self.throttle.record_failure(now);
                self.registry.record_failure(url, now);
                if outcome.rotate_endpoint {
                    self.registry.rotate_from(url, now);
                }
            }
            err => log::warn!("{err}"),
        }
    }
}

/// Maps status and body to features or a typed failure
fn classify_response(
    response: TransportResponse,
    kind: LayerKind,
    endpoint: &str,
) -> Result<Vec<crate::data::feature::GeoFeature>, FetchError> {
    if response.status == 429
        || (!response.is_success() && is_rate_limit_signal(Some(response.status), &response.body))
    {
        return Err(FetchError::RateLimited {
            endpoint: endpoint.to_string(),
        });
    }
    if !response.is_success() {
        let mut message = response.body.trim().to_string();
        if message.len() > ERROR_BODY_LIMIT {
            let mut cut = ERROR_BODY_LIMIT;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
        }
        return Err(FetchError::UpstreamError {
            endpoint: endpoint.to_string(),
            status: response.status,
            message,
        });
    }
    parse_response(&response.body, kind, endpoint)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
