//! Worker lifecycle
//!
//! `LifecycleController` owns the stores for one version tag and moves
//! through a monotonic state machine:
//!
//! ```text
//! parsed -> installing -> installed -> activating -> active
//!               |
//!               +-> redundant   (install failed)
//! ```
//!
//! Install pre-populates the static store all-or-nothing and prefetches
//! model files best-effort. Activation purges stores outside the valid-store
//! allow-list. Fetch classifies a request, runs its policy and falls back to
//! a synthesized response when both network and cache fail.

pub mod record;

pub use record::WorkerRecord;

use crate::clock::{Clock, SystemClock};
use crate::config::schema::{Config, StorageBackend};
use crate::error::{CacheError, CacheResult};
use crate::eviction::EvictionManager;
use crate::fallback::FallbackProvider;
use crate::journal::{events, Journal};
use crate::message::{Command, Reply};
use crate::network::Fetcher;
use crate::request::{Request, Response};
use crate::routes::{RouteClassifier, RoutePolicy};
use crate::store::{open_storage, stores_root, CacheStorage};
use crate::strategy::CachePolicyExecutor;
use chrono::{DateTime, Utc};
use futures_util::future::{join_all, try_join_all};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Worker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Active,
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Active => "active",
            Self::Redundant => "redundant",
        };
        write!(f, "{}", name)
    }
}

/// What install pre-populates
#[derive(Debug, Clone, Default)]
pub struct InstallPlan {
    /// Base URL relative entries resolve against
    pub origin: String,
    /// Required URLs (all-or-nothing)
    pub manifest: Vec<String>,
    /// Model URLs (best-effort)
    pub models: Vec<String>,
}

impl InstallPlan {
    pub fn from_config(config: &Config) -> Self {
        Self {
            origin: config.cache.origin.clone(),
            manifest: config.install.manifest.clone(),
            models: config.install.models.clone(),
        }
    }
}

/// Outcome of a model prefetch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrefetchReport {
    pub cached: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Outcome of a successful install
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub version: String,
    pub static_store: String,
    pub cached: usize,
    pub models: PrefetchReport,
}

/// Outcome of an activation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    pub version: String,
    pub purged: Vec<String>,
}

/// Result of a fetch event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The controller answered the request
    Respond(Response),
    /// Not intercepted; the host should go to the network itself
    PassThrough,
}

/// Orchestrates install, activation and request handling for one version
pub struct LifecycleController {
    classifier: RouteClassifier,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn Clock>,
    executor: CachePolicyExecutor,
    eviction: EvictionManager,
    fallback: FallbackProvider,
    plan: InstallPlan,
    journal: Journal,
    record_path: Option<PathBuf>,
    state: Mutex<WorkerState>,
    installed_at: Mutex<Option<DateTime<Utc>>>,
    skip_waiting: AtomicBool,
    clients_claimed: AtomicBool,
}

impl LifecycleController {
    /// Create a controller over existing storage
    pub fn new(
        version: &str,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        clock: Arc<dyn Clock>,
        plan: InstallPlan,
    ) -> CacheResult<Self> {
        let classifier = RouteClassifier::new(version)?;
        let executor = CachePolicyExecutor::new(storage.clone(), fetcher.clone(), clock.clone());
        let fallback = FallbackProvider::new(storage.clone(), classifier.static_store());

        Ok(Self {
            eviction: EvictionManager::new(storage.clone()),
            classifier,
            storage,
            fetcher,
            clock,
            executor,
            fallback,
            plan,
            journal: Journal::disabled(),
            record_path: None,
            state: Mutex::new(WorkerState::Parsed),
            installed_at: Mutex::new(None),
            skip_waiting: AtomicBool::new(false),
            clients_claimed: AtomicBool::new(false),
        })
    }

    /// Build a controller from configuration
    ///
    /// The worker record is only kept for the disk backend; memory stores
    /// do not outlive the process.
    pub async fn from_config(config: &Config, fetcher: Arc<dyn Fetcher>) -> CacheResult<Self> {
        let storage = open_storage(&config.cache).await?;
        let controller = Self::new(
            &config.cache.version,
            storage,
            fetcher,
            Arc::new(SystemClock),
            InstallPlan::from_config(config),
        )?
        .with_journal(Journal::new(config));

        Ok(match config.cache.backend {
            StorageBackend::Disk => controller
                .with_record_path(stores_root(&config.cache).join(record::RECORD_FILE)),
            StorageBackend::Memory => controller,
        })
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    pub fn with_record_path(mut self, path: PathBuf) -> Self {
        self.record_path = Some(path);
        self
    }

    pub fn classifier(&self) -> &RouteClassifier {
        &self.classifier
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    pub fn version(&self) -> &str {
        self.classifier.version()
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.lock().await
    }

    /// Whether install asked to supersede the active version immediately
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Whether activation took control of open consumers
    pub fn clients_claimed(&self) -> bool {
        self.clients_claimed.load(Ordering::SeqCst)
    }

    /// Load the persisted record and adopt its state when it belongs to
    /// this version
    pub async fn resume(&self) -> CacheResult<Option<WorkerRecord>> {
        let Some(record) = self.load_record().await? else {
            return Ok(None);
        };

        if record.version == self.version()
            && matches!(record.state, WorkerState::Installed | WorkerState::Active)
        {
            *self.state.lock().await = record.state;
            *self.installed_at.lock().await = Some(record.installed_at);
            if record.state == WorkerState::Active {
                self.clients_claimed.store(true, Ordering::SeqCst);
            }
            debug!("Resumed {} worker {}", record.state, record.version);
        }

        Ok(Some(record))
    }

    /// Persisted record, if any
    pub async fn load_record(&self) -> CacheResult<Option<WorkerRecord>> {
        match &self.record_path {
            Some(path) => WorkerRecord::load(path).await,
            None => Ok(None),
        }
    }

    async fn transition(
        &self,
        action: &str,
        from: &[WorkerState],
        to: WorkerState,
    ) -> CacheResult<()> {
        let mut state = self.state.lock().await;
        if !from.contains(&*state) {
            return Err(CacheError::InvalidTransition {
                action: action.to_string(),
                state: state.to_string(),
            });
        }
        debug!("Worker {} -> {}", *state, to);
        *state = to;
        Ok(())
    }

    async fn set_state(&self, to: WorkerState) {
        *self.state.lock().await = to;
    }

    /// Install this version
    ///
    /// Every manifest URL is fetched before anything is written, so a
    /// failed install leaves the static store and the worker record
    /// untouched. Model prefetch runs alongside and keeps what it fetched
    /// whatever the static outcome.
    pub async fn on_install(&self) -> CacheResult<InstallReport> {
        self.transition("install", &[WorkerState::Parsed], WorkerState::Installing)
            .await?;
        info!("Installing worker {}", self.version());

        let (populated, models) = tokio::join!(
            self.populate_static(),
            self.prefetch_models(&self.plan.models)
        );

        match populated {
            Ok(cached) => {
                let now = self.clock.now();
                *self.installed_at.lock().await = Some(now);
                self.set_state(WorkerState::Installed).await;

                if let Some(path) = &self.record_path {
                    WorkerRecord::installed(self.version(), now).save(path).await?;
                }

                self.skip_waiting.store(true, Ordering::SeqCst);

                let report = InstallReport {
                    version: self.version().to_string(),
                    static_store: self.classifier.static_store(),
                    cached,
                    models,
                };
                self.journal
                    .record(
                        events::INSTALLED,
                        &serde_json::json!({
                            "version": report.version,
                            "cached": report.cached,
                            "models_cached": report.models.cached.len(),
                            "models_failed": report.models.failed.len(),
                        }),
                    )
                    .await;
                info!(
                    "Installed worker {} ({} assets cached)",
                    self.version(),
                    cached
                );
                Ok(report)
            }
            Err(e) => {
                self.set_state(WorkerState::Redundant).await;
                self.journal
                    .record(
                        events::INSTALL_FAILED,
                        &serde_json::json!({
                            "version": self.version(),
                            "error": e.to_string(),
                            "models_cached": models.cached.len(),
                        }),
                    )
                    .await;
                warn!("Install of worker {} failed: {}", self.version(), e);
                Err(e)
            }
        }
    }

    /// Fetch every manifest entry, then write them all
    async fn populate_static(&self) -> CacheResult<usize> {
        let requests = self
            .plan
            .manifest
            .iter()
            .map(|entry| Request::resolve(&self.plan.origin, entry))
            .collect::<CacheResult<Vec<_>>>()?;

        let responses = try_join_all(requests.iter().map(|request| self.fetch_required(request)))
            .await?;

        let store = self.storage.open(&self.classifier.static_store()).await?;
        let now = self.clock.now();
        for (request, response) in requests.iter().zip(&responses) {
            store.put(request.key(), response, now).await?;
        }

        Ok(responses.len())
    }

    async fn fetch_required(&self, request: &Request) -> CacheResult<Response> {
        let response = self
            .fetcher
            .fetch(request)
            .await
            .map_err(|e| CacheError::InstallFailed {
                url: request.key().to_string(),
                reason: e.to_string(),
            })?;

        if !response.is_ok() {
            return Err(CacheError::InstallFailed {
                url: request.key().to_string(),
                reason: format!("status {}", response.status),
            });
        }
        Ok(response)
    }

    /// Fetch model URLs into the model store
    ///
    /// Each URL succeeds or fails on its own; failures are logged and
    /// reported, never propagated.
    pub async fn prefetch_models(&self, urls: &[String]) -> PrefetchReport {
        let mut report = PrefetchReport::default();
        if urls.is_empty() {
            return report;
        }

        let store_name = self.classifier.model_store();
        let store = match self.storage.open(&store_name).await {
            Ok(store) => store,
            Err(e) => {
                warn!("Cannot open model store {}: {}", store_name, e);
                report.failed = urls.iter().map(|u| (u.clone(), e.to_string())).collect();
                return report;
            }
        };

        let outcomes = join_all(urls.iter().map(|url| {
            let store = store.clone();
            async move {
                let request = Request::resolve(&self.plan.origin, url)?;
                let response = self.fetcher.fetch(&request).await?;
                if !response.is_ok() {
                    return Err(CacheError::network(
                        request.key(),
                        format!("status {}", response.status),
                    ));
                }
                store.put(request.key(), &response, self.clock.now()).await
            }
        }))
        .await;

        for (url, outcome) in urls.iter().zip(outcomes) {
            match outcome {
                Ok(()) => report.cached.push(url.clone()),
                Err(e) => {
                    warn!("Model prefetch failed for {}: {}", url, e);
                    report.failed.push((url.clone(), e.to_string()));
                }
            }
        }

        if let Some(policy) = self.policy_for_store(&store_name) {
            self.eviction.enforce(&store_name, policy.max_entries).await;
        }

        self.journal
            .record(
                events::MODELS_PREFETCHED,
                &serde_json::json!({
                    "store": store_name,
                    "cached": report.cached,
                    "failed": report.failed.iter().map(|(u, _)| u).collect::<Vec<_>>(),
                }),
            )
            .await;
        report
    }

    fn policy_for_store(&self, store: &str) -> Option<&RoutePolicy> {
        self.classifier
            .routes()
            .iter()
            .map(|route| route.policy())
            .find(|policy| policy.store == store)
    }

    /// Activate this version
    ///
    /// Deletes every store not in the valid-store allow-list, then claims
    /// open consumers.
    pub async fn on_activate(&self) -> CacheResult<ActivationReport> {
        self.transition(
            "activate",
            &[WorkerState::Installed, WorkerState::Activating],
            WorkerState::Activating,
        )
        .await?;
        info!("Activating worker {}", self.version());

        let valid = self.classifier.valid_stores();
        let mut purged = vec![];
        for name in self.storage.names().await? {
            if valid.contains(&name) {
                continue;
            }
            self.storage.delete(&name).await?;
            info!("Purged stale store {}", name);
            self.journal
                .record(events::STORE_PURGED, &serde_json::json!({ "store": name }))
                .await;
            purged.push(name);
        }

        self.clients_claimed.store(true, Ordering::SeqCst);

        let now = self.clock.now();
        if let Some(path) = &self.record_path {
            let installed_at = (*self.installed_at.lock().await).unwrap_or(now);
            let mut record = match WorkerRecord::load(path).await? {
                Some(record) if record.version == self.version() => record,
                _ => WorkerRecord::installed(self.version(), installed_at),
            };
            record.activate(now);
            record.save(path).await?;
        }

        self.set_state(WorkerState::Active).await;
        self.journal
            .record(
                events::ACTIVATED,
                &serde_json::json!({ "version": self.version(), "purged": purged }),
            )
            .await;
        info!("Worker {} active", self.version());

        Ok(ActivationReport {
            version: self.version().to_string(),
            purged,
        })
    }

    /// Whether a request is handled by the cache layer
    pub fn intercepts(&self, request: &Request) -> bool {
        request.is_http() && request.method().is_cacheable()
    }

    /// Handle a fetch event
    ///
    /// Only GET requests over http(s) are intercepted. Intercepted requests
    /// always get a response unless both network and cache failed for a
    /// destination without a fallback.
    pub async fn on_fetch(&self, request: &Request) -> CacheResult<FetchOutcome> {
        if !self.intercepts(request) {
            debug!("Passing through {} {}", request.method(), request.key());
            return Ok(FetchOutcome::PassThrough);
        }

        let policy = self.classifier.classify(request).unwrap_or(self.classifier.default_policy());

        match self.executor.execute(request, policy).await {
            Ok(response) => Ok(FetchOutcome::Respond(response)),
            Err(e) => {
                debug!("{} failed for {}: {}", policy.strategy, request.key(), e);
                self.fallback.provide(request).await.map(FetchOutcome::Respond)
            }
        }
    }

    /// Handle a fetch event, sending pass-through requests to the network
    pub async fn fetch(&self, request: &Request) -> CacheResult<Response> {
        match self.on_fetch(request).await? {
            FetchOutcome::Respond(response) => Ok(response),
            FetchOutcome::PassThrough => self.fetcher.fetch(request).await,
        }
    }

    /// Handle a protocol command
    pub async fn handle_message(&self, command: Command) -> Reply {
        debug!("Handling message {:?}", command);
        match command {
            Command::SkipWaiting => {
                self.skip_waiting.store(true, Ordering::SeqCst);
                if self.state().await != WorkerState::Installed {
                    return Reply::ok();
                }
                match self.on_activate().await {
                    Ok(_) => Reply::ok(),
                    Err(e) => Reply::error(e.to_string()),
                }
            }
            Command::GetCacheSize => match self.storage.estimate().await {
                Ok(estimate) => Reply::Usage(estimate),
                Err(e) => {
                    warn!("Storage estimate failed: {}", e);
                    Reply::Usage(None)
                }
            },
            Command::ClearCache { cache_name } => match self.storage.delete(&cache_name).await {
                Ok(existed) => {
                    info!("Cleared store {}", cache_name);
                    self.journal
                        .record(
                            events::STORE_CLEARED,
                            &serde_json::json!({ "store": cache_name, "existed": existed }),
                        )
                        .await;
                    Reply::ok()
                }
                Err(e) => Reply::error(e.to_string()),
            },
            Command::PreloadModels { urls } => {
                let report = self.prefetch_models(&urls).await;
                if report.failed.is_empty() {
                    Reply::ok()
                } else {
                    let failures = report
                        .failed
                        .iter()
                        .map(|(url, reason)| format!("{}: {}", url, reason))
                        .collect::<Vec<_>>()
                        .join("; ");
                    Reply::error(format!(
                        "Failed to prefetch {} of {} models: {}",
                        report.failed.len(),
                        urls.len(),
                        failures
                    ))
                }
            }
        }
    }
}
