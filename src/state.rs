//! Application state: config, catalog, shared HTTP client and the session store.
//!
//! This module owns:
//!   - the loaded config (prompts + provider endpoints)
//!   - the subject/topic catalog (built-in + config topics)
//!   - one reqwest client shared by every provider call
//!   - wizard sessions keyed by session id, with idle eviction
//!
//! Session locks are short: callers copy what they need out, release, call the provider,
//! then re-lock to apply the result.

use std::{collections::HashMap, sync::Arc, time::{Duration, Instant}};
use tokio::sync::RwLock;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::config::{load_config, AppConfig};
use crate::error::WizardError;
use crate::providers::build_http_client;
use crate::wizard::{WizardSnapshot, WizardState};

/// A stored wizard plus bookkeeping for eviction.
pub struct SessionEntry {
    pub wizard: WizardState,
    last_touched: Instant,
    /// Owned by a live WebSocket; removed on disconnect, never by the idle sweep.
    pinned: bool,
}

impl SessionEntry {
    fn new(pinned: bool) -> Self {
        Self { wizard: WizardState::new(), last_touched: Instant::now(), pinned }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub catalog: Arc<Catalog>,
    pub http: reqwest::Client,
    pub sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
}

impl AppState {
    /// Build state from env: load config, build the catalog and the HTTP client.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        Self::from_config(load_config())
    }

    pub fn from_config(config: AppConfig) -> Self {
        let catalog = Catalog::with_extra_topics(&config.topics);
        let http = build_http_client(config.request_timeout_secs);

        let topic_count: usize = catalog.subjects().iter().map(|s| catalog.topics_for(&s.id).len()).sum();
        info!(
            target: "learniverse",
            subjects = catalog.subjects().len(),
            topics = topic_count,
            gemini_base = %config.providers.gemini.base_url,
            gemini_model = %config.providers.gemini.model,
            openai_base = %config.providers.openai.base_url,
            openai_model = %config.providers.openai.model,
            timeout_secs = config.request_timeout_secs,
            session_ttl_secs = config.session_idle_ttl_secs,
            "Startup configuration"
        );

        Self {
            config: Arc::new(config),
            catalog: Arc::new(catalog),
            http,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.config.session_idle_ttl_secs)
    }

    /// Creates an empty wizard session subject to idle eviction and returns its id.
    /// Sweeps idle sessions first so abandoned ones do not pile up.
    #[instrument(level = "debug", skip(self))]
    pub async fn create_session(&self) -> String {
        self.evict_idle_at(Instant::now()).await;
        self.insert_session(false).await
    }

    /// Creates a session owned by a WebSocket connection; the socket removes it on close.
    #[instrument(level = "debug", skip(self))]
    pub async fn create_socket_session(&self) -> String {
        self.insert_session(true).await
    }

    async fn insert_session(&self, pinned: bool) -> String {
        let id = Uuid::new_v4().to_string();
        self.sessions.write().await.insert(id.clone(), SessionEntry::new(pinned));
        info!(target: "wizard", session = %id, pinned, "Session created");
        id
    }

    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn remove_session(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            info!(target: "wizard", session = %id, "Session removed");
        }
        removed
    }

    /// Drops unpinned sessions last touched more than the configured TTL before `now`.
    pub async fn evict_idle_at(&self, now: Instant) -> usize {
        let ttl = self.idle_ttl();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, e| e.pinned || now.saturating_duration_since(e.last_touched) <= ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(target: "wizard", evicted, remaining = sessions.len(), "Idle sessions evicted");
        }
        evicted
    }

    /// Background sweep so idle sessions go away even when nobody creates new ones.
    pub fn spawn_idle_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let state = self.clone();
        let period = (self.idle_ttl() / 2).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            loop {
                tick.tick().await;
                state.evict_idle_at(Instant::now()).await;
            }
        })
    }

    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn snapshot(&self, id: &str) -> Result<WizardSnapshot, WizardError> {
        self.with_session(id, |w| Ok(w.snapshot())).await
    }

    /// Runs `f` against the session under the write lock and marks it as touched.
    pub async fn with_session<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut WizardState) -> Result<T, WizardError>,
    ) -> Result<T, WizardError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(id)
            .ok_or_else(|| WizardError::UnknownSession(id.to_string()))?;
        entry.last_touched = Instant::now();
        f(&mut entry.wizard)
    }
}
