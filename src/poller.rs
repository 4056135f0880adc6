//! Fixed-interval polling of the scanner's JSON documents.
//!
//! The poller owns the only mutable state in the crate: the latest
//! `SpreadSnapshot`. Every issued fetch carries a monotonically increasing
//! generation, and a response is applied only while its generation is newer
//! than the last applied one, so a slow response can never overwrite a newer
//! snapshot after an out-of-band refresh overlaps the timer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::spreads::{ScannerStatus, SpreadDocument};

/// Single failure taxonomy for a poll: transport, bad status, and malformed
/// body all degrade the dashboard the same way.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected http status: {0}")]
    Status(u16),
    #[error("malformed document: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    pub spreads_url: String,
    pub status_url: Option<String>,
    pub refresh_interval_ms: u64,
    pub timeout_ms: u64,
    /// Append `?t=<unix-millis>` so intermediaries never serve a cached copy.
    pub cache_bust: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            spreads_url: "http://127.0.0.1:8000/data/spreads.json".to_string(),
            status_url: None,
            refresh_interval_ms: 10_000,
            timeout_ms: 5_000,
            cache_bust: true,
        }
    }
}

/// Observable poller state. `fetched_at` moves only on success; `last_error`
/// is set on failure and cleared by the next good poll.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpreadSnapshot {
    pub document: SpreadDocument,
    pub fetched_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub scanner: Option<ScannerStatus>,
}

pub trait SpreadSource: Send + Sync + 'static {
    fn snapshot(&self) -> SpreadSnapshot;

    /// Hint that a fresh document is wanted ahead of the next timer tick,
    /// e.g. when a viewer opens the page or switches tabs. Best effort.
    fn request_refresh(&self) {}
}

#[derive(Clone)]
pub struct InMemorySpreadSource {
    inner: Arc<RwLock<SpreadSnapshot>>,
}

impl InMemorySpreadSource {
    pub fn new(snapshot: SpreadSnapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(snapshot)),
        }
    }

    pub fn replace_snapshot(&self, snapshot: SpreadSnapshot) {
        let mut guard = self
            .inner
            .write()
            .expect("in-memory snapshot lock should not be poisoned");
        *guard = snapshot;
    }
}

impl SpreadSource for InMemorySpreadSource {
    fn snapshot(&self) -> SpreadSnapshot {
        self.inner
            .read()
            .expect("in-memory snapshot lock should not be poisoned")
            .clone()
    }
}

#[derive(Default)]
struct StateInner {
    snapshot: SpreadSnapshot,
    applied_generation: u64,
}

/// Snapshot cell shared between the poll task and HTTP handlers.
#[derive(Default)]
pub struct SharedSpreadState {
    issued: AtomicU64,
    inner: RwLock<StateInner>,
}

impl SharedSpreadState {
    /// Reserve the generation for a fetch about to be issued.
    pub fn begin_poll(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Apply a completed fetch. Returns false when the outcome belonged to a
    /// superseded generation and was dropped.
    pub fn apply(&self, generation: u64, outcome: Result<SpreadDocument, FetchError>) -> bool {
        let mut guard = self
            .inner
            .write()
            .expect("spread state lock should not be poisoned");
        if generation <= guard.applied_generation {
            return false;
        }
        guard.applied_generation = generation;

        match outcome {
            Ok(document) => {
                guard.snapshot.document = document;
                guard.snapshot.fetched_at = Some(Utc::now());
                guard.snapshot.last_error = None;
            }
            Err(err) => {
                guard.snapshot.last_error = Some(err.to_string());
            }
        }
        true
    }

    /// Scanner status is cosmetic: applied unconditionally, last known value
    /// survives a failed status fetch.
    pub fn set_scanner(&self, status: ScannerStatus) {
        let mut guard = self
            .inner
            .write()
            .expect("spread state lock should not be poisoned");
        guard.snapshot.scanner = Some(status);
    }

    pub fn snapshot(&self) -> SpreadSnapshot {
        self.inner
            .read()
            .expect("spread state lock should not be poisoned")
            .snapshot
            .clone()
    }
}

/// One poll against an injected fetcher. The live task goes through the same
/// generation bookkeeping; tests inject failures without a network.
pub fn poll_once_with<F>(state: &SharedSpreadState, fetch: F) -> bool
where
    F: FnOnce() -> Result<SpreadDocument, FetchError>,
{
    let generation = state.begin_poll();
    let outcome = fetch();
    apply_poll_outcome(state, generation, outcome)
}

/// Apply a completed fetch with structured logging. Used by both the live
/// poll task and the injected-fetcher path.
pub fn apply_poll_outcome(
    state: &SharedSpreadState,
    generation: u64,
    outcome: Result<SpreadDocument, FetchError>,
) -> bool {
    match &outcome {
        Ok(document) => info!(
            component = "poller",
            event = "poll.success",
            generation,
            categories = document.categories.len(),
            records = document.total_records()
        ),
        Err(err) => warn!(
            component = "poller",
            event = "poll.degraded",
            generation,
            error = %err
        ),
    }

    let applied = state.apply(generation, outcome);
    if !applied {
        info!(
            component = "poller",
            event = "poll.stale_dropped",
            generation
        );
    }
    applied
}

/// Live source: spawns a tokio task that polls immediately at startup and
/// then at the configured interval forever. The interval is the only retry
/// mechanism; there is no backoff and no circuit breaker.
pub struct PollingSpreadSource {
    state: Arc<SharedSpreadState>,
    refresh_tx: tokio::sync::mpsc::UnboundedSender<()>,
}

impl PollingSpreadSource {
    pub fn spawn(cfg: PollerConfig) -> Self {
        let state = Arc::new(SharedSpreadState::default());
        let (refresh_tx, mut refresh_rx) = tokio::sync::mpsc::unbounded_channel();

        let task_state = Arc::clone(&state);
        tokio::spawn(async move {
            let client = reqwest::Client::builder()
                .timeout(Duration::from_millis(cfg.timeout_ms))
                .build()
                .expect("reqwest client should build");

            let mut ticker =
                tokio::time::interval(Duration::from_millis(cfg.refresh_interval_ms.max(1)));
            loop {
                tokio::select! {
                    _ = ticker.tick() => poll_cycle(&client, &cfg, &task_state).await,
                    refresh = refresh_rx.recv() => match refresh {
                        Some(()) => poll_cycle(&client, &cfg, &task_state).await,
                        None => break,
                    },
                }
            }
        });

        Self { state, refresh_tx }
    }

    /// Request an immediate out-of-band poll, ahead of the next timer tick.
    pub fn refresh_now(&self) {
        let _ = self.refresh_tx.send(());
    }
}

impl SpreadSource for PollingSpreadSource {
    fn snapshot(&self) -> SpreadSnapshot {
        self.state.snapshot()
    }

    fn request_refresh(&self) {
        self.refresh_now();
    }
}

async fn poll_cycle(client: &reqwest::Client, cfg: &PollerConfig, state: &SharedSpreadState) {
    let generation = state.begin_poll();
    let outcome = fetch_document(client, cfg).await;
    apply_poll_outcome(state, generation, outcome);

    if let Some(status_url) = &cfg.status_url {
        match fetch_status(client, status_url).await {
            Ok(status) => state.set_scanner(status),
            Err(err) => warn!(
                component = "poller",
                event = "status.degraded",
                error = %err
            ),
        }
    }
}

async fn fetch_document(
    client: &reqwest::Client,
    cfg: &PollerConfig,
) -> Result<SpreadDocument, FetchError> {
    let url = if cfg.cache_bust {
        format!("{}?t={}", cfg.spreads_url, Utc::now().timestamp_millis())
    } else {
        cfg.spreads_url.clone()
    };

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|err| FetchError::Transport(err.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    response
        .json::<SpreadDocument>()
        .await
        .map_err(|err| FetchError::Decode(err.to_string()))
}

async fn fetch_status(
    client: &reqwest::Client,
    status_url: &str,
) -> Result<ScannerStatus, FetchError> {
    let response = client
        .get(status_url)
        .send()
        .await
        .map_err(|err| FetchError::Transport(err.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    response
        .json::<ScannerStatus>()
        .await
        .map_err(|err| FetchError::Decode(err.to_string()))
}
