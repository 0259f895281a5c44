use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use dwelltrack_core::{
    registry::SessionRegistry,
    store::TrackingStore,
    tracker::{FlushReport, TrackerSettings, VisitTracker},
};
use dwelltrack_duckdb::DuckDbBackend;

use crate::config::Config;

/// Shared application state injected into every Axum handler via
/// [`axum::extract::State`].
pub struct AppState {
    /// The DuckDB backend. Used directly by `/health`; also the tracker's
    /// store unless one is injected with [`AppState::with_store`].
    pub db: Arc<DuckDbBackend>,

    /// Parsed configuration, loaded once at startup from environment variables.
    pub config: Arc<Config>,

    pub tracker: VisitTracker,

    /// Per-visitor timing state, keyed by the `dt_session` cookie.
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    /// Construct a new `AppState` that persists tracking records to `db`.
    pub fn new(db: DuckDbBackend, config: Config) -> Self {
        let db = Arc::new(db);
        let store: Arc<dyn TrackingStore> = db.clone();
        Self::build(db, config, store)
    }

    /// Like [`AppState::new`], but tracking records go to `store`.
    pub fn with_store(db: DuckDbBackend, config: Config, store: Arc<dyn TrackingStore>) -> Self {
        Self::build(Arc::new(db), config, store)
    }

    fn build(db: Arc<DuckDbBackend>, config: Config, store: Arc<dyn TrackingStore>) -> Self {
        let tracker = VisitTracker::new(store, TrackerSettings::from(&config));
        Self {
            db,
            config: Arc::new(config),
            tracker,
            sessions: Arc::new(SessionRegistry::new()),
        }
    }

    /// Write every queued page view and click to the store.
    pub async fn flush_records(&self) -> FlushReport {
        self.tracker.flush().await
    }

    /// Background loop: flush queued records on a fixed interval, or as soon
    /// as the queue reaches `config.buffer_max_size`.
    ///
    /// Spawned as a `tokio::spawn` task in `main.rs`. Runs until the process
    /// exits.
    pub async fn run_record_flush_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.buffer_flush_interval());
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.tracker.flush_requested() => {}
            }
            let report = self.flush_records().await;
            if report.written > 0 {
                debug!(count = report.written, "Tracking records flushed to DuckDB");
            }
        }
    }

    /// Drop sessions idle for longer than the configured window.
    pub async fn sweep_idle_sessions(&self) -> usize {
        self.sessions
            .evict_idle(Utc::now(), self.config.session_idle())
            .await
    }

    /// Background loop: evict idle sessions on a fixed interval.
    ///
    /// Spawned as a `tokio::spawn` task in `main.rs`. Runs until the process
    /// exits.
    pub async fn run_session_sweep_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.session_sweep_interval());
        loop {
            ticker.tick().await;
            let evicted = self.sweep_idle_sessions().await;
            if evicted > 0 {
                let remaining = self.sessions.len().await;
                info!(evicted, remaining, "Idle sessions evicted");
            }
        }
    }
}
