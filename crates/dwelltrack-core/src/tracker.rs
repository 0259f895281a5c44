//! The request-boundary hook: times tracked-page visits and records clicks.
//!
//! Records are queued in memory and written by [`VisitTracker::flush`], which
//! the server drives from a background loop, so no request waits on the store.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, error, warn};

use crate::config::{AnonymousPolicy, Config};
use crate::error::StoreError;
use crate::page::TrackedPage;
use crate::record::{ButtonClickRecord, PageViewRecord, TrackingRecord};
use crate::session::VisitorSession;
use crate::store::TrackingStore;
use crate::visitor::visitor_id_from_query;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSettings {
    /// Intervals must be strictly longer than this to be persisted.
    /// Zero disables the check.
    pub min_dwell: Duration,
    pub anonymous: AnonymousPolicy,
    /// Upper bound on a single store write during a flush.
    pub store_timeout: Duration,
    /// Queue length at which an early flush is requested.
    pub buffer_max_size: usize,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            min_dwell: Duration::ZERO,
            anonymous: AnonymousPolicy::Record,
            store_timeout: Duration::from_secs(2),
            buffer_max_size: 1000,
        }
    }
}

impl From<&Config> for TrackerSettings {
    fn from(config: &Config) -> Self {
        Self {
            min_dwell: config.min_dwell(),
            anonymous: config.anonymous_policy,
            store_timeout: config.store_timeout(),
            buffer_max_size: config.buffer_max_size,
        }
    }
}

/// What happened to the interval that was open when a tracked page was hit.
#[derive(Debug, Clone, PartialEq)]
pub enum IntervalClose {
    /// First tracked visit, or first visit after a terminal page.
    NoOpenInterval,
    BelowThreshold(Duration),
    /// Dropped because the session has no visitor id and the policy is `Skip`.
    Anonymous,
    /// Handed to the write buffer.
    Queued(PageViewRecord),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryOutcome {
    Untracked,
    Tracked {
        page: TrackedPage,
        closed: IntervalClose,
    },
}

impl BoundaryOutcome {
    pub fn queued(&self) -> Option<&PageViewRecord> {
        match self {
            BoundaryOutcome::Tracked {
                closed: IntervalClose::Queued(record),
                ..
            } => Some(record),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    Queued(ButtonClickRecord),
    Anonymous,
}

/// Tally of one buffer drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub written: usize,
    pub failed: usize,
}

/// Session-scoped visit tracker.
///
/// Holds no per-visitor state of its own: callers pass the session they have
/// locked, which keeps concurrent visitors fully isolated. Clones share one
/// write buffer.
#[derive(Clone)]
pub struct VisitTracker {
    store: Arc<dyn TrackingStore>,
    settings: TrackerSettings,
    buffer: Arc<Mutex<Vec<TrackingRecord>>>,
    /// Serializes flushes so batches reach the store in queue order.
    flushing: Arc<Mutex<()>>,
    flush_wanted: Arc<Notify>,
}

impl VisitTracker {
    pub fn new(store: Arc<dyn TrackingStore>, settings: TrackerSettings) -> Self {
        Self {
            store,
            settings,
            buffer: Arc::new(Mutex::new(Vec::new())),
            flushing: Arc::new(Mutex::new(())),
            flush_wanted: Arc::new(Notify::new()),
        }
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    /// Evaluate one request against the session's timing state.
    ///
    /// `requested_path` may include a query string; on entry pages a `uid`
    /// parameter becomes the session's visitor id before anything is queued,
    /// so the interval being closed is attributed to it. Untracked paths
    /// leave the session untouched apart from its idle clock.
    ///
    /// Never touches the store: a closed interval is only queued.
    pub async fn on_request_boundary(
        &self,
        session: &mut VisitorSession,
        requested_path: &str,
        now: DateTime<Utc>,
    ) -> BoundaryOutcome {
        let Some(page) = TrackedPage::from_path(requested_path) else {
            session.touch(now);
            return BoundaryOutcome::Untracked;
        };

        if page.is_entry() {
            if let Some(uid) = visitor_id_from_query(requested_path) {
                session.adopt_visitor_id(&uid);
            }
        }

        let closed = match session.transition(page, now) {
            None => IntervalClose::NoOpenInterval,
            Some(interval) => {
                let dwell = interval.dwell().to_std().unwrap_or(Duration::ZERO);
                if !self.passes_threshold(dwell) {
                    debug!(
                        session_id = %session.session_id,
                        page = %interval.page,
                        dwell_ms = dwell.as_millis() as u64,
                        "Interval below minimum dwell, not recorded"
                    );
                    IntervalClose::BelowThreshold(dwell)
                } else if self.skips(session) {
                    IntervalClose::Anonymous
                } else {
                    let record = PageViewRecord::from_interval(session.visitor_id.clone(), &interval);
                    self.enqueue(TrackingRecord::PageView(record.clone())).await;
                    IntervalClose::Queued(record)
                }
            }
        };

        BoundaryOutcome::Tracked { page, closed }
    }

    /// Queue a click for the session's visitor. Session timing is untouched.
    pub async fn record_button_click(&self, session: &VisitorSession) -> ClickOutcome {
        if self.skips(session) {
            return ClickOutcome::Anonymous;
        }
        let record = ButtonClickRecord::clicked_by(session.visitor_id.clone());
        self.enqueue(TrackingRecord::ButtonClick(record.clone())).await;
        ClickOutcome::Queued(record)
    }

    pub async fn pending(&self) -> usize {
        self.buffer.lock().await.len()
    }

    /// Resolves once the buffer has reached `buffer_max_size`.
    pub async fn flush_requested(&self) {
        self.flush_wanted.notified().await;
    }

    /// Drain the buffer and write every pending record, oldest first.
    ///
    /// The buffer lock is held only for the `std::mem::take`, so request
    /// hooks keep queueing while the store works. Each write is bounded by
    /// `store_timeout`; failures are logged and the record is dropped.
    pub async fn flush(&self) -> FlushReport {
        let _flushing = self.flushing.lock().await;
        let batch: Vec<TrackingRecord> = {
            let mut buf = self.buffer.lock().await;
            std::mem::take(&mut *buf)
        };

        let mut report = FlushReport::default();
        if batch.is_empty() {
            return report;
        }

        for record in &batch {
            let result = match record {
                TrackingRecord::PageView(view) => self.write(self.store.insert_page_view(view)).await,
                TrackingRecord::ButtonClick(click) => {
                    self.write(self.store.insert_button_click(click)).await
                }
            };
            match result {
                Ok(()) => report.written += 1,
                Err(e) => {
                    report.failed += 1;
                    match record {
                        TrackingRecord::PageView(view) => warn!(
                            page = %view.page,
                            error = %e,
                            "Failed to persist page view, dropping it"
                        ),
                        TrackingRecord::ButtonClick(_) => {
                            warn!(error = %e, "Failed to persist button click, dropping it")
                        }
                    }
                }
            }
        }

        if report.failed == 0 {
            debug!(count = report.written, "Tracking buffer flushed");
        } else {
            error!(
                written = report.written,
                failed = report.failed,
                "Tracking buffer flush lost records"
            );
        }
        report
    }

    async fn enqueue(&self, record: TrackingRecord) {
        let full = {
            let mut buf = self.buffer.lock().await;
            buf.push(record);
            buf.len() >= self.settings.buffer_max_size
        };
        if full {
            self.flush_wanted.notify_one();
        }
    }

    fn passes_threshold(&self, dwell: Duration) -> bool {
        self.settings.min_dwell.is_zero() || dwell > self.settings.min_dwell
    }

    fn skips(&self, session: &VisitorSession) -> bool {
        self.settings.anonymous == AnonymousPolicy::Skip && session.visitor_id.is_none()
    }

    async fn write<F>(&self, fut: F) -> Result<(), StoreError>
    where
        F: Future<Output = Result<(), StoreError>>,
    {
        let budget = self.settings.store_timeout;
        tokio::time::timeout(budget, fut)
            .await
            .map_err(|_| StoreError::Timeout(budget))?
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use chrono::TimeZone;

    use super::*;

    #[derive(Default)]
    struct MemoryStore {
        page_views: StdMutex<Vec<PageViewRecord>>,
        clicks: StdMutex<Vec<ButtonClickRecord>>,
        fail: bool,
        stall: bool,
    }

    impl MemoryStore {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn stalling() -> Self {
            Self {
                stall: true,
                ..Self::default()
            }
        }

        fn page_views(&self) -> Vec<PageViewRecord> {
            self.page_views.lock().expect("lock").clone()
        }

        fn clicks(&self) -> Vec<ButtonClickRecord> {
            self.clicks.lock().expect("lock").clone()
        }

        async fn gate(&self) -> Result<(), StoreError> {
            if self.stall {
                std::future::pending::<()>().await;
            }
            if self.fail {
                return Err(StoreError::Backend(anyhow::anyhow!("disk full")));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl TrackingStore for MemoryStore {
        async fn insert_page_view(&self, record: &PageViewRecord) -> Result<(), StoreError> {
            self.gate().await?;
            self.page_views.lock().expect("lock").push(record.clone());
            Ok(())
        }

        async fn insert_button_click(&self, record: &ButtonClickRecord) -> Result<(), StoreError> {
            self.gate().await?;
            self.clicks.lock().expect("lock").push(record.clone());
            Ok(())
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).single().expect("valid ts")
    }

    fn tracker(store: Arc<MemoryStore>, settings: TrackerSettings) -> VisitTracker {
        VisitTracker::new(store, settings)
    }

    #[tokio::test]
    async fn home_then_learn_more_then_confirmation() {
        let store = Arc::new(MemoryStore::default());
        let t = tracker(Arc::clone(&store), TrackerSettings::default());
        let mut s = VisitorSession::new("s1", at(0));

        let first = t.on_request_boundary(&mut s, "/", at(0)).await;
        assert_eq!(
            first,
            BoundaryOutcome::Tracked {
                page: TrackedPage::Home,
                closed: IntervalClose::NoOpenInterval
            }
        );

        let second = t.on_request_boundary(&mut s, "/learn_more", at(5)).await;
        let written = second.queued().expect("home interval queued");
        assert_eq!(written.page, TrackedPage::Home);
        assert_eq!(written.dwell_seconds, 5.0);
        assert_eq!(written.entered_at, at(0));

        t.on_request_boundary(&mut s, "/confirmation", at(9)).await;
        t.flush().await;
        let views = store.page_views();
        assert_eq!(views.len(), 2);
        assert_eq!(views[1].page, TrackedPage::LearnMore);
        assert_eq!(views[1].dwell_seconds, 4.0);
        assert_eq!(s.current_page(), None);
        assert_eq!(s.page_entered_at(), None);
    }

    #[tokio::test]
    async fn direct_learn_more_visit_writes_nothing_and_opens_interval() {
        let store = Arc::new(MemoryStore::default());
        let t = tracker(Arc::clone(&store), TrackerSettings::default());
        let mut s = VisitorSession::new("s1", at(0));

        let outcome = t.on_request_boundary(&mut s, "/learn_more", at(1)).await;
        assert_eq!(
            outcome,
            BoundaryOutcome::Tracked {
                page: TrackedPage::LearnMore,
                closed: IntervalClose::NoOpenInterval
            }
        );
        assert_eq!(t.flush().await, FlushReport::default());
        assert!(store.page_views().is_empty());
        assert_eq!(s.current_page(), Some(TrackedPage::LearnMore));
        assert_eq!(s.page_entered_at(), Some(at(1)));
    }

    #[tokio::test]
    async fn untracked_path_leaves_state_alone() {
        let store = Arc::new(MemoryStore::default());
        let t = tracker(Arc::clone(&store), TrackerSettings::default());
        let mut s = VisitorSession::new("s1", at(0));
        t.on_request_boundary(&mut s, "/", at(0)).await;

        let outcome = t.on_request_boundary(&mut s, "/favicon.ico", at(3)).await;
        assert_eq!(outcome, BoundaryOutcome::Untracked);
        assert_eq!(s.current_page(), Some(TrackedPage::Home));
        assert_eq!(s.page_entered_at(), Some(at(0)));
        assert_eq!(t.pending().await, 0);
    }

    #[tokio::test]
    async fn record_count_matches_transitions() {
        let store = Arc::new(MemoryStore::default());
        let t = tracker(Arc::clone(&store), TrackerSettings::default());
        let mut s = VisitorSession::new("s1", at(0));

        let visits = [
            "/",
            "/learn_more",
            "/",
            "/health",
            "/learn_more",
            "/confirmation",
            "/confirmation",
            "/learn_more",
        ];
        for (i, path) in visits.iter().enumerate() {
            t.on_request_boundary(&mut s, path, at(i as i64 * 2)).await;
        }

        // Tracked-to-tracked or tracked-to-terminal transitions:
        // /->lm, lm->/, /->lm, lm->confirmation.
        t.flush().await;
        let views = store.page_views();
        assert_eq!(views.len(), 4);
        assert!(views.iter().all(|v| v.dwell_seconds >= 0.0));
        assert_eq!(s.current_page(), Some(TrackedPage::LearnMore));
    }

    #[tokio::test]
    async fn uid_on_entry_page_is_attached_to_records() {
        let store = Arc::new(MemoryStore::default());
        let t = tracker(Arc::clone(&store), TrackerSettings::default());
        let mut s = VisitorSession::new("s1", at(0));

        t.on_request_boundary(&mut s, "/?uid=abc123", at(0)).await;
        assert_eq!(s.visitor_id.as_deref(), Some("abc123"));
        t.on_request_boundary(&mut s, "/learn_more?uid=ignored", at(2)).await;
        assert_eq!(s.visitor_id.as_deref(), Some("abc123"));

        t.flush().await;
        let views = store.page_views();
        assert_eq!(views[0].visitor_id.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn new_uid_applies_to_interval_being_closed() {
        let store = Arc::new(MemoryStore::default());
        let t = tracker(Arc::clone(&store), TrackerSettings::default());
        let mut s = VisitorSession::new("s1", at(0));

        t.on_request_boundary(&mut s, "/learn_more", at(0)).await;
        t.on_request_boundary(&mut s, "/website_b?uid=b-77", at(6)).await;

        t.flush().await;
        let views = store.page_views();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].page, TrackedPage::LearnMore);
        assert_eq!(views[0].visitor_id.as_deref(), Some("b-77"));
    }

    #[tokio::test]
    async fn threshold_drops_short_intervals() {
        let store = Arc::new(MemoryStore::default());
        let settings = TrackerSettings {
            min_dwell: Duration::from_secs(3),
            ..TrackerSettings::default()
        };
        let t = tracker(Arc::clone(&store), settings);
        let mut s = VisitorSession::new("s1", at(0));

        t.on_request_boundary(&mut s, "/", at(0)).await;
        let short = t.on_request_boundary(&mut s, "/learn_more", at(3)).await;
        assert_eq!(
            short,
            BoundaryOutcome::Tracked {
                page: TrackedPage::LearnMore,
                closed: IntervalClose::BelowThreshold(Duration::from_secs(3))
            }
        );
        // The short interval still moved the session on.
        assert_eq!(s.page_entered_at(), Some(at(3)));

        t.on_request_boundary(&mut s, "/confirmation", at(7)).await;
        t.flush().await;
        let views = store.page_views();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].page, TrackedPage::LearnMore);
        assert_eq!(views[0].dwell_seconds, 4.0);
    }

    #[tokio::test]
    async fn zero_threshold_keeps_instant_transitions() {
        let store = Arc::new(MemoryStore::default());
        let t = tracker(Arc::clone(&store), TrackerSettings::default());
        let mut s = VisitorSession::new("s1", at(0));

        t.on_request_boundary(&mut s, "/", at(0)).await;
        t.on_request_boundary(&mut s, "/learn_more", at(0)).await;
        t.flush().await;
        assert_eq!(store.page_views().len(), 1);
        assert_eq!(store.page_views()[0].dwell_seconds, 0.0);
    }

    #[tokio::test]
    async fn anonymous_visitors_recorded_with_null_identity_by_default() {
        let store = Arc::new(MemoryStore::default());
        let t = tracker(Arc::clone(&store), TrackerSettings::default());
        let mut s = VisitorSession::new("s1", at(0));

        t.on_request_boundary(&mut s, "/", at(0)).await;
        t.on_request_boundary(&mut s, "/learn_more", at(1)).await;
        assert_eq!(
            t.record_button_click(&s).await,
            ClickOutcome::Queued(ButtonClickRecord::clicked_by(None))
        );
        t.flush().await;
        assert_eq!(store.page_views()[0].visitor_id, None);
        assert_eq!(store.clicks().len(), 1);
    }

    #[tokio::test]
    async fn skip_policy_drops_anonymous_records_but_advances_state() {
        let store = Arc::new(MemoryStore::default());
        let settings = TrackerSettings {
            anonymous: AnonymousPolicy::Skip,
            ..TrackerSettings::default()
        };
        let t = tracker(Arc::clone(&store), settings);
        let mut s = VisitorSession::new("s1", at(0));

        t.on_request_boundary(&mut s, "/", at(0)).await;
        let outcome = t.on_request_boundary(&mut s, "/learn_more", at(4)).await;
        assert_eq!(
            outcome,
            BoundaryOutcome::Tracked {
                page: TrackedPage::LearnMore,
                closed: IntervalClose::Anonymous
            }
        );
        assert_eq!(s.current_page(), Some(TrackedPage::LearnMore));
        assert_eq!(t.record_button_click(&s).await, ClickOutcome::Anonymous);
        assert_eq!(t.pending().await, 0);
        assert!(store.page_views().is_empty());
        assert!(store.clicks().is_empty());
    }

    #[tokio::test]
    async fn click_writes_one_record_and_no_page_view() {
        let store = Arc::new(MemoryStore::default());
        let t = tracker(Arc::clone(&store), TrackerSettings::default());
        let mut s = VisitorSession::new("s1", at(0));
        s.adopt_visitor_id("abc123");
        t.on_request_boundary(&mut s, "/", at(0)).await;

        let outcome = t.record_button_click(&s).await;
        assert_eq!(
            outcome,
            ClickOutcome::Queued(ButtonClickRecord {
                visitor_id: Some("abc123".to_string()),
                clicked: true
            })
        );
        t.flush().await;
        assert_eq!(store.clicks().len(), 1);
        assert!(store.page_views().is_empty());
        assert_eq!(s.current_page(), Some(TrackedPage::Home));
        assert_eq!(s.page_entered_at(), Some(at(0)));
    }

    #[tokio::test]
    async fn store_failures_are_swallowed() {
        let store = Arc::new(MemoryStore::failing());
        let t = tracker(Arc::clone(&store), TrackerSettings::default());
        let mut s = VisitorSession::new("s1", at(0));

        t.on_request_boundary(&mut s, "/", at(0)).await;
        let outcome = t.on_request_boundary(&mut s, "/confirmation", at(2)).await;
        assert_eq!(outcome.queued().map(|r| r.page), Some(TrackedPage::Home));
        assert!(s.is_idle());
        t.record_button_click(&s).await;

        let report = t.flush().await;
        assert_eq!(report, FlushReport { written: 0, failed: 2 });
        // Failed records are dropped, not retried.
        assert_eq!(t.pending().await, 0);
        assert_eq!(t.flush().await, FlushReport::default());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_store_does_not_hold_up_the_hook() {
        let store = Arc::new(MemoryStore::stalling());
        let settings = TrackerSettings {
            store_timeout: Duration::from_millis(50),
            ..TrackerSettings::default()
        };
        let t = tracker(Arc::clone(&store), settings);
        let mut s = VisitorSession::new("s1", at(0));

        let started = tokio::time::Instant::now();
        t.on_request_boundary(&mut s, "/", at(0)).await;
        let outcome = t.on_request_boundary(&mut s, "/learn_more", at(1)).await;
        assert!(outcome.queued().is_some());
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(s.current_page(), Some(TrackedPage::LearnMore));

        // The flush absorbs the stall and gives up after the write budget.
        let report = t.flush().await;
        assert_eq!(report, FlushReport { written: 0, failed: 1 });
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn flush_preserves_queue_order() {
        let store = Arc::new(MemoryStore::default());
        let t = tracker(Arc::clone(&store), TrackerSettings::default());
        let mut s = VisitorSession::new("s1", at(0));

        for (i, path) in ["/", "/learn_more", "/", "/learn_more"].iter().enumerate() {
            t.on_request_boundary(&mut s, path, at(i as i64)).await;
        }
        assert_eq!(t.pending().await, 3);
        assert_eq!(t.flush().await, FlushReport { written: 3, failed: 0 });

        let pages: Vec<TrackedPage> = store.page_views().iter().map(|v| v.page).collect();
        assert_eq!(
            pages,
            vec![TrackedPage::Home, TrackedPage::LearnMore, TrackedPage::Home]
        );
    }

    #[tokio::test]
    async fn full_buffer_requests_a_flush() {
        let store = Arc::new(MemoryStore::default());
        let settings = TrackerSettings {
            buffer_max_size: 2,
            ..TrackerSettings::default()
        };
        let t = tracker(Arc::clone(&store), settings);
        let s = VisitorSession::new("s1", at(0));

        t.record_button_click(&s).await;
        t.record_button_click(&s).await;
        // The permit stored by the second click resolves this immediately.
        tokio::time::timeout(Duration::from_secs(1), t.flush_requested())
            .await
            .expect("flush requested");
        assert_eq!(t.flush().await.written, 2);
    }
}
