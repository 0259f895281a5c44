//! Per-session visit state.
//!
//! A session is either idle or viewing exactly one tracked page. The open
//! page and its entry timestamp live in a single [`OpenInterval`], so they
//! are always set and cleared together.

use chrono::{DateTime, Duration, Utc};

use crate::page::TrackedPage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenInterval {
    pub page: TrackedPage,
    pub entered_at: DateTime<Utc>,
}

/// An interval that ended on a page transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosedInterval {
    pub page: TrackedPage,
    pub entered_at: DateTime<Utc>,
    pub left_at: DateTime<Utc>,
}

impl ClosedInterval {
    /// Time spent on the page. Clamped to zero if the clock went backwards.
    pub fn dwell(&self) -> Duration {
        (self.left_at - self.entered_at).max(Duration::zero())
    }
}

#[derive(Debug, Clone)]
pub struct VisitorSession {
    pub session_id: String,
    pub visitor_id: Option<String>,
    open: Option<OpenInterval>,
    pub last_seen: DateTime<Utc>,
}

impl VisitorSession {
    pub fn new(session_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            visitor_id: None,
            open: None,
            last_seen: now,
        }
    }

    pub fn current_page(&self) -> Option<TrackedPage> {
        self.open.map(|o| o.page)
    }

    pub fn page_entered_at(&self) -> Option<DateTime<Utc>> {
        self.open.map(|o| o.entered_at)
    }

    pub fn open_interval(&self) -> Option<OpenInterval> {
        self.open
    }

    pub fn is_idle(&self) -> bool {
        self.open.is_none()
    }

    /// Store a visitor-supplied identifier. Blank values keep the current one.
    pub fn adopt_visitor_id(&mut self, raw: &str) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            self.visitor_id = Some(trimmed.to_string());
        }
    }

    /// Advance the state machine on a visit to `page` at `now`.
    ///
    /// Returns the interval that was open before the visit, if any. Terminal
    /// pages leave the session idle; any other page opens a new interval,
    /// including a revisit of the page already open.
    pub fn transition(&mut self, page: TrackedPage, now: DateTime<Utc>) -> Option<ClosedInterval> {
        self.last_seen = now;
        let next = if page.is_terminal() {
            None
        } else {
            Some(OpenInterval {
                page,
                entered_at: now,
            })
        };
        std::mem::replace(&mut self.open, next).map(|prev| ClosedInterval {
            page: prev.page,
            entered_at: prev.entered_at,
            left_at: now,
        })
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_seen {
            self.last_seen = now;
        }
    }
}
