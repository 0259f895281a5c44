use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::page::TrackedPage;
use crate::session::ClosedInterval;

/// One persisted dwell-time observation. Mirrors the `page_view` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageViewRecord {
    /// NULL when the visitor never supplied a `uid`.
    pub visitor_id: Option<String>,
    pub page: TrackedPage,
    pub dwell_seconds: f64,
    pub entered_at: DateTime<Utc>,
}

impl PageViewRecord {
    pub fn from_interval(visitor_id: Option<String>, interval: &ClosedInterval) -> Self {
        let dwell_ms = interval.dwell().num_milliseconds();
        Self {
            visitor_id,
            page: interval.page,
            dwell_seconds: dwell_ms as f64 / 1000.0,
            entered_at: interval.entered_at,
        }
    }

    /// Whole seconds, truncated, for the integer `time_spent` column.
    pub fn time_spent_secs(&self) -> i64 {
        self.dwell_seconds.trunc() as i64
    }
}

/// One persisted click on the call-to-action button. Mirrors the `button` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonClickRecord {
    pub visitor_id: Option<String>,
    pub clicked: bool,
}

impl ButtonClickRecord {
    pub fn clicked_by(visitor_id: Option<String>) -> Self {
        Self {
            visitor_id,
            clicked: true,
        }
    }
}

/// A record waiting in the tracker's buffer for the next flush.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackingRecord {
    PageView(PageViewRecord),
    ButtonClick(ButtonClickRecord),
}
