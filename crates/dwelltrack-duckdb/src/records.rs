use anyhow::Result;

use dwelltrack_core::record::{ButtonClickRecord, PageViewRecord};

use crate::backend::TS_FORMAT;
use crate::DuckDbBackend;

/// A `page_view` row as read back from DuckDB.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPageView {
    pub id: i64,
    pub visitor_id: Option<String>,
    pub page: String,
    pub time_spent: i64,
    pub start_time: String,
}

/// A `button` row as read back from DuckDB.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredButtonClick {
    pub id: i64,
    pub visitor_id: Option<String>,
    pub button: bool,
}

impl DuckDbBackend {
    /// Append one closed dwell interval to `page_view`.
    pub async fn insert_page_view(&self, record: &PageViewRecord) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO page_view (visitor_id, page, time_spent, start_time) \
             VALUES (?1, ?2, ?3, ?4)",
            duckdb::params![
                record.visitor_id,
                record.page.label(),
                record.time_spent_secs(),
                record.entered_at.format(TS_FORMAT).to_string(),
            ],
        )?;
        tracing::debug!(page = %record.page, time_spent = record.time_spent_secs(), "Inserted page view");
        Ok(())
    }

    /// Append one click to `button`.
    pub async fn insert_button_click(&self, record: &ButtonClickRecord) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO button (visitor_id, button) VALUES (?1, ?2)",
            duckdb::params![record.visitor_id, record.clicked],
        )?;
        tracing::debug!("Inserted button click");
        Ok(())
    }

    /// All page views in insertion order.
    pub async fn list_page_views(&self) -> Result<Vec<StoredPageView>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, visitor_id, page, CAST(time_spent AS BIGINT), CAST(start_time AS VARCHAR) \
             FROM page_view ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(StoredPageView {
                id: row.get(0)?,
                visitor_id: row.get(1)?,
                page: row.get(2)?,
                time_spent: row.get(3)?,
                start_time: row.get(4)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// All button clicks in insertion order.
    pub async fn list_button_clicks(&self) -> Result<Vec<StoredButtonClick>> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare("SELECT id, visitor_id, button FROM button ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(StoredButtonClick {
                id: row.get(0)?,
                visitor_id: row.get(1)?,
                button: row.get(2)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}
