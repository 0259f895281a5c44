use async_trait::async_trait;

use crate::error::StoreError;
use crate::record::{ButtonClickRecord, PageViewRecord};

/// Append-only sink for tracking records.
///
/// Implementations must accept concurrent inserts from many sessions.
/// The server uses the DuckDB backend; tests plug in in-memory fakes.
#[async_trait]
pub trait TrackingStore: Send + Sync {
    async fn insert_page_view(&self, record: &PageViewRecord) -> Result<(), StoreError>;

    async fn insert_button_click(&self, record: &ButtonClickRecord) -> Result<(), StoreError>;
}
