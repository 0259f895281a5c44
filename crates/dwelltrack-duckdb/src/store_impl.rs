use async_trait::async_trait;

use dwelltrack_core::error::StoreError;
use dwelltrack_core::record::{ButtonClickRecord, PageViewRecord};
use dwelltrack_core::store::TrackingStore;

use crate::DuckDbBackend;

#[async_trait]
impl TrackingStore for DuckDbBackend {
    async fn insert_page_view(&self, record: &PageViewRecord) -> Result<(), StoreError> {
        DuckDbBackend::insert_page_view(self, record)
            .await
            .map_err(StoreError::Backend)
    }

    async fn insert_button_click(&self, record: &ButtonClickRecord) -> Result<(), StoreError> {
        DuckDbBackend::insert_button_click(self, record)
            .await
            .map_err(StoreError::Backend)
    }
}
