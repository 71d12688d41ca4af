use std::sync::Arc;

use stockhook_core::Config;
use stockhook_storage::RecordStore;

use crate::services::IngestionService;
use crate::templates::Pages;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn RecordStore>,
    pub ingestion: IngestionService,
    pub pages: Arc<Pages>,
}
