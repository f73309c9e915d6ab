//! Shared application state

use crate::backend::BackendClient;
use crate::history::QueryHistory;
use ragrelay_common::{config::AppConfig, ContextComposer, Retriever};
use std::sync::Arc;

/// State shared across handlers. Every collaborator is constructed once at
/// startup and injected here; handlers never reach for globals.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub retriever: Arc<Retriever>,
    pub composer: ContextComposer,
    pub backend: Arc<BackendClient>,
    pub history: Arc<QueryHistory>,
}
