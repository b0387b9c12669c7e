use crate::ingest::IngestCoordinator;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<IngestCoordinator>,
}
