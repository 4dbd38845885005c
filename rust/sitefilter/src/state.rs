use crate::{config::AppConfig, query::FilterEngine};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub engine: FilterEngine,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, engine: FilterEngine) -> Self {
        Self { config, engine }
    }
}
