use std::sync::Arc;

use crate::config::Config;
use crate::engine::{CancellationRegistry, Engine};
use crate::generation::GenerationService;
use crate::observability::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: Engine,
    pub generator: Arc<dyn GenerationService>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(config: Config, generator: Arc<dyn GenerationService>) -> Self {
        let metrics = Arc::new(Metrics::new());
        let engine = Engine::new(Arc::new(CancellationRegistry::new()), metrics.clone())
            .with_options(config.engine.options());

        Self {
            config: Arc::new(config),
            engine,
            generator,
            metrics,
        }
    }
}
