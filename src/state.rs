//! Application state management

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::engine::{lopdf_backend::LopdfEngine, PdfEngine};
use crate::extract::PageExtractor;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    extractor: PageExtractor,
}

impl AppState {
    /// Create state backed by the lopdf engine
    pub fn new(config: Config) -> Self {
        Self::with_engine(config, Arc::new(LopdfEngine::new()))
    }

    /// Create state with a custom engine
    pub fn with_engine(config: Config, engine: Arc<dyn PdfEngine>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                extractor: PageExtractor::new(engine),
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the page extractor
    pub fn extractor(&self) -> &PageExtractor {
        &self.inner.extractor
    }

    /// Time limit for one extraction
    pub fn extract_timeout(&self) -> Duration {
        Duration::from_secs(self.inner.config.extraction.timeout_secs)
    }
}
