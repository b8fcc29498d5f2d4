use std::sync::Arc;

use compileforge_core::LifecycleManager;

/// Shared application state, cheap to clone per request (`Arc` inside).
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<LifecycleManager>,
}

impl AppState {
    pub fn new(lifecycle: Arc<LifecycleManager>) -> Self {
        Self { lifecycle }
    }
}
