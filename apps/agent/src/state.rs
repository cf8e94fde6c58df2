use std::sync::Arc;
use std::time::Instant;

use secrets::SecretLookup;

#[derive(Clone)]
pub struct AppState {
    pub lookup: Arc<dyn SecretLookup>,
    pub env: String,
    pub started: Instant,
}

impl AppState {
    pub fn new(lookup: Arc<dyn SecretLookup>, env: impl Into<String>) -> Self {
        Self {
            lookup,
            env: env.into(),
            started: Instant::now(),
        }
    }
}
