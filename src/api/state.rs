use std::sync::Arc;

use crate::query::QueryService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<QueryService>,
}

impl AppState {
    pub fn new(service: QueryService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}
