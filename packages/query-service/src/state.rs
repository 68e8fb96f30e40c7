//! Shared application state (spec §9: "global singletons become explicit
//! dependency-injected values constructed in a top-level wiring function").

use std::sync::Arc;

use extraction::stores::{DocumentStore, VectorStore};
use extraction::embedding::Embedder;

use crate::auth::ApiKeyRegistry;

pub struct AppState {
    pub document_store: Arc<dyn DocumentStore>,
    pub vector_store: Arc<dyn VectorStore>,
    pub embedder: Arc<dyn Embedder>,
    pub project_id: String,
    pub api_keys: ApiKeyRegistry,
}
