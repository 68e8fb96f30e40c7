//! Entry point, adapted from the teacher's
//! `examples/fourthplaces-mntogether/packages/server/src/server/main.rs`:
//! tracing init, config load, connect stores, build router, serve.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use extraction::stores::{DocumentStore, MongoDocumentStore, QdrantVectorStore, VectorStore};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use query_service::app::build_app;
use query_service::auth::ApiKeyRegistry;
use query_service::embedding::HttpEmbedder;
use query_service::{AppState, QueryServiceConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,query_service=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("starting query service");

    let config = QueryServiceConfig::from_env().context("failed to load configuration")?;
    tracing::info!(project_id = %config.project_id, environment = ?config.environment, "configuration loaded");

    let document_store = Arc::new(MongoDocumentStore::new(&config.mongodb_uri, &config.mongodb_database));
    document_store.connect().await.context("failed to connect to document store")?;
    tracing::info!("document store connected");

    let vector_store = Arc::new(
        QdrantVectorStore::new(&config.qdrant_url, config.qdrant_api_key.as_deref())
            .context("failed to build vector store client")?,
    );
    vector_store.connect().await.context("failed to connect to vector store")?;
    tracing::info!("vector store connected");

    let embedder = Arc::new(HttpEmbedder::new(config.embedding_endpoint_url.clone(), config.embedding_api_key.clone()));
    let api_keys = ApiKeyRegistry::from_spec(&config.api_keys_spec);

    let state = Arc::new(AppState {
        document_store,
        vector_store,
        embedder,
        project_id: config.project_id.clone(),
        api_keys,
    });

    let app = build_app(state);

    tracing::info!(addr = %config.bind_addr, "starting server");
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await.context("failed to bind to address")?;

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("server error")?;

    Ok(())
}
