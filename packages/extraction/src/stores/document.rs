//! Document Store Client (spec §4.10): typed CRUD over the sources,
//! chunks, and extractions collections in MongoDB.
//!
//! Grounded on `examples/original_source/packages/pipeline/src/storage/mongodb.py`
//! (`MongoDBClient`) — index set, ObjectId validation, and the duplicate
//! detection in `save_extraction_from_extractor` are carried over verbatim
//! in spirit, adapted to the async `mongodb` driver and this crate's typed
//! models instead of a raw dict-based ORM.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{ExtractionError, Result};
use crate::types::{Chunk, Extraction, ExtractionType, Source, SourceStatus};

const SOURCES_COLLECTION: &str = "sources";
const CHUNKS_COLLECTION: &str = "chunks";
const EXTRACTIONS_COLLECTION: &str = "extractions";

/// Storage seam the orchestrator and query service both depend on, so tests
/// can swap in an in-memory fake (see `crate::testing`).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn connect(&self) -> Result<()>;
    async fn close(&self) -> Result<()>;
    async fn ping(&self) -> bool;

    async fn get_source(&self, source_id: &str) -> Result<Source>;
    async fn list_sources(&self, status: Option<SourceStatus>) -> Result<Vec<Source>>;

    async fn get_chunk(&self, chunk_id: &str) -> Result<Chunk>;
    async fn get_chunks_by_source(&self, source_id: &str) -> Result<Vec<Chunk>>;
    async fn count_chunks_by_source(&self, source_id: &str) -> Result<u64>;
    async fn create_chunks_bulk(&self, chunks: &[Chunk]) -> Result<Vec<String>>;

    async fn get_extraction(&self, extraction_id: &str) -> Result<Extraction>;
    async fn get_extractions_by_source(&self, source_id: &str) -> Result<Vec<Extraction>>;
    async fn get_extractions_by_type(
        &self,
        extraction_type: ExtractionType,
        topics: Option<&[String]>,
    ) -> Result<Vec<Extraction>>;
    async fn find_duplicate_extraction(
        &self,
        chunk_id: &str,
        extraction_type: ExtractionType,
    ) -> Result<Option<String>>;
    async fn create_extraction(&self, extraction: &Extraction) -> Result<String>;
}

fn validate_object_id(id: &str, resource: &str) -> Result<ObjectId> {
    ObjectId::parse_str(id).map_err(|e| {
        ExtractionError::Validation(format!("invalid {resource} id '{id}': {e}"))
    })
}

fn strip_id(mut doc: Document) -> Result<Document> {
    let oid = doc
        .remove("_id")
        .and_then(|v| v.as_object_id().map(|o| o.to_hex()))
        .ok_or_else(|| ExtractionError::Internal("document missing _id".into()))?;
    doc.insert("id", oid);
    Ok(doc)
}

fn doc_to<T: serde::de::DeserializeOwned>(doc: Document) -> Result<T> {
    mongodb::bson::from_document(doc)
        .map_err(|e| ExtractionError::Internal(format!("malformed stored document: {e}")))
}

fn to_bson_doc<T: serde::Serialize>(value: &T) -> Result<Document> {
    mongodb::bson::to_document(value)
        .map_err(|e| ExtractionError::Internal(format!("could not serialize document: {e}")))
}

/// MongoDB-backed [`DocumentStore`]. Connection is lazily established and
/// can be torn down and re-established (spec §4.10 connection lifecycle).
pub struct MongoDocumentStore {
    uri: String,
    database_name: String,
    state: RwLock<Option<(Client, Database)>>,
}

impl MongoDocumentStore {
    pub fn new(uri: impl Into<String>, database_name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database_name: database_name.into(),
            state: RwLock::new(None),
        }
    }

    async fn database(&self) -> Result<Database> {
        if let Some((_, db)) = self.state.read().await.as_ref() {
            return Ok(db.clone());
        }
        self.connect().await?;
        self.state
            .read()
            .await
            .as_ref()
            .map(|(_, db)| db.clone())
            .ok_or_else(|| ExtractionError::Storage("not connected after connect()".into()))
    }

    async fn sources(&self) -> Result<Collection<Document>> {
        Ok(self.database().await?.collection(SOURCES_COLLECTION))
    }

    async fn chunks(&self) -> Result<Collection<Document>> {
        Ok(self.database().await?.collection(CHUNKS_COLLECTION))
    }

    async fn extractions(&self) -> Result<Collection<Document>> {
        Ok(self.database().await?.collection(EXTRACTIONS_COLLECTION))
    }

    async fn ensure_indexes(&self, db: &Database) -> Result<()> {
        let index = |keys: Document, name: &str| {
            IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().name(name.to_string()).build())
                .build()
        };

        let sources: Collection<Document> = db.collection(SOURCES_COLLECTION);
        sources
            .create_index(index(doc! {"status": 1}, "idx_sources_status"))
            .await
            .map_err(box_storage_err)?;
        sources
            .create_index(index(
                doc! {"project_id": 1, "type": 1},
                "idx_sources_project_type",
            ))
            .await
            .map_err(box_storage_err)?;
        sources
            .create_index(index(
                doc! {"project_id": 1, "category": 1},
                "idx_sources_project_category",
            ))
            .await
            .map_err(box_storage_err)?;
        sources
            .create_index(index(
                doc! {"project_id": 1, "tags": 1},
                "idx_sources_project_tags",
            ))
            .await
            .map_err(box_storage_err)?;

        let chunks: Collection<Document> = db.collection(CHUNKS_COLLECTION);
        chunks
            .create_index(index(doc! {"source_id": 1}, "idx_chunks_source_id"))
            .await
            .map_err(box_storage_err)?;
        chunks
            .create_index(index(
                doc! {"project_id": 1, "source_id": 1},
                "idx_chunks_project_source",
            ))
            .await
            .map_err(box_storage_err)?;

        let extractions: Collection<Document> = db.collection(EXTRACTIONS_COLLECTION);
        extractions
            .create_index(index(
                doc! {"type": 1, "topics": 1},
                "idx_extractions_type_topics",
            ))
            .await
            .map_err(box_storage_err)?;
        extractions
            .create_index(index(doc! {"source_id": 1}, "idx_extractions_source_id"))
            .await
            .map_err(box_storage_err)?;
        extractions
            .create_index(index(
                doc! {"project_id": 1, "source_id": 1},
                "idx_extractions_project_source",
            ))
            .await
            .map_err(box_storage_err)?;
        extractions
            .create_index(index(
                doc! {"project_id": 1, "type": 1},
                "idx_extractions_project_type",
            ))
            .await
            .map_err(box_storage_err)?;

        info!("mongodb indexes ensured");
        Ok(())
    }
}

fn box_storage_err(e: mongodb::error::Error) -> ExtractionError {
    ExtractionError::Storage(Box::new(e))
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn connect(&self) -> Result<()> {
        let client = Client::with_uri_str(&self.uri).await.map_err(box_storage_err)?;
        let db = client.database(&self.database_name);
        self.ensure_indexes(&db).await?;
        *self.state.write().await = Some((client, db));
        info!(database = %self.database_name, "mongodb connected");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if let Some((client, _)) = self.state.write().await.take() {
            drop(client);
            info!("mongodb disconnected");
        }
        Ok(())
    }

    async fn ping(&self) -> bool {
        let Some((client, _)) = self.state.read().await.clone() else {
            return false;
        };
        client
            .database("admin")
            .run_command(doc! {"ping": 1})
            .await
            .is_ok()
    }

    async fn get_source(&self, source_id: &str) -> Result<Source> {
        let oid = validate_object_id(source_id, "source")?;
        let doc = self
            .sources()
            .await?
            .find_one(doc! {"_id": oid})
            .await
            .map_err(box_storage_err)?
            .ok_or_else(|| ExtractionError::NotFound(format!("source {source_id}")))?;
        doc_to(strip_id(doc)?)
    }

    async fn list_sources(&self, status: Option<SourceStatus>) -> Result<Vec<Source>> {
        let filter = match status {
            Some(s) => doc! {"status": status_to_str(s)},
            None => doc! {},
        };
        let cursor = self.sources().await?.find(filter).await.map_err(box_storage_err)?;
        let docs: Vec<Document> = cursor.try_collect().await.map_err(box_storage_err)?;
        docs.into_iter().map(|d| doc_to(strip_id(d)?)).collect()
    }

    async fn get_chunk(&self, chunk_id: &str) -> Result<Chunk> {
        let oid = validate_object_id(chunk_id, "chunk")?;
        let doc = self
            .chunks()
            .await?
            .find_one(doc! {"_id": oid})
            .await
            .map_err(box_storage_err)?
            .ok_or_else(|| ExtractionError::NotFound(format!("chunk {chunk_id}")))?;
        doc_to(strip_id(doc)?)
    }

    async fn get_chunks_by_source(&self, source_id: &str) -> Result<Vec<Chunk>> {
        validate_object_id(source_id, "source")?;
        let cursor = self
            .chunks()
            .await?
            .find(doc! {"source_id": source_id})
            .await
            .map_err(box_storage_err)?;
        let docs: Vec<Document> = cursor.try_collect().await.map_err(box_storage_err)?;
        docs.into_iter().map(|d| doc_to(strip_id(d)?)).collect()
    }

    async fn count_chunks_by_source(&self, source_id: &str) -> Result<u64> {
        self.chunks()
            .await?
            .count_documents(doc! {"source_id": source_id})
            .await
            .map_err(box_storage_err)
    }

    async fn create_chunks_bulk(&self, chunks: &[Chunk]) -> Result<Vec<String>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        let docs = chunks
            .iter()
            .map(|c| {
                let mut doc = to_bson_doc(c)?;
                doc.remove("id");
                doc.insert("_id", ObjectId::new());
                Ok(doc)
            })
            .collect::<Result<Vec<_>>>()?;

        let result = self
            .chunks()
            .await?
            .insert_many(docs)
            .ordered(false)
            .await
            .map_err(box_storage_err)?;

        let mut ids: Vec<(i64, String)> = result
            .inserted_ids
            .into_iter()
            .filter_map(|(idx, bson)| match bson {
                Bson::ObjectId(oid) => Some((idx as i64, oid.to_hex())),
                _ => None,
            })
            .collect();
        ids.sort_by_key(|(idx, _)| *idx);
        Ok(ids.into_iter().map(|(_, id)| id).collect())
    }

    async fn get_extraction(&self, extraction_id: &str) -> Result<Extraction> {
        let oid = validate_object_id(extraction_id, "extraction")?;
        let doc = self
            .extractions()
            .await?
            .find_one(doc! {"_id": oid})
            .await
            .map_err(box_storage_err)?
            .ok_or_else(|| ExtractionError::NotFound(format!("extraction {extraction_id}")))?;
        doc_to(strip_id(doc)?)
    }

    async fn get_extractions_by_source(&self, source_id: &str) -> Result<Vec<Extraction>> {
        validate_object_id(source_id, "source")?;
        let cursor = self
            .extractions()
            .await?
            .find(doc! {"source_id": source_id})
            .await
            .map_err(box_storage_err)?;
        let docs: Vec<Document> = cursor.try_collect().await.map_err(box_storage_err)?;
        docs.into_iter().map(|d| doc_to(strip_id(d)?)).collect()
    }

    async fn get_extractions_by_type(
        &self,
        extraction_type: ExtractionType,
        topics: Option<&[String]>,
    ) -> Result<Vec<Extraction>> {
        let mut filter = doc! {"type": extraction_type.as_str()};
        if let Some(topics) = topics {
            if !topics.is_empty() {
                filter.insert("topics", doc! {"$in": topics});
            }
        }
        let cursor = self.extractions().await?.find(filter).await.map_err(box_storage_err)?;
        let docs: Vec<Document> = cursor.try_collect().await.map_err(box_storage_err)?;
        docs.into_iter().map(|d| doc_to(strip_id(d)?)).collect()
    }

    async fn find_duplicate_extraction(
        &self,
        chunk_id: &str,
        extraction_type: ExtractionType,
    ) -> Result<Option<String>> {
        validate_object_id(chunk_id, "chunk")?;
        let existing = self
            .extractions()
            .await?
            .find_one(doc! {"chunk_id": chunk_id, "type": extraction_type.as_str()})
            .await
            .map_err(box_storage_err)?;
        Ok(existing.and_then(|d| d.get_object_id("_id").ok().map(|oid| oid.to_hex())))
    }

    async fn create_extraction(&self, extraction: &Extraction) -> Result<String> {
        if let Some(existing_id) =
            self.find_duplicate_extraction(&extraction.chunk_id, extraction.extraction_type()).await?
        {
            warn!(
                chunk_id = %extraction.chunk_id,
                extraction_type = %extraction.extraction_type(),
                existing_id = %existing_id,
                "duplicate extraction skipped"
            );
            return Ok(existing_id);
        }

        let mut doc = to_bson_doc(extraction)?;
        doc.remove("id");
        doc.insert("_id", ObjectId::new());
        // `content` is an untagged enum, so the variant isn't written as its
        // own field; store it explicitly so `type`-keyed indexes and queries
        // (§4.10) have something to match on.
        doc.insert("type", extraction.extraction_type().as_str());

        let result = self
            .extractions()
            .await?
            .insert_one(doc)
            .await
            .map_err(box_storage_err)?;

        result
            .inserted_id
            .as_object_id()
            .map(|oid| oid.to_hex())
            .ok_or_else(|| ExtractionError::Internal("insert did not return an ObjectId".into()))
    }
}

fn status_to_str(status: SourceStatus) -> &'static str {
    match status {
        SourceStatus::Pending => "pending",
        SourceStatus::Processing => "processing",
        SourceStatus::Complete => "complete",
        SourceStatus::Failed => "failed",
    }
}
