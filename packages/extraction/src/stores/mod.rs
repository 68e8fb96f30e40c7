//! Storage backends: MongoDB for structured records, Qdrant for vectors
//! (spec §4.10, §4.11).

pub mod document;
pub mod vector;

pub use document::{DocumentStore, MongoDocumentStore};
pub use vector::{QdrantVectorStore, VectorHit, VectorStore, VECTOR_DIMENSION};
