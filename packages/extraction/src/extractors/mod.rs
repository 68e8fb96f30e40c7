//! Category extractors, the registry that routes to them, and the
//! supporting response-parsing and topic-tagging helpers (spec §4.6, §4.7).

pub mod category;
pub mod registry;
pub mod response;
pub mod topics;

pub use category::{default_registry, CategoryExtractor, DefaultCategoryExtractor, ExtractorConfig};
pub use registry::ExtractorRegistry;
pub use response::parse_json_response;
pub use topics::auto_tag;
