//! Extraction envelope and the seven category content shapes (spec §3, §4.1).
//!
//! Mirrors the teacher's tagged-variant style in
//! `examples/fourthplaces-mntogether/packages/extraction/src/types/extraction.rs`,
//! but keyed on a `type` discriminant with a dedicated content struct per
//! category instead of a single free-form `content: String`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::error::{ErrorCode, ExtractionError, Result};

pub const SCHEMA_VERSION: &str = "1.1.0";

/// One of the seven knowledge categories this system extracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionType {
    Decision,
    Pattern,
    Warning,
    Methodology,
    Checklist,
    Persona,
    Workflow,
}

impl ExtractionType {
    pub const ALL: [ExtractionType; 7] = [
        ExtractionType::Decision,
        ExtractionType::Pattern,
        ExtractionType::Warning,
        ExtractionType::Methodology,
        ExtractionType::Checklist,
        ExtractionType::Persona,
        ExtractionType::Workflow,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ExtractionType::Decision => "decision",
            ExtractionType::Pattern => "pattern",
            ExtractionType::Warning => "warning",
            ExtractionType::Methodology => "methodology",
            ExtractionType::Checklist => "checklist",
            ExtractionType::Persona => "persona",
            ExtractionType::Workflow => "workflow",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        ExtractionType::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl std::fmt::Display for ExtractionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The granularity an extractor received its content at (spec §4.8 routing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContextLevel {
    Chapter,
    Section,
    #[default]
    Chunk,
}

/// A single step in a [`MethodologyContent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodologyStep {
    pub order: u32,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub tips: Option<String>,
}

/// A single item in a [`ChecklistContent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub item: String,
    #[serde(default = "default_true")]
    pub required: bool,
}

fn default_true() -> bool {
    true
}

/// A single step in a [`WorkflowContent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub order: u32,
    pub action: String,
    #[serde(default)]
    pub outputs: Option<Vec<String>>,
}

macro_rules! content_struct {
    (
        $name:ident {
            required: { $($rfield:ident : $rty:ty),* $(,)? },
            optional: { $($ofield:ident : $oty:ty),* $(,)? }
        }
    ) => {
        #[derive(Debug, Clone, Serialize, Deserialize)]
        pub struct $name {
            $(pub $rfield: $rty,)*
            $(#[serde(default)] pub $ofield: Option<$oty>,)*
            /// Unknown fields the model emitted — preserved, never validated.
            #[serde(flatten)]
            pub extra: Map<String, Value>,
        }
    };
}

content_struct!(DecisionContent {
    required: { question: String },
    optional: {
        options: Vec<String>,
        considerations: Vec<String>,
        recommended_approach: String,
        context: String
    }
});

content_struct!(PatternContent {
    required: { name: String, problem: String, solution: String },
    optional: {
        code_example: String,
        context: String,
        trade_offs: Vec<String>
    }
});

content_struct!(WarningContent {
    required: { title: String, description: String },
    optional: {
        symptoms: Vec<String>,
        consequences: Vec<String>,
        prevention: String
    }
});

content_struct!(MethodologyContent {
    required: { name: String, steps: Vec<MethodologyStep> },
    optional: {
        prerequisites: Vec<String>,
        outputs: Vec<String>
    }
});

content_struct!(ChecklistContent {
    required: { name: String, items: Vec<ChecklistItem> },
    optional: { context: String }
});

content_struct!(PersonaContent {
    required: { role: String },
    optional: {
        responsibilities: Vec<String>,
        expertise: Vec<String>,
        communication_style: String
    }
});

content_struct!(WorkflowContent {
    required: { name: String, steps: Vec<WorkflowStep> },
    optional: {
        trigger: String,
        decision_points: Vec<String>
    }
});

/// The category-specific payload of an [`Extraction`], tagged by
/// [`ExtractionType`]. A generic parser routes a `(type, content)` pair to
/// the matching variant and rejects any mismatch (spec §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtractionContent {
    Decision(DecisionContent),
    Pattern(PatternContent),
    Warning(WarningContent),
    Methodology(MethodologyContent),
    Checklist(ChecklistContent),
    Persona(PersonaContent),
    Workflow(WorkflowContent),
}

impl ExtractionContent {
    /// Parse raw JSON content against the shape dictated by `extraction_type`.
    /// Returns `EXTRACTION_PARSE_ERROR`-coded validation failures when the
    /// raw value doesn't match the required fields for that category (e.g.
    /// `type=decision` with only `{title, description}`).
    pub fn parse(extraction_type: ExtractionType, raw: Value) -> Result<Self> {
        let mismatch = |e: serde_json::Error| {
            ExtractionError::Validation(format!(
                "content does not match shape for {}: {}",
                extraction_type, e
            ))
        };
        Ok(match extraction_type {
            ExtractionType::Decision => {
                ExtractionContent::Decision(serde_json::from_value(raw).map_err(mismatch)?)
            }
            ExtractionType::Pattern => {
                ExtractionContent::Pattern(serde_json::from_value(raw).map_err(mismatch)?)
            }
            ExtractionType::Warning => {
                ExtractionContent::Warning(serde_json::from_value(raw).map_err(mismatch)?)
            }
            ExtractionType::Methodology => {
                ExtractionContent::Methodology(serde_json::from_value(raw).map_err(mismatch)?)
            }
            ExtractionType::Checklist => {
                ExtractionContent::Checklist(serde_json::from_value(raw).map_err(mismatch)?)
            }
            ExtractionType::Persona => {
                ExtractionContent::Persona(serde_json::from_value(raw).map_err(mismatch)?)
            }
            ExtractionType::Workflow => {
                ExtractionContent::Workflow(serde_json::from_value(raw).map_err(mismatch)?)
            }
        })
    }

    pub fn extraction_type(&self) -> ExtractionType {
        match self {
            ExtractionContent::Decision(_) => ExtractionType::Decision,
            ExtractionContent::Pattern(_) => ExtractionType::Pattern,
            ExtractionContent::Warning(_) => ExtractionType::Warning,
            ExtractionContent::Methodology(_) => ExtractionType::Methodology,
            ExtractionContent::Checklist(_) => ExtractionType::Checklist,
            ExtractionContent::Persona(_) => ExtractionType::Persona,
            ExtractionContent::Workflow(_) => ExtractionType::Workflow,
        }
    }

    /// The most semantically-rich fields, concatenated, for computing an
    /// embedding input string (spec §4.9 step 3).
    pub fn embedding_text(&self) -> String {
        match self {
            ExtractionContent::Decision(c) => {
                join_nonempty(&[&c.question, c.recommended_approach.as_deref().unwrap_or("")])
            }
            ExtractionContent::Pattern(c) => join_nonempty(&[&c.name, &c.problem, &c.solution]),
            ExtractionContent::Warning(c) => join_nonempty(&[&c.title, &c.description]),
            ExtractionContent::Methodology(c) => join_nonempty(&[&c.name]),
            ExtractionContent::Checklist(c) => join_nonempty(&[&c.name]),
            ExtractionContent::Persona(c) => join_nonempty(&[&c.role]),
            ExtractionContent::Workflow(c) => join_nonempty(&[&c.name]),
        }
    }

    /// A short human title, used as a search-result fallback when full
    /// content can't be fetched (spec §4.12 category listings).
    pub fn title(&self) -> &str {
        match self {
            ExtractionContent::Decision(c) => &c.question,
            ExtractionContent::Pattern(c) => &c.name,
            ExtractionContent::Warning(c) => &c.title,
            ExtractionContent::Methodology(c) => &c.name,
            ExtractionContent::Checklist(c) => &c.name,
            ExtractionContent::Persona(c) => &c.role,
            ExtractionContent::Workflow(c) => &c.name,
        }
    }
}

fn join_nonempty(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join(" ")
}

/// One structured record of a named category, traceable to its source and
/// contributing chunks (spec §3 "Extraction").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extraction {
    pub id: String,
    pub source_id: String,
    /// Primary chunk anchor.
    pub chunk_id: String,
    pub topics: Vec<String>,
    pub confidence: f64,
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub extracted_at: DateTime<Utc>,
    #[serde(default)]
    pub context_level: ContextLevel,
    #[serde(default)]
    pub context_id: String,
    #[serde(default)]
    pub chunk_ids: Vec<String>,
    pub content: ExtractionContent,
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

impl Extraction {
    pub fn extraction_type(&self) -> ExtractionType {
        self.content.extraction_type()
    }

    /// Validates the envelope invariants from spec §4.1: confidence in
    /// `[0, 1]`. Category-shape validity was already enforced by
    /// [`ExtractionContent::parse`].
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(ExtractionError::Validation(format!(
                "confidence {} out of range [0, 1]",
                self.confidence
            )));
        }
        Ok(())
    }

    /// The document-store dedup key (spec §3 invariant): `(chunk_id, type)`.
    pub fn dedup_key(&self) -> (String, ExtractionType) {
        (self.chunk_id.clone(), self.extraction_type())
    }
}

/// The outcome of one extractor invocation over one piece of content: either
/// a validated [`Extraction`] or a reason it failed (spec §4.7 step 2/3).
#[derive(Debug, Clone)]
pub enum ExtractionOutcome {
    Success(Extraction),
    Failure { error: String, code: ErrorCode },
}

impl ExtractionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExtractionOutcome::Success(_))
    }

    pub fn parse_error(reason: impl Into<String>) -> Self {
        ExtractionOutcome::Failure {
            error: format!("parse error: {}", reason.into()),
            code: ErrorCode::ExtractionParseError,
        }
    }

    pub fn gateway_failure(reason: impl std::fmt::Display) -> Self {
        ExtractionOutcome::Failure {
            error: format!("Extraction failed: {}", reason),
            code: ErrorCode::ApiError,
        }
    }

    pub fn validation_failure(reason: impl Into<String>) -> Self {
        ExtractionOutcome::Failure {
            error: reason.into(),
            code: ErrorCode::ValidationError,
        }
    }
}

/// Cap topics at five, preserving insertion order and de-duplicating (spec §4.7 step 4).
pub fn cap_topics(topics: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for topic in topics {
        if seen.insert(topic.clone()) {
            out.push(topic);
        }
        if out.len() == 5 {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_matching_shape() {
        let raw = json!({"question": "Should we cache?"});
        let content = ExtractionContent::parse(ExtractionType::Decision, raw).unwrap();
        assert_eq!(content.title(), "Should we cache?");
    }

    #[test]
    fn rejects_mismatched_shape() {
        let raw = json!({"title": "oops", "description": "wrong shape"});
        let err = ExtractionContent::parse(ExtractionType::Decision, raw).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[test]
    fn preserves_unknown_fields() {
        let raw = json!({"question": "Q?", "llm_extra_field": "kept"});
        let content = ExtractionContent::parse(ExtractionType::Decision, raw).unwrap();
        if let ExtractionContent::Decision(d) = content {
            assert_eq!(d.extra.get("llm_extra_field").unwrap(), "kept");
        } else {
            panic!("wrong variant");
        }
    }

    #[test]
    fn confidence_out_of_range_fails_validation() {
        let extraction = Extraction {
            id: "1".into(),
            source_id: "s".into(),
            chunk_id: "c".into(),
            topics: vec![],
            confidence: 1.5,
            schema_version: SCHEMA_VERSION.into(),
            extracted_at: Utc::now(),
            context_level: ContextLevel::Chunk,
            context_id: "c".into(),
            chunk_ids: vec!["c".into()],
            content: ExtractionContent::Decision(DecisionContent {
                question: "Q?".into(),
                options: None,
                considerations: None,
                recommended_approach: None,
                context: None,
                extra: Map::new(),
            }),
        };
        assert!(extraction.validate().is_err());
    }

    #[test]
    fn cap_topics_dedupes_and_caps_at_five() {
        let topics = vec!["rag", "rag", "llm", "agents", "evaluation", "deployment", "fine-tuning"]
            .into_iter()
            .map(String::from)
            .collect();
        let capped = cap_topics(topics);
        assert_eq!(capped.len(), 5);
        assert_eq!(capped[0], "rag");
    }

    #[test]
    fn dedup_key_is_chunk_and_type() {
        let extraction = Extraction {
            id: "1".into(),
            source_id: "s".into(),
            chunk_id: "c1".into(),
            topics: vec![],
            confidence: 0.9,
            schema_version: SCHEMA_VERSION.into(),
            extracted_at: Utc::now(),
            context_level: ContextLevel::Chunk,
            context_id: "c1".into(),
            chunk_ids: vec!["c1".into()],
            content: ExtractionContent::Warning(WarningContent {
                title: "t".into(),
                description: "d".into(),
                symptoms: None,
                consequences: None,
                prevention: None,
                extra: Map::new(),
            }),
        };
        assert_eq!(extraction.dedup_key(), ("c1".to_string(), ExtractionType::Warning));
    }
}
