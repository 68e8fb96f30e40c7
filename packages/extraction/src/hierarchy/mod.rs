//! Hierarchy Builder (spec §4.4): groups a source's chunks by
//! `position.chapter` / `position.section` into the nested structure the
//! orchestrator walks level by level.
//!
//! Grounded on `examples/original_source/packages/pipeline/src/extractors/hierarchy.py`
//! (`build_hierarchy`, `_generate_id`). Chapters and sections are kept in
//! first-seen order rather than a `HashMap`'s arbitrary order, since the
//! orchestrator's per-source processing order should be deterministic run
//! to run.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::types::{ChapterNode, Chunk, Hierarchy, SectionNode};

/// Stable 24-hex-char id for a chapter or section, matching the
/// MongoDB-ObjectId-shaped ids used elsewhere (spec §4.4).
///
/// Sections hash `"{chapter_name}:{section_name}"` as their name component
/// so that identically-named sections in different chapters get distinct
/// ids.
pub fn generate_hierarchy_id(source_id: &str, context_type: &str, name: &str) -> String {
    let content = format!("{source_id}:{context_type}:{name}");
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..24].to_string()
}

/// Build the chapter/section hierarchy for one source's chunks.
pub fn build_hierarchy(chunks: Vec<Chunk>, source_id: &str) -> Hierarchy {
    let mut chapter_order: Vec<String> = Vec::new();
    let mut chapters: HashMap<String, ChapterNode> = HashMap::new();
    // (chapter_name -> section order within that chapter)
    let mut section_order: HashMap<String, Vec<String>> = HashMap::new();
    let mut uncategorized_chunks = Vec::new();

    for chunk in chunks {
        let chapter_name = chunk.position.chapter.clone();
        let section_name = chunk.position.section.clone();

        let Some(chapter_name) = chapter_name.filter(|n| !n.is_empty()) else {
            uncategorized_chunks.push(chunk);
            continue;
        };

        if !chapters.contains_key(&chapter_name) {
            let id = generate_hierarchy_id(source_id, "chapter", &chapter_name);
            chapters.insert(
                chapter_name.clone(),
                ChapterNode {
                    id,
                    name: chapter_name.clone(),
                    sections: Vec::new(),
                    direct_chunks: Vec::new(),
                },
            );
            chapter_order.push(chapter_name.clone());
            section_order.insert(chapter_name.clone(), Vec::new());
        }

        let Some(section_name) = section_name.filter(|n| !n.is_empty()) else {
            chapters.get_mut(&chapter_name).unwrap().direct_chunks.push(chunk);
            continue;
        };

        let chapter = chapters.get_mut(&chapter_name).unwrap();
        if !chapter.sections.iter().any(|s| s.name == section_name) {
            let id = generate_hierarchy_id(
                source_id,
                "section",
                &format!("{chapter_name}:{section_name}"),
            );
            chapter.sections.push(SectionNode {
                id,
                name: section_name.clone(),
                chapter_name: chapter_name.clone(),
                chunks: Vec::new(),
            });
            section_order.get_mut(&chapter_name).unwrap().push(section_name.clone());
        }
        chapter
            .sections
            .iter_mut()
            .find(|s| s.name == section_name)
            .unwrap()
            .chunks
            .push(chunk);
    }

    uncategorized_chunks.sort_by_key(|c| c.sort_key());

    let mut ordered_chapters = Vec::with_capacity(chapter_order.len());
    for chapter_name in chapter_order {
        let mut chapter = chapters.remove(&chapter_name).unwrap();
        chapter.direct_chunks.sort_by_key(|c| c.sort_key());
        for section in chapter.sections.iter_mut() {
            section.chunks.sort_by_key(|c| c.sort_key());
        }
        ordered_chapters.push(chapter);
    }

    Hierarchy {
        chapters: ordered_chapters,
        uncategorized_chunks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkPosition;

    fn chunk(id: &str, chapter: Option<&str>, section: Option<&str>, idx: u64) -> Chunk {
        Chunk {
            id: id.to_string(),
            source_id: "src1".into(),
            content: "x".repeat(20),
            token_count: 5,
            position: ChunkPosition {
                chapter: chapter.map(String::from),
                section: section.map(String::from),
                page: None,
                chunk_index: Some(idx),
            },
            schema_version: "1.1.0".into(),
        }
    }

    #[test]
    fn groups_by_chapter_and_section() {
        let chunks = vec![
            chunk("1", Some("Intro"), None, 0),
            chunk("2", Some("Intro"), Some("Background"), 1),
            chunk("3", Some("Intro"), Some("Background"), 2),
            chunk("4", None, None, 3),
        ];
        let hierarchy = build_hierarchy(chunks, "src1");

        assert_eq!(hierarchy.chapters.len(), 1);
        assert_eq!(hierarchy.uncategorized_chunks.len(), 1);

        let chapter = &hierarchy.chapters[0];
        assert_eq!(chapter.direct_chunks.len(), 1);
        assert_eq!(chapter.sections.len(), 1);
        assert_eq!(chapter.sections[0].chunks.len(), 2);
    }

    #[test]
    fn ids_are_deterministic_and_scoped_by_chapter() {
        let a = generate_hierarchy_id("src", "section", "Ch1:Setup");
        let b = generate_hierarchy_id("src", "section", "Ch2:Setup");
        assert_eq!(a.len(), 24);
        assert_ne!(a, b);
        assert_eq!(a, generate_hierarchy_id("src", "section", "Ch1:Setup"));
    }

    #[test]
    fn chunks_within_a_section_are_sorted_by_index() {
        let chunks = vec![
            chunk("1", Some("Intro"), Some("A"), 5),
            chunk("2", Some("Intro"), Some("A"), 1),
        ];
        let hierarchy = build_hierarchy(chunks, "src1");
        let section = &hierarchy.chapters[0].sections[0];
        assert_eq!(section.chunks[0].id, "2");
        assert_eq!(section.chunks[1].id, "1");
    }
}
