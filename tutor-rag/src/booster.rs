//! Curriculum-affinity re-ranking.
//!
//! [`CurriculumBooster`] adds a fixed bonus to a chunk's similarity for each
//! curriculum field its metadata shares with the student's position, then
//! re-sorts. Boosts are additive, so a chunk without curriculum metadata keeps
//! its raw similarity and is never pushed below it.

use std::cmp::Ordering;

use crate::config::BoostWeights;
use crate::curriculum::{CurriculumInfo, metadata_grade, metadata_syllabus, same_label};
use crate::document::Chunk;

/// Deterministic additive re-scorer keyed on curriculum agreement.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurriculumBooster {
    weights: BoostWeights,
}

impl CurriculumBooster {
    pub fn new(weights: BoostWeights) -> Self {
        Self { weights }
    }

    /// Total boost earned by `chunk` against `target`.
    ///
    /// Subject, chapter and topic compare case-insensitively and only count
    /// when `target` sets them.
    pub fn boost_for(&self, chunk: &Chunk, target: &CurriculumInfo) -> f32 {
        let metadata = chunk.metadata();
        let mut boost = 0.0f32;
        if metadata_grade(metadata) == Some(target.grade()) {
            boost += self.weights.grade;
        }
        if metadata_syllabus(metadata) == Some(target.syllabus()) {
            boost += self.weights.syllabus;
        }
        if label_matches(chunk.subject(), target.subject()) {
            boost += self.weights.subject;
        }
        if label_matches(chunk.chapter(), target.chapter()) {
            boost += self.weights.chapter;
        }
        if label_matches(chunk.topic(), target.topic()) {
            boost += self.weights.topic;
        }
        boost.max(0.0)
    }

    /// Re-score every chunk as `min(similarity + boost, 1.0)` and sort
    /// descending. The sort is stable, so equal scores keep retrieval order.
    pub fn boost(&self, chunks: &[Chunk], target: &CurriculumInfo) -> Vec<Chunk> {
        let mut boosted: Vec<Chunk> = chunks
            .iter()
            .map(|chunk| {
                let similarity = (chunk.similarity() + self.boost_for(chunk, target)).min(1.0);
                chunk.with_similarity(similarity)
            })
            .collect();
        boosted.sort_by(|a, b| {
            b.similarity().partial_cmp(&a.similarity()).unwrap_or(Ordering::Equal)
        });
        boosted
    }
}

fn label_matches(chunk_value: Option<&str>, target_value: Option<&str>) -> bool {
    matches!((chunk_value, target_value), (Some(c), Some(t)) if same_label(c, t))
}
