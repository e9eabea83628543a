//! Reduction of a chunk list to a single confidence score.

use crate::document::{Chunk, clamp_unit};

/// Weight of the mean similarity of the relevant set.
const SIMILARITY_WEIGHT: f32 = 0.7;
/// Weight of the evidence-count factor.
const EVIDENCE_WEIGHT: f32 = 0.3;
/// Number of corroborating chunks that counts as full evidence.
const FULL_EVIDENCE_CHUNKS: f32 = 3.0;

/// Scores how well a set of chunks supports an answer.
///
/// Only chunks at or above the similarity threshold count. The score blends
/// their mean similarity with a saturating evidence-count factor:
///
/// ```text
/// confidence = 0.7 * mean(similarity) + 0.3 * min(|relevant| / 3, 1)
/// ```
///
/// An empty relevant set scores exactly `0.0`.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceScorer {
    similarity_threshold: f32,
}

impl ConfidenceScorer {
    pub fn new(similarity_threshold: f32) -> Self {
        Self { similarity_threshold }
    }

    pub fn similarity_threshold(&self) -> f32 {
        self.similarity_threshold
    }

    /// Whether a chunk counts as relevant evidence.
    pub fn is_relevant(&self, chunk: &Chunk) -> bool {
        chunk.similarity() >= self.similarity_threshold
    }

    /// The chunks that count as relevant evidence, in their original order.
    pub fn relevant<'a>(&self, chunks: &'a [Chunk]) -> Vec<&'a Chunk> {
        chunks.iter().filter(|c| self.is_relevant(c)).collect()
    }

    /// Confidence in `[0, 1]`.
    pub fn score(&self, chunks: &[Chunk]) -> f32 {
        let relevant = self.relevant(chunks);
        if relevant.is_empty() {
            return 0.0;
        }

        let count = relevant.len() as f32;
        let avg_similarity = relevant.iter().map(|c| c.similarity()).sum::<f32>() / count;
        let chunk_factor = (count / FULL_EVIDENCE_CHUNKS).min(1.0);
        clamp_unit(SIMILARITY_WEIGHT * avg_similarity + EVIDENCE_WEIGHT * chunk_factor)
    }
}
