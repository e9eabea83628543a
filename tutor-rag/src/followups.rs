//! Suggested next questions derived from the curriculum labels of an answer.

use std::collections::HashSet;

use crate::document::Chunk;

/// Upper bound on suggestions in a single response.
pub const MAX_FOLLOW_UPS: usize = 5;

const GENERIC_SUGGESTIONS: [&str; 3] = [
    "Can you give me an example?",
    "How is this used in everyday life?",
    "Can you explain this in simpler words?",
];

/// Builds short follow-up prompts from the topics and chapters of the
/// chunks used for an answer.
#[derive(Debug, Clone, Copy)]
pub struct FollowUpBuilder {
    max_suggestions: usize,
}

impl FollowUpBuilder {
    /// `max_suggestions` is capped at [`MAX_FOLLOW_UPS`].
    pub fn new(max_suggestions: usize) -> Self {
        Self { max_suggestions: max_suggestions.min(MAX_FOLLOW_UPS) }
    }

    /// Topic prompts first, then chapter prompts, then generic ones when
    /// labels are scarce. Duplicates are dropped case-insensitively.
    pub fn build(&self, chunks: &[&Chunk]) -> Vec<String> {
        let topics = chunks.iter().filter_map(|chunk| chunk.topic());
        let chapters = chunks.iter().filter_map(|chunk| chunk.chapter());

        let candidates = topics
            .map(|topic| format!("Can you explain more about {topic}?"))
            .chain(chapters.map(|chapter| format!("What are the key ideas in {chapter}?")))
            .chain(GENERIC_SUGGESTIONS.iter().map(|s| s.to_string()));

        let mut seen = HashSet::new();
        candidates
            .filter(|suggestion| seen.insert(suggestion.to_lowercase()))
            .take(self.max_suggestions)
            .collect()
    }
}

impl Default for FollowUpBuilder {
    fn default() -> Self {
        Self::new(MAX_FOLLOW_UPS)
    }
}
