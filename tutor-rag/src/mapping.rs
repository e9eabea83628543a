//! Best-effort classification of a question into the curriculum.
//!
//! The [`CurriculumMapper`] looks at the relevant chunks retrieved for a
//! question and tallies the chapter, topic and subject labels they carry.
//! Each label is ranked by `occurrences * max_similarity`, so frequency and
//! peak match quality both count.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::Chunk;

const MAX_CHAPTERS: usize = 5;
const MAX_TOPICS: usize = 5;
const MAX_SUBJECTS: usize = 3;

/// A curriculum label with its relevance to the question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedLabel {
    pub name: String,
    /// `occurrences * max_similarity`.
    pub relevance: f32,
    pub occurrences: usize,
}

/// Result of mapping a question onto the curriculum.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CurriculumMapping {
    /// True iff at least one chapter or topic was found.
    pub mapped: bool,
    pub chapters: Vec<RankedLabel>,
    pub topics: Vec<RankedLabel>,
    pub subjects: Vec<RankedLabel>,
    pub primary_chapter: Option<String>,
    pub primary_topic: Option<String>,
    pub primary_subject: Option<String>,
}

/// Aggregates chunk metadata into ranked chapter/topic/subject guesses.
#[derive(Debug, Clone, Copy)]
pub struct CurriculumMapper {
    similarity_threshold: f32,
}

impl CurriculumMapper {
    pub fn new(similarity_threshold: f32) -> Self {
        Self { similarity_threshold }
    }

    pub fn map(&self, question: &str, chunks: &[Chunk]) -> CurriculumMapping {
        let mut chapters = Tally::default();
        let mut topics = Tally::default();
        let mut subjects = Tally::default();

        for chunk in chunks.iter().filter(|c| c.similarity() >= self.similarity_threshold) {
            let similarity = chunk.similarity();
            if let Some(chapter) = chunk.chapter() {
                chapters.record(chapter, similarity);
            }
            if let Some(topic) = chunk.topic() {
                topics.record(topic, similarity);
            }
            if let Some(subject) = chunk.subject() {
                subjects.record(subject, similarity);
            }
        }

        let chapters = chapters.ranked(MAX_CHAPTERS);
        let topics = topics.ranked(MAX_TOPICS);
        let subjects = subjects.ranked(MAX_SUBJECTS);
        let mapped = !chapters.is_empty() || !topics.is_empty();

        debug!(
            question_len = question.len(),
            chapters = chapters.len(),
            topics = topics.len(),
            subjects = subjects.len(),
            mapped,
            "mapped question to curriculum"
        );

        CurriculumMapping {
            mapped,
            primary_chapter: chapters.first().map(|l| l.name.clone()),
            primary_topic: topics.first().map(|l| l.name.clone()),
            primary_subject: subjects.first().map(|l| l.name.clone()),
            chapters,
            topics,
            subjects,
        }
    }
}

/// Per-label counts, kept in first-seen order.
#[derive(Default)]
struct Tally {
    entries: Vec<(String, usize, f32)>,
}

impl Tally {
    fn record(&mut self, label: &str, similarity: f32) {
        match self.entries.iter_mut().find(|(name, _, _)| name == label) {
            Some((_, count, max)) => {
                *count += 1;
                *max = f32::max(*max, similarity);
            }
            None => self.entries.push((label.to_string(), 1, similarity)),
        }
    }

    /// Highest relevance first; ties keep first-seen order.
    fn ranked(self, limit: usize) -> Vec<RankedLabel> {
        let mut labels: Vec<RankedLabel> = self
            .entries
            .into_iter()
            .map(|(name, occurrences, max)| RankedLabel {
                name,
                relevance: occurrences as f32 * max,
                occurrences,
            })
            .collect();
        labels.sort_by(|a, b| b.relevance.partial_cmp(&a.relevance).unwrap_or(Ordering::Equal));
        labels.truncate(limit);
        labels
    }
}
