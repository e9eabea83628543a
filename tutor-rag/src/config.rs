//! Configuration for the tutoring engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::followups::MAX_FOLLOW_UPS;

/// Additive similarity boosts applied when chunk metadata agrees with the
/// student's curriculum.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BoostWeights {
    pub grade: f32,
    pub syllabus: f32,
    pub subject: f32,
    pub chapter: f32,
    pub topic: f32,
}

impl Default for BoostWeights {
    fn default() -> Self {
        Self { grade: 0.15, syllabus: 0.10, subject: 0.05, chapter: 0.05, topic: 0.05 }
    }
}

impl BoostWeights {
    fn validate(&self) -> Result<()> {
        let weights = [
            ("grade", self.grade),
            ("syllabus", self.syllabus),
            ("subject", self.subject),
            ("chapter", self.chapter),
            ("topic", self.topic),
        ];
        for (name, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(RagError::ConfigError(format!(
                    "boost weight for {name} must be a non-negative number, got {weight}"
                )));
            }
        }
        Ok(())
    }
}

/// Configuration parameters for the engine.
///
/// Deserializes with defaults for every missing field, so a partial JSON
/// document is a valid configuration. Use [`EngineConfig::validate`] (or the
/// builder) before handing a deserialized value to the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of chunks to return from retrieval.
    pub top_k: usize,
    /// Minimum similarity for a chunk to count as relevant evidence.
    pub similarity_threshold: f32,
    /// Confidence below which uncertainty is disclosed.
    pub confidence_threshold: f32,
    /// Confidence below which the strong disclaimer is used.
    pub low_confidence_threshold: f32,
    /// Curriculum boost table.
    pub boost: BoostWeights,
    /// When set, chunks that only came from the unfiltered fallback query are
    /// dropped if their raw similarity is below this floor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relaxed_similarity_floor: Option<f32>,
    /// Maximum characters of chunk text shown in a citation preview.
    pub preview_chars: usize,
    /// Maximum number of suggested follow-up questions.
    pub max_follow_ups: usize,
    /// Maximum characters of context sent to the language model.
    pub max_context_chars: usize,
    pub embedding_timeout_ms: u64,
    pub index_timeout_ms: u64,
    pub generation_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            similarity_threshold: 0.7,
            confidence_threshold: 0.6,
            low_confidence_threshold: 0.3,
            boost: BoostWeights::default(),
            relaxed_similarity_floor: None,
            preview_chars: 200,
            max_follow_ups: 5,
            max_context_chars: 8000,
            embedding_timeout_ms: 10_000,
            index_timeout_ms: 10_000,
            generation_timeout_ms: 60_000,
        }
    }
}

impl EngineConfig {
    /// Create a new builder for constructing an [`EngineConfig`].
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_millis(self.embedding_timeout_ms)
    }

    pub fn index_timeout(&self) -> Duration {
        Duration::from_millis(self.index_timeout_ms)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `top_k == 0`
    /// - a threshold or the relaxed floor lies outside `[0, 1]`
    /// - `confidence_threshold` is zero
    /// - `low_confidence_threshold > confidence_threshold`
    /// - a boost weight is negative
    /// - `preview_chars`, `max_context_chars` or any timeout is zero
    /// - `max_follow_ups` exceeds [`MAX_FOLLOW_UPS`]
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        unit_interval("similarity_threshold", self.similarity_threshold)?;
        unit_interval("confidence_threshold", self.confidence_threshold)?;
        unit_interval("low_confidence_threshold", self.low_confidence_threshold)?;
        if self.confidence_threshold == 0.0 {
            return Err(RagError::ConfigError(
                "confidence_threshold must be greater than zero".to_string(),
            ));
        }
        if let Some(floor) = self.relaxed_similarity_floor {
            unit_interval("relaxed_similarity_floor", floor)?;
        }
        if self.low_confidence_threshold > self.confidence_threshold {
            return Err(RagError::ConfigError(format!(
                "low_confidence_threshold ({}) must not exceed confidence_threshold ({})",
                self.low_confidence_threshold, self.confidence_threshold
            )));
        }
        self.boost.validate()?;
        if self.preview_chars == 0 || self.max_context_chars == 0 {
            return Err(RagError::ConfigError(
                "preview_chars and max_context_chars must be greater than zero".to_string(),
            ));
        }
        if self.max_follow_ups > MAX_FOLLOW_UPS {
            return Err(RagError::ConfigError(format!(
                "max_follow_ups must not exceed {MAX_FOLLOW_UPS}, got {}",
                self.max_follow_ups
            )));
        }
        for (name, ms) in [
            ("embedding_timeout_ms", self.embedding_timeout_ms),
            ("index_timeout_ms", self.index_timeout_ms),
            ("generation_timeout_ms", self.generation_timeout_ms),
        ] {
            if ms == 0 {
                return Err(RagError::ConfigError(format!("{name} must be greater than zero")));
            }
        }
        Ok(())
    }
}

fn unit_interval(name: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(RagError::ConfigError(format!("{name} must be within [0, 1], got {value}")))
    }
}

/// Builder for constructing a validated [`EngineConfig`].
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Set the number of chunks to return.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum similarity for relevant evidence.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = threshold;
        self
    }

    /// Set the confidence below which uncertainty is disclosed.
    pub fn confidence_threshold(mut self, threshold: f32) -> Self {
        self.config.confidence_threshold = threshold;
        self
    }

    /// Set the confidence below which the strong disclaimer is used.
    pub fn low_confidence_threshold(mut self, threshold: f32) -> Self {
        self.config.low_confidence_threshold = threshold;
        self
    }

    /// Replace the curriculum boost table.
    pub fn boost(mut self, weights: BoostWeights) -> Self {
        self.config.boost = weights;
        self
    }

    /// Require relaxed-fallback chunks to reach this raw similarity.
    pub fn relaxed_similarity_floor(mut self, floor: f32) -> Self {
        self.config.relaxed_similarity_floor = Some(floor);
        self
    }

    pub fn preview_chars(mut self, chars: usize) -> Self {
        self.config.preview_chars = chars;
        self
    }

    pub fn max_follow_ups(mut self, max: usize) -> Self {
        self.config.max_follow_ups = max;
        self
    }

    pub fn max_context_chars(mut self, chars: usize) -> Self {
        self.config.max_context_chars = chars;
        self
    }

    pub fn embedding_timeout(mut self, timeout: Duration) -> Self {
        self.config.embedding_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn index_timeout(mut self, timeout: Duration) -> Self {
        self.config.index_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn generation_timeout(mut self, timeout: Duration) -> Self {
        self.config.generation_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Build the [`EngineConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`EngineConfig::validate`].
    pub fn build(self) -> Result<EngineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
