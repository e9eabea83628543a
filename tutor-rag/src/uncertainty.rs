//! Mapping from confidence to the disclosure shown to the student.

use serde::{Deserialize, Serialize};

/// Shown when the textbooks barely cover the question.
pub const INSUFFICIENT_KNOWLEDGE_MESSAGE: &str = "I don't have enough information in your \
textbooks to answer this question confidently. Could you try rephrasing it, or ask about a \
different topic from your syllabus?";

/// Shown when an answer is possible but the evidence is weak.
pub const HEDGE_MESSAGE: &str = "I'm not completely sure about this answer. The information \
below may be incomplete, so please check it against your textbook or ask your teacher.";

/// How strongly uncertainty should be disclosed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UncertaintyLevel {
    /// Below the low threshold: refusal-style disclaimer.
    Insufficient,
    /// Between the thresholds: content shown with a hedge.
    Hedged,
    /// At or above the confidence threshold: no disclosure.
    Confident,
}

/// A pure function of confidence; not a state machine.
#[derive(Debug, Clone, Copy)]
pub struct UncertaintyPolicy {
    low_confidence_threshold: f32,
    confidence_threshold: f32,
}

impl UncertaintyPolicy {
    pub fn new(low_confidence_threshold: f32, confidence_threshold: f32) -> Self {
        Self { low_confidence_threshold, confidence_threshold }
    }

    pub fn level(&self, confidence: f32) -> UncertaintyLevel {
        if confidence < self.low_confidence_threshold {
            UncertaintyLevel::Insufficient
        } else if confidence < self.confidence_threshold {
            UncertaintyLevel::Hedged
        } else {
            UncertaintyLevel::Confident
        }
    }

    /// Whether a response with this confidence must be flagged as uncertain.
    ///
    /// Callers should rely on this flag rather than on whether
    /// [`disclose`](Self::disclose) returned an empty string.
    pub fn is_uncertain(&self, confidence: f32) -> bool {
        confidence < self.confidence_threshold
    }

    /// The disclosure message; empty when none is needed.
    pub fn disclose(&self, confidence: f32) -> String {
        match self.level(confidence) {
            UncertaintyLevel::Insufficient => INSUFFICIENT_KNOWLEDGE_MESSAGE.to_string(),
            UncertaintyLevel::Hedged => HEDGE_MESSAGE.to_string(),
            UncertaintyLevel::Confident => String::new(),
        }
    }
}

impl Default for UncertaintyPolicy {
    fn default() -> Self {
        Self::new(0.3, 0.6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_partition_confidence() {
        let policy = UncertaintyPolicy::default();
        assert_eq!(policy.level(0.0), UncertaintyLevel::Insufficient);
        assert_eq!(policy.level(0.29), UncertaintyLevel::Insufficient);
        assert_eq!(policy.level(0.3), UncertaintyLevel::Hedged);
        assert_eq!(policy.level(0.59), UncertaintyLevel::Hedged);
        assert_eq!(policy.level(0.6), UncertaintyLevel::Confident);
    }

    #[test]
    fn messages_follow_levels() {
        let policy = UncertaintyPolicy::default();
        assert_eq!(policy.disclose(0.1), INSUFFICIENT_KNOWLEDGE_MESSAGE);
        assert_eq!(policy.disclose(0.45), HEDGE_MESSAGE);
        assert!(policy.disclose(0.9).is_empty());
        assert!(policy.is_uncertain(0.45));
        assert!(!policy.is_uncertain(0.6));
    }
}
