//! Curriculum taxonomy: grade, syllabus, subject, chapter and topic.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{Metadata, fields, metadata_text, metadata_u64};
use crate::error::{RagError, Result};

/// Lowest supported grade.
pub const MIN_GRADE: u8 = 5;
/// Highest supported grade.
pub const MAX_GRADE: u8 = 10;

const GRADE_WEIGHT: f32 = 0.30;
const SYLLABUS_WEIGHT: f32 = 0.20;
const SUBJECT_WEIGHT: f32 = 0.20;
const CHAPTER_WEIGHT: f32 = 0.15;
const TOPIC_WEIGHT: f32 = 0.15;

/// The examination board a textbook follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Syllabus {
    Cbse,
    State,
}

impl Syllabus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Syllabus::Cbse => "cbse",
            Syllabus::State => "state",
        }
    }
}

impl fmt::Display for Syllabus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Syllabus {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cbse" => Ok(Syllabus::Cbse),
            "state" => Ok(Syllabus::State),
            other => Err(RagError::CurriculumError(format!("unknown syllabus '{other}'"))),
        }
    }
}

/// Validate that a grade lies in the supported range.
pub fn validate_grade(grade: u8) -> Result<u8> {
    if (MIN_GRADE..=MAX_GRADE).contains(&grade) {
        Ok(grade)
    } else {
        Err(RagError::CurriculumError(format!(
            "grade {grade} is outside the supported range {MIN_GRADE}..={MAX_GRADE}"
        )))
    }
}

/// A position in the curriculum taxonomy.
///
/// Describes either a student (used as a retrieval filter and boost target)
/// or a chunk (read back from index metadata).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurriculumInfo {
    #[serde(deserialize_with = "deserialize_grade")]
    grade: u8,
    syllabus: Syllabus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    chapter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    topic: Option<String>,
}

impl CurriculumInfo {
    /// Create a curriculum position.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::CurriculumError`] if `grade` is outside `5..=10`.
    pub fn new(grade: u8, syllabus: Syllabus) -> Result<Self> {
        Ok(Self {
            grade: validate_grade(grade)?,
            syllabus,
            subject: None,
            chapter: None,
            topic: None,
        })
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = non_blank(subject.into());
        self
    }

    pub fn with_chapter(mut self, chapter: impl Into<String>) -> Self {
        self.chapter = non_blank(chapter.into());
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = non_blank(topic.into());
        self
    }

    pub fn grade(&self) -> u8 {
        self.grade
    }

    pub fn syllabus(&self) -> Syllabus {
        self.syllabus
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn chapter(&self) -> Option<&str> {
        self.chapter.as_deref()
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// Exact match on all five fields. Text fields ignore case.
    pub fn matches(&self, other: &CurriculumInfo) -> bool {
        self.grade == other.grade
            && self.syllabus == other.syllabus
            && same_optional(self.subject(), other.subject())
            && same_optional(self.chapter(), other.chapter())
            && same_optional(self.topic(), other.topic())
    }

    /// Weighted overlap in `[0, 1]`.
    ///
    /// Grade and syllabus carry 0.30 and 0.20. Subject (0.20), chapter (0.15)
    /// and topic (0.15) only count when both sides set them to the same value.
    pub fn matches_partial(&self, other: &CurriculumInfo) -> f32 {
        let mut score = 0.0f32;
        if self.grade == other.grade {
            score += GRADE_WEIGHT;
        }
        if self.syllabus == other.syllabus {
            score += SYLLABUS_WEIGHT;
        }
        if both_equal(self.subject(), other.subject()) {
            score += SUBJECT_WEIGHT;
        }
        if both_equal(self.chapter(), other.chapter()) {
            score += CHAPTER_WEIGHT;
        }
        if both_equal(self.topic(), other.topic()) {
            score += TOPIC_WEIGHT;
        }
        f32::min(score, 1.0)
    }

    /// Read a curriculum position back from chunk metadata.
    ///
    /// Returns `None` when grade or syllabus is missing or invalid.
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        let grade = metadata_grade(metadata)?;
        let syllabus = metadata_syllabus(metadata)?;
        let mut info = Self::new(grade, syllabus).ok()?;
        info.subject = metadata_text(metadata, fields::SUBJECT).map(str::to_string);
        info.chapter = metadata_text(metadata, fields::CHAPTER).map(str::to_string);
        info.topic = metadata_text(metadata, fields::TOPIC).map(str::to_string);
        Some(info)
    }

    /// Write this position into metadata using the well-known keys.
    pub fn write_metadata(&self, metadata: &mut Metadata) {
        metadata.insert(fields::GRADE.to_string(), Value::from(self.grade));
        metadata.insert(fields::SYLLABUS.to_string(), Value::from(self.syllabus.as_str()));
        for (key, value) in [
            (fields::SUBJECT, &self.subject),
            (fields::CHAPTER, &self.chapter),
            (fields::TOPIC, &self.topic),
        ] {
            if let Some(value) = value {
                metadata.insert(key.to_string(), Value::String(value.clone()));
            }
        }
    }
}

fn deserialize_grade<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let grade = u8::deserialize(deserializer)?;
    validate_grade(grade).map_err(serde::de::Error::custom)
}

/// Read a grade from metadata, ignoring values outside the supported range.
pub fn metadata_grade(metadata: &Metadata) -> Option<u8> {
    metadata_u64(metadata, fields::GRADE)
        .and_then(|g| u8::try_from(g).ok())
        .and_then(|g| validate_grade(g).ok())
}

/// Read a syllabus from metadata, case-insensitively.
pub fn metadata_syllabus(metadata: &Metadata) -> Option<Syllabus> {
    metadata_text(metadata, fields::SYLLABUS).and_then(|s| s.parse().ok())
}

/// Case-insensitive equality for curriculum labels.
pub(crate) fn same_label(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn same_optional(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => same_label(a, b),
        _ => false,
    }
}

fn both_equal(a: Option<&str>, b: Option<&str>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if same_label(a, b))
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
