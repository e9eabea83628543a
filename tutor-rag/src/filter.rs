//! Typed metadata filters for vector index queries.
//!
//! A [`CurriculumFilter`] names the curriculum fields a caller wants to pin.
//! It compiles into a [`MetadataFilter`], a conjunction of
//! [`FilterCondition`]s that each backend translates into its own query
//! language. Only AND semantics are exposed.
//!
//! # Example
//!
//! ```rust,ignore
//! use tutor_rag::{CurriculumFilter, Syllabus};
//!
//! let filter = CurriculumFilter::new().grade(8).syllabus(Syllabus::Cbse).compile();
//! let hits = index.query(&embedding, 5, filter.as_ref()).await?;
//! ```

use serde::{Deserialize, Serialize};

use crate::curriculum::{CurriculumInfo, Syllabus, metadata_grade, metadata_syllabus};
use crate::document::{Metadata, fields, metadata_text};

/// A single `field = value` condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "lowercase")]
pub enum FilterCondition {
    Grade(u8),
    Syllabus(Syllabus),
    Subject(String),
    Chapter(String),
    Topic(String),
}

impl FilterCondition {
    /// The metadata key this condition constrains.
    pub fn field(&self) -> &'static str {
        match self {
            FilterCondition::Grade(_) => fields::GRADE,
            FilterCondition::Syllabus(_) => fields::SYLLABUS,
            FilterCondition::Subject(_) => fields::SUBJECT,
            FilterCondition::Chapter(_) => fields::CHAPTER,
            FilterCondition::Topic(_) => fields::TOPIC,
        }
    }

    /// Evaluate the condition against stored metadata.
    ///
    /// Grade accepts numeric strings and syllabus ignores case, mirroring how
    /// the values are read elsewhere. Text fields compare exactly.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self {
            FilterCondition::Grade(grade) => metadata_grade(metadata) == Some(*grade),
            FilterCondition::Syllabus(syllabus) => metadata_syllabus(metadata) == Some(*syllabus),
            FilterCondition::Subject(s)
            | FilterCondition::Chapter(s)
            | FilterCondition::Topic(s) => {
                metadata_text(metadata, self.field()) == Some(s.as_str())
            }
        }
    }
}

/// A conjunction of [`FilterCondition`]s. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFilter {
    conditions: Vec<FilterCondition>,
}

impl MetadataFilter {
    /// Build a filter from conditions, returning `None` when there are none.
    pub fn all(conditions: Vec<FilterCondition>) -> Option<Self> {
        (!conditions.is_empty()).then_some(Self { conditions })
    }

    pub fn conditions(&self) -> &[FilterCondition] {
        &self.conditions
    }

    /// Whether every condition holds for `metadata`.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.conditions.iter().all(|c| c.matches(metadata))
    }
}

/// Builder for the curriculum fields a retrieval should be restricted to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurriculumFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syllabus: Option<Syllabus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl CurriculumFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grade(mut self, grade: u8) -> Self {
        self.grade = Some(grade);
        self
    }

    pub fn syllabus(mut self, syllabus: Syllabus) -> Self {
        self.syllabus = Some(syllabus);
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn chapter(mut self, chapter: impl Into<String>) -> Self {
        self.chapter = Some(chapter.into());
        self
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions().is_empty()
    }

    /// The conditions for every field that is set, in a fixed field order.
    pub fn conditions(&self) -> Vec<FilterCondition> {
        let mut conditions = Vec::new();
        if let Some(grade) = self.grade {
            conditions.push(FilterCondition::Grade(grade));
        }
        if let Some(syllabus) = self.syllabus {
            conditions.push(FilterCondition::Syllabus(syllabus));
        }
        if let Some(subject) = label(&self.subject) {
            conditions.push(FilterCondition::Subject(subject));
        }
        if let Some(chapter) = label(&self.chapter) {
            conditions.push(FilterCondition::Chapter(chapter));
        }
        if let Some(topic) = label(&self.topic) {
            conditions.push(FilterCondition::Topic(topic));
        }
        conditions
    }

    /// Compile into a [`MetadataFilter`], or `None` when no field is set.
    pub fn compile(&self) -> Option<MetadataFilter> {
        MetadataFilter::all(self.conditions())
    }
}

fn label(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

impl From<&CurriculumInfo> for CurriculumFilter {
    fn from(info: &CurriculumInfo) -> Self {
        Self {
            grade: Some(info.grade()),
            syllabus: Some(info.syllabus()),
            subject: info.subject().map(str::to_string),
            chapter: info.chapter().map(str::to_string),
            topic: info.topic().map(str::to_string),
        }
    }
}
