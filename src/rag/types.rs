use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::jobs::types::{Company, Experience, GeneralInfo, Salary, SectionContent, SectionType};

/// Kind of retrievable document derived from one job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    /// The single per-job summary document
    Overview,
    /// One chunk of one descriptive section
    Section,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Overview => "overview",
            DocType::Section => "section",
        }
    }
}

impl std::str::FromStr for DocType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "overview" => Ok(DocType::Overview),
            "section" => Ok(DocType::Section),
            other => Err(anyhow::anyhow!("unknown doc_type: {}", other)),
        }
    }
}

/// Denormalized snapshot of a job taken at index time. Every document of a
/// job carries the same snapshot so each chunk is independently usable as
/// generation context and as a filtering target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub job_id: i64,
    pub title: String,
    pub url: Option<String>,
    pub salary: Salary,
    pub locations: Vec<String>,
    pub experience: Experience,
    pub company: Company,
    pub general: GeneralInfo,
    /// Full section texts, kept so skill filters can look beyond the
    /// chunk that happened to match
    pub sections: Vec<SectionContent>,
    pub deadline: Option<DateTime<Utc>>,
    pub crawled_at: Option<DateTime<Utc>>,
    /// Computed from deadline vs. index time; flipped to false by the
    /// re-index pass that runs after a job expires
    pub is_active: bool,
}

impl DocumentMetadata {
    pub fn section_text(&self, section_type: &SectionType) -> Option<&str> {
        self.sections
            .iter()
            .find(|section| &section.section_type == section_type)
            .map(|section| section.text.as_str())
    }
}

/// The unit indexed and retrieved. For a given job there is exactly one
/// overview document and zero or more section documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievableDocument {
    pub doc_id: String,
    pub job_id: i64,
    pub doc_type: DocType,
    pub section_type: Option<SectionType>,
    pub chunk_index: i32,
    /// The exact text that was embedded
    pub content: String,
    pub metadata: DocumentMetadata,
}

/// What the user is trying to do, as classified from the question
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    SearchJobs,
    AskDetail,
    CompareJobs,
    #[default]
    Other,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::SearchJobs => "search_jobs",
            Intent::AskDetail => "ask_detail",
            Intent::CompareJobs => "compare_jobs",
            Intent::Other => "other",
        }
    }
}

/// Structured extraction from a user question. All fields default to
/// empty; an absent filter never excludes a document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryFilters {
    pub intent: Intent,
    pub job_keywords: Vec<String>,
    pub locations: Vec<String>,
    pub min_salary: Option<i64>,
    pub max_salary: Option<i64>,
    pub skills: Vec<String>,
}

impl QueryFilters {
    pub fn is_empty(&self) -> bool {
        self.job_keywords.is_empty()
            && self.locations.is_empty()
            && self.min_salary.is_none()
            && self.max_salary.is_none()
            && self.skills.is_empty()
    }
}

/// One retrieved document with its similarity score. Pinned documents are
/// fetched by job id rather than by similarity and carry no score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub document: RetrievableDocument,
    pub score: Option<f32>,
}

/// Ranked result of one retrieval call; constructed fresh per query and
/// never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub documents: Vec<ScoredDocument>,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }
}

/// Indexing candidate selection policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    /// Active jobs that have no overview document yet
    Incremental,
    /// Active jobs, plus expired jobs whose last snapshot still says
    /// active (one more pass to flip the flag)
    Full,
}

/// Statistics about the document index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_jobs: usize,
    pub total_documents: usize,
    pub active_documents: usize,
    pub oldest_indexed: Option<DateTime<Utc>>,
    pub newest_indexed: Option<DateTime<Utc>>,
}
