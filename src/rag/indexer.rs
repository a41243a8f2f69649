use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::embedding::EmbeddingProvider;
use crate::jobs::source::{JobSource, JobSummary};
use crate::jobs::types::JobRecord;
use crate::rag::chunker::split_text_into_chunks;
use crate::rag::store::DocumentStore;
use crate::rag::types::{DocType, DocumentMetadata, IndexMode, RetrievableDocument};

/// Maintains the invariant that the store's contents for a job exactly
/// reflect the job's current data: one overview document plus one document
/// per section chunk, replaced wholesale on every (re)index.
pub struct Indexer {
    source: Arc<dyn JobSource>,
    store: Arc<DocumentStore>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    chunk_max_chars: usize,
}

impl Indexer {
    pub fn new(
        source: Arc<dyn JobSource>,
        store: Arc<DocumentStore>,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        chunk_max_chars: usize,
    ) -> Self {
        Self {
            source,
            store,
            embedding_provider,
            chunk_max_chars,
        }
    }

    /// Index one job into its document set. Fails when the job does not
    /// exist; otherwise returns the number of documents written.
    pub async fn index_job(&self, job_id: i64) -> Result<usize> {
        let job = self
            .source
            .fetch_job(job_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("job {} does not exist", job_id))?;

        let documents = build_documents(&job, Utc::now(), self.chunk_max_chars);

        let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let embeddings = self.embedding_provider.embed_batch(texts).await?;

        self.store
            .replace_job_documents(job_id, &documents, &embeddings)
            .await?;

        tracing::info!("Indexed job {} ({} documents)", job_id, documents.len());
        Ok(documents.len())
    }

    /// Candidate job ids for the given mode, in id order
    pub async fn select_jobs_to_index(&self, mode: IndexMode) -> Result<Vec<i64>> {
        let summaries = self.source.list_jobs().await?;
        let snapshots = self.store.overview_snapshots().await?;
        Ok(select_candidates(&summaries, &snapshots, mode, Utc::now()))
    }

    /// Index every candidate job, isolating per-job failures: a failing
    /// job is logged and skipped, the batch always runs to completion.
    pub async fn index_all(&self, limit: Option<usize>, mode: IndexMode) -> Result<()> {
        let mut candidates = self.select_jobs_to_index(mode).await?;
        if let Some(limit) = limit {
            candidates.truncate(limit);
        }

        tracing::info!("Indexing {} jobs ({:?})", candidates.len(), mode);

        let mut indexed = 0usize;
        for job_id in candidates {
            match self.index_job(job_id).await {
                Ok(_) => indexed += 1,
                Err(e) => tracing::warn!("Failed to index job {}: {:#}", job_id, e),
            }
        }

        tracing::info!("Index run finished: {} jobs indexed", indexed);
        Ok(())
    }
}

/// Pick candidate jobs given the source listing and the store's overview
/// snapshots (job id -> is_active recorded at last index time).
pub(crate) fn select_candidates(
    summaries: &[JobSummary],
    snapshots: &HashMap<i64, bool>,
    mode: IndexMode,
    now: DateTime<Utc>,
) -> Vec<i64> {
    let mut candidates: Vec<i64> = summaries
        .iter()
        .filter(|summary| {
            let active = summary
                .expires_at
                .map(|expiry| expiry >= now)
                .unwrap_or(true);
            match mode {
                IndexMode::Incremental => active && !snapshots.contains_key(&summary.id),
                // Expired jobs whose snapshot still says active get one
                // more pass so the flag flips instead of going stale
                IndexMode::Full => {
                    active || snapshots.get(&summary.id).copied().unwrap_or(false)
                }
            }
        })
        .map(|summary| summary.id)
        .collect();

    candidates.sort_unstable();
    candidates
}

/// Build the denormalized snapshot shared by all of a job's documents
pub(crate) fn build_metadata(job: &JobRecord, now: DateTime<Utc>) -> DocumentMetadata {
    DocumentMetadata {
        job_id: job.id,
        title: job.title.clone(),
        url: job.url.clone(),
        salary: job.salary.clone(),
        locations: job.locations.clone(),
        experience: job.experience.clone(),
        company: job.company.clone(),
        general: job.general.clone(),
        sections: job.sections.clone(),
        deadline: job.expires_at,
        crawled_at: job.crawled_at,
        is_active: job.is_active_at(now),
    }
}

/// Build the full document set for one job: the overview document plus a
/// section document per chunk. Chunk contents prepend the job header so
/// every chunk stands on its own as retrieval context.
pub(crate) fn build_documents(
    job: &JobRecord,
    now: DateTime<Utc>,
    chunk_max_chars: usize,
) -> Vec<RetrievableDocument> {
    let metadata = build_metadata(job, now);
    let mut documents = Vec::new();

    documents.push(RetrievableDocument {
        doc_id: uuid::Uuid::new_v4().to_string(),
        job_id: job.id,
        doc_type: DocType::Overview,
        section_type: None,
        chunk_index: 0,
        content: overview_content(&metadata),
        metadata: metadata.clone(),
    });

    for section in &job.sections {
        let chunks = split_text_into_chunks(&section.text, chunk_max_chars);
        for (idx, chunk) in chunks.into_iter().enumerate() {
            let mut content = section_header(&metadata, &section.section_type);
            content.push_str("\nContent: ");
            content.push_str(&chunk);

            documents.push(RetrievableDocument {
                doc_id: uuid::Uuid::new_v4().to_string(),
                job_id: job.id,
                doc_type: DocType::Section,
                section_type: Some(section.section_type.clone()),
                chunk_index: idx as i32,
                content,
                metadata: metadata.clone(),
            });
        }
    }

    documents
}

/// Compact human-readable rendering of the job for the overview document.
/// Fields with no value are omitted entirely.
pub(crate) fn overview_content(meta: &DocumentMetadata) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push(format!("Title: {}", meta.title));

    if let Some(name) = meta.company.name.as_deref().filter(|n| !n.is_empty()) {
        lines.push(format!("Company: {}", name));
    }
    if !meta.locations.is_empty() {
        lines.push(format!("Location: {}", meta.locations.join(" | ")));
    }
    if let Some(salary_line) = meta.salary.format_line() {
        lines.push(salary_line);
    }
    if let Some(raw) = meta.experience.raw_text.as_deref() {
        lines.push(format!("Experience: {}", raw));
    } else if let Some(months) = meta.experience.months {
        lines.push(format!("Experience: {} months or more", months));
    }
    if let Some(seniority) = meta.general.seniority.as_deref() {
        lines.push(format!("Seniority: {}", seniority));
    }
    if let Some(education) = meta.general.education.as_deref() {
        lines.push(format!("Education: {}", education));
    }
    if let Some(headcount) = meta.general.headcount.as_deref() {
        lines.push(format!("Openings: {}", headcount));
    }
    if let Some(arrangement) = meta.general.work_arrangement.as_deref() {
        lines.push(format!("Work arrangement: {}", arrangement));
    }
    if let Some(deadline) = meta.deadline {
        lines.push(format!("Apply before: {}", deadline.format("%Y-%m-%d")));
    }

    lines.join("\n")
}

/// Job/company/salary header prepended to every section chunk
pub(crate) fn section_header(
    meta: &DocumentMetadata,
    section_type: &crate::jobs::types::SectionType,
) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push(format!("Job: {}", meta.title));
    if let Some(name) = meta.company.name.as_deref().filter(|n| !n.is_empty()) {
        lines.push(format!("Company: {}", name));
    }
    if !meta.locations.is_empty() {
        lines.push(format!("Location: {}", meta.locations.join(" | ")));
    }
    if let Some(salary_line) = meta.salary.format_line() {
        lines.push(salary_line);
    }
    lines.push(format!("Section: {}", section_type.label()));
    if let Some(deadline) = meta.deadline {
        lines.push(format!("Apply before: {}", deadline.format("%Y-%m-%d")));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::types::{
        Company, Experience, GeneralInfo, JobRecord, Salary, SalaryInterval, SectionContent,
        SectionType,
    };

    fn sample_job() -> JobRecord {
        JobRecord {
            id: 42,
            title: "Backend Engineer".to_string(),
            url: Some("https://jobs.example/42".to_string()),
            salary: Salary {
                min: Some(15_000_000),
                max: Some(20_000_000),
                currency: Some("VND".to_string()),
                interval: Some(SalaryInterval::Month),
                raw_text: None,
            },
            locations: vec!["Hà Nội".to_string()],
            sections: vec![
                SectionContent {
                    section_type: SectionType::Description,
                    text: "Build and operate backend services.".to_string(),
                },
                SectionContent {
                    section_type: SectionType::Requirements,
                    text: "Python, SQL. Three years of experience.".to_string(),
                },
            ],
            experience: Experience {
                months: Some(36),
                raw_text: None,
            },
            company: Company {
                name: Some("Acme Corp".to_string()),
                ..Default::default()
            },
            general: GeneralInfo::default(),
            expires_at: Some(Utc::now() + chrono::Duration::days(30)),
            crawled_at: None,
        }
    }

    #[test]
    fn test_exactly_one_overview_document() {
        let job = sample_job();
        let documents = build_documents(&job, Utc::now(), 800);

        let overviews = documents
            .iter()
            .filter(|d| d.doc_type == DocType::Overview)
            .count();
        assert_eq!(overviews, 1);
        assert!(documents.len() >= 3);
    }

    #[test]
    fn test_indexing_is_idempotent_on_unchanged_data() {
        let job = sample_job();
        let now = Utc::now();

        let first = build_documents(&job, now, 800);
        let second = build_documents(&job, now, 800);

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.content, b.content);
            assert_eq!(a.doc_type, b.doc_type);
            assert_eq!(a.section_type, b.section_type);
            assert_eq!(a.chunk_index, b.chunk_index);
            assert_eq!(a.metadata.is_active, b.metadata.is_active);
        }
    }

    #[test]
    fn test_overview_omits_missing_fields() {
        let mut job = sample_job();
        job.salary = Salary::default();
        job.company = Company::default();
        job.locations.clear();

        let documents = build_documents(&job, Utc::now(), 800);
        let overview = &documents[0].content;

        assert!(overview.contains("Title: Backend Engineer"));
        assert!(!overview.contains("Salary"));
        assert!(!overview.contains("Company"));
        assert!(!overview.contains("N/A"));
    }

    #[test]
    fn test_section_chunks_carry_job_header() {
        let job = sample_job();
        let documents = build_documents(&job, Utc::now(), 800);

        let requirements = documents
            .iter()
            .find(|d| d.section_type == Some(SectionType::Requirements))
            .unwrap();
        assert!(requirements.content.contains("Job: Backend Engineer"));
        assert!(requirements.content.contains("Company: Acme Corp"));
        assert!(requirements.content.contains("Section: Candidate requirements"));
        assert!(requirements.content.contains("Python, SQL."));
    }

    #[test]
    fn test_expired_job_is_flagged_inactive() {
        let mut job = sample_job();
        let now = Utc::now();
        job.expires_at = Some(now - chrono::Duration::days(1));

        let meta = build_metadata(&job, now);
        assert!(!meta.is_active);

        job.expires_at = None;
        let meta = build_metadata(&job, now);
        assert!(meta.is_active);
    }

    #[test]
    fn test_long_section_is_chunked_with_ordinal_indices() {
        let mut job = sample_job();
        job.sections = vec![SectionContent {
            section_type: SectionType::Description,
            text: "One short sentence. ".repeat(100),
        }];

        let documents = build_documents(&job, Utc::now(), 200);
        let chunks: Vec<_> = documents
            .iter()
            .filter(|d| d.doc_type == DocType::Section)
            .collect();

        assert!(chunks.len() > 1);
        for (idx, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, idx as i32);
        }
    }

    #[test]
    fn test_select_candidates_incremental() {
        let now = Utc::now();
        let summaries = vec![
            JobSummary {
                id: 1,
                expires_at: None,
            },
            JobSummary {
                id: 2,
                expires_at: Some(now + chrono::Duration::days(1)),
            },
            JobSummary {
                id: 3,
                expires_at: Some(now - chrono::Duration::days(1)),
            },
        ];
        let mut snapshots = HashMap::new();
        snapshots.insert(1i64, true);

        let candidates = select_candidates(&summaries, &snapshots, IndexMode::Incremental, now);
        // 1 already indexed, 3 expired
        assert_eq!(candidates, vec![2]);
    }

    #[test]
    fn test_select_candidates_full_reindexes_freshly_expired() {
        let now = Utc::now();
        let summaries = vec![
            JobSummary {
                id: 1,
                expires_at: Some(now + chrono::Duration::days(1)),
            },
            // expired, snapshot still says active: one more pass
            JobSummary {
                id: 2,
                expires_at: Some(now - chrono::Duration::days(1)),
            },
            // expired and already flipped: skipped
            JobSummary {
                id: 3,
                expires_at: Some(now - chrono::Duration::days(1)),
            },
            // expired and never indexed: skipped
            JobSummary {
                id: 4,
                expires_at: Some(now - chrono::Duration::days(1)),
            },
        ];
        let mut snapshots = HashMap::new();
        snapshots.insert(1i64, true);
        snapshots.insert(2i64, true);
        snapshots.insert(3i64, false);

        let candidates = select_candidates(&summaries, &snapshots, IndexMode::Full, now);
        assert_eq!(candidates, vec![1, 2]);
    }
}
