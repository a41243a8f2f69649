// Copyright 2026 Muvon Un Limited
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::Path;

use super::types::JobRecord;

/// Minimal view of a job used to pick indexing candidates
#[derive(Debug, Clone)]
pub struct JobSummary {
    pub id: i64,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Boundary to the crawler side: whatever holds the raw job records.
/// The indexer only reads through this trait and never writes back.
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Fetch one full job record; None when the id is unknown
    async fn fetch_job(&self, job_id: i64) -> Result<Option<JobRecord>>;

    /// List all known jobs with their expiry timestamps
    async fn list_jobs(&self) -> Result<Vec<JobSummary>>;
}

/// Job source backed by the crawler's exported JSON feed
/// (a single JSON array of job records).
pub struct JsonJobSource {
    jobs: BTreeMap<i64, JobRecord>,
}

impl JsonJobSource {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read job feed {}", path.display()))?;
        let records: Vec<JobRecord> = serde_json::from_str(&content)
            .with_context(|| format!("invalid job feed {}", path.display()))?;
        Ok(Self::from_records(records))
    }

    pub fn from_records(records: Vec<JobRecord>) -> Self {
        let jobs = records.into_iter().map(|job| (job.id, job)).collect();
        Self { jobs }
    }
}

#[async_trait]
impl JobSource for JsonJobSource {
    async fn fetch_job(&self, job_id: i64) -> Result<Option<JobRecord>> {
        Ok(self.jobs.get(&job_id).cloned())
    }

    async fn list_jobs(&self) -> Result<Vec<JobSummary>> {
        Ok(self
            .jobs
            .values()
            .map(|job| JobSummary {
                id: job.id,
                expires_at: job.expires_at,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_json_source_fetch_and_list() {
        let records: Vec<JobRecord> = serde_json::from_str(
            r#"[
                {"id": 1, "title": "Backend Engineer"},
                {"id": 2, "title": "Accountant", "locations": ["Hà Nội"]}
            ]"#,
        )
        .unwrap();
        let source = JsonJobSource::from_records(records);

        let job = source.fetch_job(2).await.unwrap().unwrap();
        assert_eq!(job.title, "Accountant");
        assert_eq!(job.locations, vec!["Hà Nội".to_string()]);

        assert!(source.fetch_job(99).await.unwrap().is_none());

        let summaries = source.list_jobs().await.unwrap();
        assert_eq!(summaries.len(), 2);
    }
}
