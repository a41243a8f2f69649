use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::constants::{CANDIDATE_MULTIPLIER, MIN_CANDIDATE_POOL, PINNED_DOC_LIMIT};
use crate::embedding::EmbeddingProvider;
use crate::rag::filters::passes_filters;
use crate::rag::store::DocumentStore;
use crate::rag::types::{QueryFilters, RetrievableDocument, RetrievalResult, ScoredDocument};

/// Retrieval orchestration: free-text query in, ranked constraint-aware
/// document set out. Pure function of its inputs and current store
/// contents; holds no state between calls, so concurrent retrievals never
/// contend with each other.
pub struct Retriever {
    store: Arc<DocumentStore>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    pub fn new(store: Arc<DocumentStore>, embedding_provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            store,
            embedding_provider,
        }
    }

    /// Retrieve up to `top_k` documents for a query.
    ///
    /// Pipeline: fold filters into the embedded query text, over-fetch a
    /// candidate pool by vector distance, apply the fail-open hybrid
    /// filters, fall back to the unfiltered pool if the filters eliminate
    /// everything, rank, truncate, then pin the currently viewed job's
    /// documents in front.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        filters: &QueryFilters,
        current_job_id: Option<i64>,
        only_active: bool,
    ) -> Result<RetrievalResult> {
        anyhow::ensure!(top_k >= 1, "top_k must be >= 1, got {}", top_k);

        let query = query.trim();
        if query.is_empty() {
            return Ok(RetrievalResult::default());
        }

        let augmented = augment_query(query, filters);
        let query_embedding = self.embedding_provider.embed(&augmented).await?;

        let candidate_k = candidate_pool_size(top_k);
        let candidates = self
            .store
            .nearest(&query_embedding, candidate_k, only_active)
            .await?;

        tracing::info!(
            "retrieve: query={:?}, candidate_k={}, only_active={}, got {} candidates",
            query,
            candidate_k,
            only_active,
            candidates.len()
        );

        let (mut survivors, fell_back) = apply_filters(candidates, filters);
        if fell_back {
            tracing::info!(
                "retrieve: filters eliminated every candidate, using unfiltered pool"
            );
        }

        rank(&mut survivors);
        survivors.truncate(top_k);

        let documents = match current_job_id {
            Some(job_id) => {
                let pinned = self.store.fetch_by_job(job_id, PINNED_DOC_LIMIT).await?;
                merge_pinned(pinned, survivors)
            }
            None => survivors,
        };

        tracing::info!(
            "retrieve: returning {} documents (top_k={}, pinned_job={:?})",
            documents.len(),
            top_k,
            current_job_id
        );

        Ok(RetrievalResult { documents })
    }
}

/// Over-fetch factor: the hybrid filter pass may reject many nearest
/// neighbors, so fetching only `top_k` would starve it.
pub(crate) fn candidate_pool_size(top_k: usize) -> usize {
    (top_k * CANDIDATE_MULTIPLIER).max(MIN_CANDIDATE_POOL)
}

/// Fold non-empty filter fields into the embedded text. The embedding
/// model has no structured-filter awareness; appending a compact summary
/// nudges similarity toward filter-consistent documents before any hard
/// filtering runs.
pub(crate) fn augment_query(query: &str, filters: &QueryFilters) -> String {
    if filters.is_empty() {
        return query.to_string();
    }

    let mut parts = vec![query.to_string()];

    if !filters.job_keywords.is_empty() {
        parts.push(format!("keywords: {}", filters.job_keywords.join(", ")));
    }
    if !filters.locations.is_empty() {
        parts.push(format!("locations: {}", filters.locations.join(", ")));
    }
    if !filters.skills.is_empty() {
        parts.push(format!("skills: {}", filters.skills.join(", ")));
    }
    match (filters.min_salary, filters.max_salary) {
        (Some(min), Some(max)) => parts.push(format!("salary: {} to {}", min, max)),
        (Some(min), None) => parts.push(format!("salary: from {}", min)),
        (None, Some(max)) => parts.push(format!("salary: up to {}", max)),
        (None, None) => {}
    }

    parts.join(" | ")
}

/// Keep candidates passing every applicable filter; when that eliminates
/// all of them, return the unfiltered pool instead (an imperfectly
/// filtered result degrades the answer far less than an empty one).
/// The bool reports whether the fallback fired.
pub(crate) fn apply_filters(
    candidates: Vec<ScoredDocument>,
    filters: &QueryFilters,
) -> (Vec<ScoredDocument>, bool) {
    if filters.is_empty() {
        return (candidates, false);
    }

    let survivors: Vec<ScoredDocument> = candidates
        .iter()
        .filter(|candidate| passes_filters(&candidate.document, filters))
        .cloned()
        .collect();

    if survivors.is_empty() {
        (candidates, true)
    } else {
        (survivors, false)
    }
}

/// Sort by score descending; documents without a score sort last. The
/// sort is stable, so ties keep their input order.
pub(crate) fn rank(documents: &mut [ScoredDocument]) {
    documents.sort_by(|a, b| match (a.score, b.score) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(std::cmp::Ordering::Equal),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

/// Prepend the pinned job's documents to the ranked set, deduplicating by
/// doc id. A pinned document that also ranked keeps its similarity score.
pub(crate) fn merge_pinned(
    pinned: Vec<RetrievableDocument>,
    ranked: Vec<ScoredDocument>,
) -> Vec<ScoredDocument> {
    let ranked_scores: HashMap<String, Option<f32>> = ranked
        .iter()
        .map(|scored| (scored.document.doc_id.clone(), scored.score))
        .collect();

    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::with_capacity(pinned.len() + ranked.len());

    for document in pinned {
        if seen.insert(document.doc_id.clone()) {
            let score = ranked_scores.get(&document.doc_id).copied().flatten();
            merged.push(ScoredDocument { document, score });
        }
    }
    for scored in ranked {
        if seen.insert(scored.document.doc_id.clone()) {
            merged.push(scored);
        }
    }

    merged
}
