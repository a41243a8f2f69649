use anyhow::{Context, Result};
use arrow_array::{
    Array, BooleanArray, FixedSizeListArray, Float32Array, Int32Array, Int64Array, RecordBatch,
    StringArray, TimestampMillisecondArray,
};
use arrow_schema::{DataType, Field, Schema, TimeUnit};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use lancedb::{
    connect,
    index::Index,
    query::{ExecutableQuery, QueryBase},
    Connection, DistanceType,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::rag::types::{DocType, IndexStats, RetrievableDocument, ScoredDocument};

const TABLE_NAME: &str = "job_documents";

/// LanceDB-backed store for retrievable job documents.
///
/// The store is the only writer-facing surface the indexer needs (atomic
/// per-job replace, delete) and the only reader-facing surface the
/// retriever needs (vector kNN with predicate filters, fetch by job).
pub struct DocumentStore {
    db: Connection,
    vector_dim: usize,
}

impl DocumentStore {
    pub async fn new(db_path: &str, vector_dim: usize) -> Result<Self> {
        let db = connect(db_path).execute().await?;

        let store = Self { db, vector_dim };
        store.initialize_table().await?;
        store.verify_dimension().await?;
        store.ensure_optimal_index().await?;

        Ok(store)
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("doc_id", DataType::Utf8, false),
            Field::new("job_id", DataType::Int64, false),
            Field::new("doc_type", DataType::Utf8, false),
            Field::new("section_type", DataType::Utf8, true),
            Field::new("chunk_index", DataType::Int32, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("metadata", DataType::Utf8, false),
            Field::new("is_active", DataType::Boolean, false),
            Field::new("batch_id", DataType::Utf8, false),
            Field::new(
                "indexed_at",
                DataType::Timestamp(TimeUnit::Millisecond, None),
                false,
            ),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.vector_dim as i32,
                ),
                false,
            ),
        ]))
    }

    async fn initialize_table(&self) -> Result<()> {
        let table_names = self.db.table_names().execute().await?;

        if !table_names.contains(&TABLE_NAME.to_string()) {
            self.db
                .create_empty_table(TABLE_NAME, self.schema())
                .execute()
                .await?;
        }

        Ok(())
    }

    /// The index dimension is fixed at table creation; opening it with a
    /// provider of a different dimensionality is a configuration error,
    /// not something to paper over.
    async fn verify_dimension(&self) -> Result<()> {
        let table = self.db.open_table(TABLE_NAME).execute().await?;
        let schema = table.schema().await?;
        let field = schema.field_with_name("embedding")?;

        if let DataType::FixedSizeList(_, size) = field.data_type() {
            let stored_dim = *size as usize;
            if stored_dim != self.vector_dim {
                anyhow::bail!(
                    "embedding dimension mismatch: index has {}, provider produces {} \
                     (the index was built with a different embedding model)",
                    stored_dim,
                    self.vector_dim
                );
            }
        }

        Ok(())
    }

    /// Ensure vector index exists once the table is large enough
    async fn ensure_optimal_index(&self) -> Result<()> {
        let table = self.db.open_table(TABLE_NAME).execute().await?;

        let row_count = table.count_rows(None).await?;
        let has_index = table
            .list_indices()
            .await?
            .iter()
            .any(|idx| idx.columns == vec!["embedding"]);

        if has_index {
            return Ok(());
        }

        let index_params =
            crate::vector_optimizer::VectorOptimizer::calculate_index_params(row_count, self.vector_dim);

        if index_params.should_create_index {
            tracing::info!(
                "Creating vector index for {}: {} rows, {} partitions, {} sub-vectors",
                TABLE_NAME,
                row_count,
                index_params.num_partitions,
                index_params.num_sub_vectors
            );

            table
                .create_index(
                    &["embedding"],
                    Index::IvfPq(
                        lancedb::index::vector::IvfPqIndexBuilder::default()
                            .distance_type(index_params.distance_type)
                            .num_partitions(index_params.num_partitions)
                            .num_sub_vectors(index_params.num_sub_vectors)
                            .num_bits(index_params.num_bits as u32),
                    ),
                )
                .execute()
                .await?;
        } else {
            tracing::debug!(
                "Skipping index creation for {} with {} rows - brute force will be faster",
                TABLE_NAME,
                row_count
            );
        }

        Ok(())
    }

    /// Replace all documents of one job.
    ///
    /// New rows are written under a fresh batch id first and stale batches
    /// are deleted afterwards, so a concurrent reader sees either the old
    /// set or the new set (briefly possibly both), never the job with its
    /// documents gone.
    pub async fn replace_job_documents(
        &self,
        job_id: i64,
        documents: &[RetrievableDocument],
        embeddings: &[Vec<f32>],
    ) -> Result<()> {
        anyhow::ensure!(
            documents.len() == embeddings.len(),
            "got {} embeddings for {} documents",
            embeddings.len(),
            documents.len()
        );

        if documents.is_empty() {
            return self.delete_by_job(job_id).await;
        }

        let batch_id = uuid::Uuid::new_v4().to_string();
        let now_millis = Utc::now().timestamp_millis();

        let doc_ids: Vec<&str> = documents.iter().map(|d| d.doc_id.as_str()).collect();
        let job_ids: Vec<i64> = documents.iter().map(|d| d.job_id).collect();
        let doc_types: Vec<&str> = documents.iter().map(|d| d.doc_type.as_str()).collect();
        let section_types: Vec<Option<String>> = documents
            .iter()
            .map(|d| d.section_type.as_ref().map(|s| s.as_key().to_string()))
            .collect();
        let chunk_indices: Vec<i32> = documents.iter().map(|d| d.chunk_index).collect();
        let contents: Vec<&str> = documents.iter().map(|d| d.content.as_str()).collect();
        let metadata_json: Vec<String> = documents
            .iter()
            .map(|d| serde_json::to_string(&d.metadata))
            .collect::<Result<_, _>>()?;
        let actives: Vec<bool> = documents.iter().map(|d| d.metadata.is_active).collect();
        let batch_ids: Vec<&str> = documents.iter().map(|_| batch_id.as_str()).collect();
        let indexed_ats: Vec<i64> = documents.iter().map(|_| now_millis).collect();

        let embedding_values: Vec<f32> = embeddings.iter().flat_map(|e| e.iter().copied()).collect();
        let embedding_array = FixedSizeListArray::try_new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            self.vector_dim as i32,
            Arc::new(Float32Array::from(embedding_values)),
            None,
        )?;

        let schema = self.schema();
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(doc_ids)),
                Arc::new(Int64Array::from(job_ids)),
                Arc::new(StringArray::from(doc_types)),
                Arc::new(StringArray::from(section_types)),
                Arc::new(Int32Array::from(chunk_indices)),
                Arc::new(StringArray::from(contents)),
                Arc::new(StringArray::from(metadata_json)),
                Arc::new(BooleanArray::from(actives)),
                Arc::new(StringArray::from(batch_ids)),
                Arc::new(TimestampMillisecondArray::from(indexed_ats)),
                Arc::new(embedding_array),
            ],
        )?;

        let table = self.db.open_table(TABLE_NAME).execute().await?;

        use arrow::record_batch::RecordBatchIterator;
        use std::iter::once;
        let batches = once(Ok(batch.clone()));
        let batch_reader = RecordBatchIterator::new(batches, batch.schema());
        table.add(batch_reader).execute().await?;

        // Drop every older batch of this job now that the new one is visible
        table
            .delete(&format!(
                "job_id = {} AND batch_id != '{}'",
                job_id, batch_id
            ))
            .await?;

        Ok(())
    }

    pub async fn delete_by_job(&self, job_id: i64) -> Result<()> {
        let table = self.db.open_table(TABLE_NAME).execute().await?;
        table.delete(&format!("job_id = {}", job_id)).await?;
        Ok(())
    }

    /// Nearest-neighbor search by cosine distance, optionally restricted
    /// to documents whose job was active at index time.
    pub async fn nearest(
        &self,
        query_embedding: &[f32],
        k: usize,
        only_active: bool,
    ) -> Result<Vec<ScoredDocument>> {
        let table = self.db.open_table(TABLE_NAME).execute().await?;

        let mut query = table
            .vector_search(query_embedding)?
            .distance_type(DistanceType::Cosine)
            .limit(k);

        if only_active {
            query = query.only_if("is_active = true");
        }

        let mut results = query.execute().await?;
        let mut scored = Vec::new();

        while let Some(batch) = results.try_next().await? {
            if batch.num_rows() == 0 {
                continue;
            }

            let distances = batch
                .column_by_name("_distance")
                .and_then(|col| col.as_any().downcast_ref::<Float32Array>())
                .map(|arr| (0..arr.len()).map(|i| arr.value(i)).collect::<Vec<f32>>())
                .unwrap_or_default();

            let documents = self.batch_to_documents(&batch)?;

            for (i, document) in documents.into_iter().enumerate() {
                let score = distances.get(i).map(|distance| 1.0 - distance);
                scored.push(ScoredDocument { document, score });
            }
        }

        Ok(scored)
    }

    /// Fetch a job's documents directly: overview first, then sections in
    /// their display order.
    pub async fn fetch_by_job(
        &self,
        job_id: i64,
        limit: usize,
    ) -> Result<Vec<RetrievableDocument>> {
        let table = self.db.open_table(TABLE_NAME).execute().await?;

        let mut results = table
            .query()
            .only_if(format!("job_id = {}", job_id))
            .execute()
            .await?;

        let mut documents = Vec::new();
        while let Some(batch) = results.try_next().await? {
            if batch.num_rows() == 0 {
                continue;
            }
            documents.extend(self.batch_to_documents(&batch)?);
        }

        documents.sort_by_key(|doc| {
            (
                doc.doc_type != DocType::Overview,
                doc.section_type
                    .as_ref()
                    .map(|s| s.order_index())
                    .unwrap_or(0),
                doc.chunk_index,
            )
        });
        documents.truncate(limit);

        Ok(documents)
    }

    /// Map of indexed jobs to the `is_active` flag in their overview
    /// snapshot; drives indexing-candidate selection.
    pub async fn overview_snapshots(&self) -> Result<HashMap<i64, bool>> {
        let table = self.db.open_table(TABLE_NAME).execute().await?;

        let mut results = table
            .query()
            .only_if(format!("doc_type = '{}'", DocType::Overview.as_str()))
            .execute()
            .await?;

        let mut snapshots = HashMap::new();
        while let Some(batch) = results.try_next().await? {
            if batch.num_rows() == 0 {
                continue;
            }

            let job_ids = batch
                .column_by_name("job_id")
                .unwrap()
                .as_any()
                .downcast_ref::<Int64Array>()
                .unwrap();
            let actives = batch
                .column_by_name("is_active")
                .unwrap()
                .as_any()
                .downcast_ref::<BooleanArray>()
                .unwrap();

            for i in 0..batch.num_rows() {
                snapshots.insert(job_ids.value(i), actives.value(i));
            }
        }

        Ok(snapshots)
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        let table = self.db.open_table(TABLE_NAME).execute().await?;
        let count = table.count_rows(None).await?;

        if count == 0 {
            return Ok(IndexStats {
                total_jobs: 0,
                total_documents: 0,
                active_documents: 0,
                oldest_indexed: None,
                newest_indexed: None,
            });
        }

        let mut results = table.query().execute().await?;

        let mut job_ids: HashSet<i64> = HashSet::new();
        let mut active_documents = 0usize;
        let mut oldest: Option<DateTime<Utc>> = None;
        let mut newest: Option<DateTime<Utc>> = None;

        while let Some(batch) = results.try_next().await? {
            let ids = batch
                .column_by_name("job_id")
                .unwrap()
                .as_any()
                .downcast_ref::<Int64Array>()
                .unwrap();
            let actives = batch
                .column_by_name("is_active")
                .unwrap()
                .as_any()
                .downcast_ref::<BooleanArray>()
                .unwrap();
            let indexed_ats = batch
                .column_by_name("indexed_at")
                .unwrap()
                .as_any()
                .downcast_ref::<TimestampMillisecondArray>()
                .unwrap();

            for i in 0..batch.num_rows() {
                job_ids.insert(ids.value(i));
                if actives.value(i) {
                    active_documents += 1;
                }
                if let Some(indexed) = DateTime::from_timestamp_millis(indexed_ats.value(i)) {
                    if oldest.is_none_or(|old| indexed < old) {
                        oldest = Some(indexed);
                    }
                    if newest.is_none_or(|new| indexed > new) {
                        newest = Some(indexed);
                    }
                }
            }
        }

        Ok(IndexStats {
            total_jobs: job_ids.len(),
            total_documents: count,
            active_documents,
            oldest_indexed: oldest,
            newest_indexed: newest,
        })
    }

    fn batch_to_documents(&self, batch: &RecordBatch) -> Result<Vec<RetrievableDocument>> {
        let doc_ids = batch
            .column_by_name("doc_id")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        let job_ids = batch
            .column_by_name("job_id")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        let doc_types = batch
            .column_by_name("doc_type")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        let section_types = batch
            .column_by_name("section_type")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        let chunk_indices = batch
            .column_by_name("chunk_index")
            .unwrap()
            .as_any()
            .downcast_ref::<Int32Array>()
            .unwrap();
        let contents = batch
            .column_by_name("content")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        let metadata_json = batch
            .column_by_name("metadata")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();

        let mut documents = Vec::with_capacity(batch.num_rows());

        for i in 0..batch.num_rows() {
            let doc_type: DocType = doc_types.value(i).parse()?;
            let section_type = if section_types.is_null(i) {
                None
            } else {
                Some(crate::jobs::types::SectionType::from(
                    section_types.value(i).to_string(),
                ))
            };
            let metadata = serde_json::from_str(metadata_json.value(i))
                .context("corrupt document metadata in store")?;

            documents.push(RetrievableDocument {
                doc_id: doc_ids.value(i).to_string(),
                job_id: job_ids.value(i),
                doc_type,
                section_type,
                chunk_index: chunk_indices.value(i),
                content: contents.value(i).to_string(),
                metadata,
            });
        }

        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::types::{Salary, SectionType};
    use crate::rag::types::DocumentMetadata;

    fn make_metadata(job_id: i64, is_active: bool) -> DocumentMetadata {
        DocumentMetadata {
            job_id,
            title: format!("Job {}", job_id),
            url: None,
            salary: Salary::default(),
            locations: vec!["Hà Nội".to_string()],
            experience: Default::default(),
            company: Default::default(),
            general: Default::default(),
            sections: vec![],
            deadline: None,
            crawled_at: None,
            is_active,
        }
    }

    fn make_doc(
        job_id: i64,
        doc_type: DocType,
        section_type: Option<SectionType>,
        chunk_index: i32,
        is_active: bool,
    ) -> RetrievableDocument {
        RetrievableDocument {
            doc_id: uuid::Uuid::new_v4().to_string(),
            job_id,
            doc_type,
            section_type,
            chunk_index,
            content: format!("content of job {} chunk {}", job_id, chunk_index),
            metadata: make_metadata(job_id, is_active),
        }
    }

    fn unit_vec(axis: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; 4];
        v[axis % 4] = 1.0;
        v
    }

    #[tokio::test]
    async fn test_replace_fetch_and_delete_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path().to_str().unwrap(), 4)
            .await
            .unwrap();

        // Insert out of order to exercise the fetch ordering
        let docs = vec![
            make_doc(1, DocType::Section, Some(SectionType::Requirements), 1, true),
            make_doc(1, DocType::Overview, None, 0, true),
            make_doc(1, DocType::Section, Some(SectionType::Requirements), 0, true),
        ];
        let embeddings = vec![unit_vec(1), unit_vec(0), unit_vec(2)];
        store
            .replace_job_documents(1, &docs, &embeddings)
            .await
            .unwrap();

        let fetched = store.fetch_by_job(1, 6).await.unwrap();
        assert_eq!(fetched.len(), 3);
        assert_eq!(fetched[0].doc_type, DocType::Overview);
        assert_eq!(fetched[1].chunk_index, 0);
        assert_eq!(fetched[2].chunk_index, 1);
        assert_eq!(fetched[0].metadata.locations, vec!["Hà Nội".to_string()]);

        // Replacing again leaves exactly one batch behind
        let docs2 = vec![
            make_doc(1, DocType::Overview, None, 0, true),
            make_doc(1, DocType::Section, Some(SectionType::Description), 0, true),
        ];
        let embeddings2 = vec![unit_vec(0), unit_vec(3)];
        store
            .replace_job_documents(1, &docs2, &embeddings2)
            .await
            .unwrap();
        assert_eq!(store.fetch_by_job(1, 6).await.unwrap().len(), 2);

        store.delete_by_job(1).await.unwrap();
        assert!(store.fetch_by_job(1, 6).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_nearest_scores_and_active_predicate() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path().to_str().unwrap(), 4)
            .await
            .unwrap();

        let active = vec![make_doc(1, DocType::Overview, None, 0, true)];
        store
            .replace_job_documents(1, &active, &[unit_vec(0)])
            .await
            .unwrap();

        let expired = vec![make_doc(2, DocType::Overview, None, 0, false)];
        store
            .replace_job_documents(2, &expired, &[unit_vec(0)])
            .await
            .unwrap();

        let results = store.nearest(&unit_vec(0), 10, true).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.job_id, 1);
        let score = results[0].score.unwrap();
        assert!(score > 0.99, "identical vector should score ~1, got {}", score);

        let all = store.nearest(&unit_vec(0), 10, false).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_overview_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path().to_str().unwrap(), 4)
            .await
            .unwrap();

        store
            .replace_job_documents(
                1,
                &[make_doc(1, DocType::Overview, None, 0, true)],
                &[unit_vec(0)],
            )
            .await
            .unwrap();
        store
            .replace_job_documents(
                2,
                &[
                    make_doc(2, DocType::Overview, None, 0, false),
                    make_doc(2, DocType::Section, Some(SectionType::Description), 0, false),
                ],
                &[unit_vec(1), unit_vec(2)],
            )
            .await
            .unwrap();

        let snapshots = store.overview_snapshots().await.unwrap();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots.get(&1), Some(&true));
        assert_eq!(snapshots.get(&2), Some(&false));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        {
            DocumentStore::new(dir.path().to_str().unwrap(), 4)
                .await
                .unwrap();
        }
        let result = DocumentStore::new(dir.path().to_str().unwrap(), 8).await;
        assert!(result.is_err());
    }
}
