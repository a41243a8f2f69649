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
use std::sync::Arc;
use std::time::Duration;

use crate::cli::Commands;
use crate::config::Config;
use crate::embedding::{create_embedding_provider, EmbeddingProvider};
use crate::jobs::source::{JobSource, JsonJobSource};
use crate::rag::context::{build_context_text, build_job_cards, build_retrieval_query, ChatTurn};
use crate::rag::formatting;
use crate::rag::indexer::Indexer;
use crate::rag::query_parser::QueryParser;
use crate::rag::retriever::Retriever;
use crate::rag::store::DocumentStore;
use crate::rag::types::{IndexMode, QueryFilters};

pub async fn execute(config: &Config, command: Commands) -> Result<()> {
    match command {
        Commands::Index { job, limit, mode } => {
            let (provider, store) = build_engine(config).await?;
            let source = job_source(config)?;
            let indexer = Indexer::new(
                source,
                store,
                provider,
                config.indexing.chunk_max_chars,
            );

            match job {
                Some(job_id) => {
                    let count = indexer.index_job(job_id).await?;
                    println!("Indexed job {} ({} documents)", job_id, count);
                }
                None => {
                    let mode = parse_mode(&mode)?;
                    indexer.index_all(limit, mode).await?;
                }
            }
        }

        Commands::Ask {
            query,
            top_k,
            job,
            history,
            include_expired,
            no_parse,
            format,
        } => {
            let question = query.join(" ");
            anyhow::ensure!(!question.trim().is_empty(), "question cannot be empty");

            let filters = if no_parse {
                QueryFilters::default()
            } else {
                QueryParser::new(&config.query_parser).parse(&question).await
            };

            // Filters come from the question alone; the embedded query
            // additionally folds in the conversation tail
            let turns: Vec<ChatTurn> = history
                .into_iter()
                .map(|content| ChatTurn {
                    role: "user".to_string(),
                    content,
                })
                .collect();
            let retrieval_query = build_retrieval_query(&question, &turns);

            let (provider, store) = build_engine(config).await?;
            let retriever = Retriever::new(store, provider);

            let top_k = top_k.unwrap_or(config.retrieval.default_top_k);
            let result = tokio::time::timeout(
                Duration::from_secs(config.retrieval.request_timeout_secs),
                retriever.retrieve(&retrieval_query, top_k, &filters, job, !include_expired),
            )
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "retrieval timed out after {}s",
                    config.retrieval.request_timeout_secs
                )
            })??;

            match format.as_str() {
                "json" => println!(
                    "{}",
                    serde_json::to_string_pretty(&build_job_cards(&result))?
                ),
                "context" => println!(
                    "{}",
                    build_context_text(&result, config.retrieval.max_context_chars)
                ),
                _ => {
                    if !filters.is_empty() {
                        print!("{}", formatting::format_filters(&filters));
                    }
                    print!("{}", formatting::format_results(&result));
                }
            }
        }

        Commands::Parse { query } => {
            let question = query.join(" ");
            let filters = QueryParser::new(&config.query_parser).parse(&question).await;
            println!("{}", serde_json::to_string_pretty(&filters)?);
        }

        Commands::Stats => {
            let (_, store) = build_engine(config).await?;
            let stats = store.stats().await?;
            print!("{}", formatting::format_stats(&stats));
        }
    }

    Ok(())
}

fn parse_mode(mode: &str) -> Result<IndexMode> {
    match mode {
        "incremental" => Ok(IndexMode::Incremental),
        "full" => Ok(IndexMode::Full),
        other => anyhow::bail!("unknown index mode: {} (use incremental or full)", other),
    }
}

/// Build the shared embedding provider and document store. The provider
/// is probed once for its dimensionality so index-time and query-time
/// calls are guaranteed to agree; the store rejects an index built with a
/// different dimension.
async fn build_engine(
    config: &Config,
) -> Result<(Arc<dyn EmbeddingProvider>, Arc<DocumentStore>)> {
    let provider = create_embedding_provider(&config.embedding)?;

    let probe = provider
        .embed("dimension probe")
        .await
        .context("embedding provider unavailable")?;
    let vector_dim = probe.len();

    let db_path = crate::storage::get_database_path()?;
    let store = Arc::new(
        DocumentStore::new(
            db_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("invalid database path"))?,
            vector_dim,
        )
        .await?,
    );

    Ok((provider, store))
}

fn job_source(config: &Config) -> Result<Arc<dyn JobSource>> {
    let feed_path = config
        .jobs
        .feed_path
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("no job feed configured (set jobs.feed_path)"))?;
    Ok(Arc::new(JsonJobSource::from_file(feed_path)?))
}
