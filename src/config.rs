// Copyright 2025 Muvon Un Limited
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

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Embedding endpoint configuration
/// The same model must serve index-time and query-time calls; a dimension
/// mismatch against an existing index is a fatal configuration error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key_env: String,
    pub batch_size: usize,
    pub request_timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key_env: "EMBEDDING_API_KEY".to_string(),
            batch_size: 64,
            request_timeout_secs: 30,
        }
    }
}

/// Query-understanding classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryParserConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    pub api_key_env: String,
    pub request_timeout_secs: u64,
}

impl Default for QueryParserConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "QUERY_PARSER_API_KEY".to_string(),
            request_timeout_secs: 15,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub default_top_k: usize,
    pub max_context_chars: usize,
    pub request_timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: 8,
            max_context_chars: 12000,
            request_timeout_secs: 30,
        }
    }
}

/// Indexing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    pub chunk_max_chars: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            chunk_max_chars: 800,
        }
    }
}

/// Job feed configuration: where raw job records come from.
/// The crawler exports records to a JSON file consumed here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobFeedConfig {
    pub feed_path: Option<PathBuf>,
}

/// Main configuration for jobrag
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub embedding: EmbeddingConfig,
    pub query_parser: QueryParserConfig,
    pub retrieval: RetrievalConfig,
    pub indexing: IndexingConfig,
    pub jobs: JobFeedConfig,
}

impl Config {
    /// Load configuration from config.toml file
    /// First tries to load from system config directory, falls back to embedded template
    pub fn load() -> Result<Self> {
        // Try to load from system config directory
        let config_path = crate::storage::get_system_config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            // Config doesn't exist, create from template
            let template_content = include_str!("../config-templates/default.toml");
            let config: Self = toml::from_str(template_content)?;

            // Save to system config directory
            if let Some(parent) = config_path.parent() {
                if !parent.exists() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(&config_path, template_content)?;

            Ok(config)
        }
    }
}
