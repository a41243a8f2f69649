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

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "jobrag")]
#[command(version, author = "Muvon Un Limited <opensource@muvon.io>")]
#[command(about = "Hybrid retrieval engine for job-listing RAG assistants", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build or refresh the document index from the job feed
    Index {
        /// Index a single job by id
        #[arg(short, long)]
        job: Option<i64>,

        /// Maximum number of jobs to index in this run
        #[arg(short, long)]
        limit: Option<usize>,

        /// Candidate selection: "incremental" indexes active jobs that
        /// have no documents yet, "full" re-indexes everything active
        /// plus freshly expired jobs
        #[arg(short, long, default_value = "incremental")]
        mode: String,
    },

    /// Retrieve job documents for a free-text question
    Ask {
        /// The question
        query: Vec<String>,

        /// Maximum number of documents to return
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Pin the currently viewed job's documents into the result
        #[arg(short, long)]
        job: Option<i64>,

        /// Prior conversation turn to fold into the retrieval query
        /// (repeatable, oldest first)
        #[arg(long)]
        history: Vec<String>,

        /// Also search documents of expired jobs
        #[arg(long)]
        include_expired: bool,

        /// Skip the LLM filter extraction and search on the raw query
        #[arg(long)]
        no_parse: bool,

        /// Output format: text, json, or context
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Extract structured filters from a question without retrieving
    Parse {
        /// The question
        query: Vec<String>,
    },

    /// Show document index statistics
    Stats,
}
