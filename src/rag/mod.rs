pub mod chunker;
pub mod context;
pub mod filters;
pub mod formatting;
pub mod indexer;
pub mod query_parser;
pub mod retriever;
pub mod store;
pub mod types;
