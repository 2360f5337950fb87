use std::time::Duration;

use thiserror::Error;

use crate::model::MarketplaceId;

#[derive(Debug, Error)]
#[error("unknown marketplace `{0}` (expected one of mercari_shops, rakuten, yahoo_shopping, rakuma)")]
pub struct UnknownMarketplace(pub String);

/// Batch-fatal input errors; raised before any retrieval or LLM work.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("too many product names: {count} lines submitted, at most {limit} per request")]
    TooManyLines { count: usize, limit: usize },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("category store unavailable for {marketplace}: {source}")]
    Unavailable {
        marketplace: MarketplaceId,
        #[source]
        source: rusqlite::Error,
    },
    #[error("category store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM API key is not configured")]
    MissingApiKey,
    #[error("LLM transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("LLM request rejected with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("LLM call timed out after {0:?}")]
    Timeout(Duration),
}

/// Unusable model output; always converted to an absent selection.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no JSON object found in model output")]
    NoJsonObject,
    #[error("model output is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("model output JSON is not an object")]
    NotAnObject,
    #[error("model output lacks a non-empty `{0}` field")]
    MissingField(&'static str),
    #[error("category id `{0}` is not among the listed candidates")]
    OutsideCandidates(String),
    #[error("category id `{0}` does not exist in the catalog")]
    UnknownCategory(String),
}

#[derive(Debug, Error)]
pub enum LearningSinkError {
    #[error("failed to persist learning record: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("learning sink task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
