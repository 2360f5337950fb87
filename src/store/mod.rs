pub mod schema;
pub mod sqlite;

use async_trait::async_trait;

use crate::engine::retrieval;
use crate::error::{LearningSinkError, StoreError};
use crate::model::{Category, LearningRecord, MarketplaceId};

pub use sqlite::SqliteStore;

/// Read-only view of the imported category catalogs.
#[async_trait]
pub trait CategoryStore: Send + Sync {
    /// All categories of one marketplace in insertion order, capped at
    /// [`sqlite::CATALOG_ROW_CAP`].
    async fn list_categories(&self, marketplace: MarketplaceId)
    -> Result<Vec<Category>, StoreError>;

    /// Keyword-ranked subset of the catalog, best first.
    async fn search_categories(
        &self,
        marketplace: MarketplaceId,
        query: &str,
    ) -> Result<Vec<Category>, StoreError> {
        let catalog = self.list_categories(marketplace).await?;
        Ok(retrieval::score(query, &catalog)
            .into_iter()
            .cloned()
            .collect())
    }
}

/// Append-only destination for confirmed mappings.
#[async_trait]
pub trait LearningSink: Send + Sync {
    async fn record(&self, record: &LearningRecord) -> Result<(), LearningSinkError>;
}

/// Persists each record on its own; one failure does not stop the rest.
pub async fn record_all(
    sink: &dyn LearningSink,
    records: &[LearningRecord],
) -> Vec<Result<(), LearningSinkError>> {
    let mut outcomes = Vec::with_capacity(records.len());
    for record in records {
        outcomes.push(sink.record(record).await);
    }
    outcomes
}
