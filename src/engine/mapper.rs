use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::future::join_all;
use tracing::{debug, info, warn};

use super::candidates;
use super::extract::{CandidatePolicy, ResponseExtractor};
use super::prompt::{self, PromptSubject};
use super::retrieval;
use crate::error::{LlmError, MappingError};
use crate::llm::LlmClient;
use crate::model::{Category, MappingResult, MappingSelection, MappingSubject, MarketplaceId, SourceCategory};
use crate::store::CategoryStore;

/// Most product names accepted in one request, counted before blank lines
/// are dropped.
pub const MAX_BATCH_LINES: usize = 30;

#[derive(Debug, Clone)]
pub struct MapperSettings {
    pub max_batch_lines: usize,
    pub llm_timeout: Duration,
    pub candidate_policy: CandidatePolicy,
    pub product_targets: Vec<MarketplaceId>,
}

impl Default for MapperSettings {
    fn default() -> Self {
        Self {
            max_batch_lines: MAX_BATCH_LINES,
            llm_timeout: Duration::from_secs(30),
            candidate_policy: CandidatePolicy::Strict,
            product_targets: MarketplaceId::MAPPABLE.to_vec(),
        }
    }
}

/// Catalog snapshot for one request; read once, shared by every item.
type CatalogSnapshot = Vec<(MarketplaceId, Vec<Category>)>;

pub struct Mapper {
    store: Arc<dyn CategoryStore>,
    llm: Arc<dyn LlmClient>,
    extractor: ResponseExtractor,
    settings: MapperSettings,
}

impl Mapper {
    pub fn new(
        store: Arc<dyn CategoryStore>,
        llm: Arc<dyn LlmClient>,
        settings: MapperSettings,
    ) -> Result<Self> {
        let extractor = ResponseExtractor::new(settings.candidate_policy)?;
        Ok(Self {
            store,
            llm,
            extractor,
            settings,
        })
    }

    pub fn max_batch_lines(&self) -> usize {
        self.settings.max_batch_lines
    }

    /// Maps each non-blank product name onto every product target.
    ///
    /// Names are processed one at a time; the marketplaces for a single name
    /// are queried concurrently. A marketplace without a usable answer is
    /// simply missing from that row's `mappings`.
    pub async fn map_product_names(
        &self,
        names: &[String],
    ) -> Result<Vec<MappingResult>, MappingError> {
        let mut results = Vec::new();
        self.map_product_names_into(names, &mut results).await?;
        Ok(results)
    }

    /// Same as [`Mapper::map_product_names`], but each finished row is pushed
    /// onto `results` as soon as it completes, so a caller that drops this
    /// future keeps every row mapped so far.
    pub async fn map_product_names_into(
        &self,
        names: &[String],
        results: &mut Vec<MappingResult>,
    ) -> Result<(), MappingError> {
        if names.len() > self.settings.max_batch_lines {
            return Err(MappingError::TooManyLines {
                count: names.len(),
                limit: self.settings.max_batch_lines,
            });
        }

        let names = names
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .collect::<Vec<&str>>();
        if names.is_empty() {
            return Ok(());
        }

        let catalogs = self.prefetch_catalogs(&self.settings.product_targets).await;

        results.reserve(names.len());
        for (index, name) in names.iter().enumerate() {
            let mappings = self
                .map_across(&PromptSubject::ProductName(name), &catalogs)
                .await;
            info!(
                item = index + 1,
                total = names.len(),
                mapped = mappings.len(),
                targets = catalogs.len(),
                "mapped product name"
            );
            results.push(MappingResult {
                subject: MappingSubject::ProductName((*name).to_string()),
                mappings,
            });
        }

        Ok(())
    }

    /// Maps one source category onto the given targets. Always a single row,
    /// or no rows when `targets` is empty.
    pub async fn map_category(
        &self,
        source: &SourceCategory,
        targets: &[MarketplaceId],
    ) -> Result<Vec<MappingResult>, MappingError> {
        if targets.is_empty() {
            return Ok(Vec::new());
        }

        let mut unique_targets = Vec::with_capacity(targets.len());
        for target in targets {
            if !unique_targets.contains(target) {
                unique_targets.push(*target);
            }
        }

        let catalogs = self.prefetch_catalogs(&unique_targets).await;
        let mappings = self
            .map_across(&PromptSubject::Category(source), &catalogs)
            .await;
        info!(
            source_marketplace = %source.marketplace_id,
            source_id = %source.id,
            mapped = mappings.len(),
            targets = catalogs.len(),
            "mapped source category"
        );

        Ok(vec![MappingResult {
            subject: MappingSubject::SourceCategory(source.clone()),
            mappings,
        }])
    }

    async fn prefetch_catalogs(&self, targets: &[MarketplaceId]) -> CatalogSnapshot {
        let fetches = targets.iter().map(|&marketplace| async move {
            let catalog = match self.store.list_categories(marketplace).await {
                Ok(catalog) => catalog,
                Err(err) => {
                    warn!(
                        marketplace = %marketplace,
                        error = %err,
                        "category catalog unavailable; marketplace will stay unmapped"
                    );
                    Vec::new()
                }
            };
            debug!(marketplace = %marketplace, categories = catalog.len(), "prefetched catalog");
            (marketplace, catalog)
        });

        join_all(fetches).await
    }

    async fn map_across(
        &self,
        subject: &PromptSubject<'_>,
        catalogs: &CatalogSnapshot,
    ) -> BTreeMap<MarketplaceId, MappingSelection> {
        let calls = catalogs.iter().map(|(marketplace, catalog)| async move {
            let selection = self.map_to_marketplace(subject, *marketplace, catalog).await;
            (*marketplace, selection)
        });

        join_all(calls)
            .await
            .into_iter()
            .filter_map(|(marketplace, selection)| selection.map(|value| (marketplace, value)))
            .collect()
    }

    async fn map_to_marketplace(
        &self,
        subject: &PromptSubject<'_>,
        target: MarketplaceId,
        catalog: &[Category],
    ) -> Option<MappingSelection> {
        let retrieved = retrieval::score(subject.query_text(), catalog);
        let retrieved_count = retrieved.len();
        let candidates = candidates::build(retrieved, catalog);
        if candidates.is_empty() {
            debug!(marketplace = %target, "no candidates; skipping model call");
            return None;
        }

        let prompt = prompt::compile(subject, target, &candidates);
        let tier = subject.model_tier(target);
        debug!(
            marketplace = %target,
            retrieved = retrieved_count,
            candidates = candidates.len(),
            ?tier,
            "requesting selection"
        );

        let call = self.llm.complete(&prompt, tier);
        let raw = match tokio::time::timeout(self.settings.llm_timeout, call).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(err)) => {
                warn!(marketplace = %target, error = %err, "model call failed");
                return None;
            }
            Err(_) => {
                let err = LlmError::Timeout(self.settings.llm_timeout);
                warn!(marketplace = %target, error = %err, "model call failed");
                return None;
            }
        };

        match self.extractor.extract(&raw, &candidates, catalog) {
            Ok(selection) => Some(selection),
            Err(err) => {
                warn!(
                    marketplace = %target,
                    error = %err,
                    "discarding unusable model output"
                );
                None
            }
        }
    }
}
