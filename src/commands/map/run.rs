use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use super::output::{OutputFormat, write_results};
use crate::cli::{LlmArgs, MapCategoryArgs, MapProductsArgs, StoreArgs};
use crate::engine::Mapper;
use crate::llm::gemini::GeminiClient;
use crate::model::{LearningRecord, MappingResult, MappingSubject, MarketplaceId, SourceCategory};
use crate::store::{SqliteStore, record_all};

pub async fn run_products(args: MapProductsArgs) -> Result<()> {
    let names = read_product_names(args.input.as_deref())?;
    let (mapper, _) = build_mapper(&args.store, &args.llm)?;

    info!(
        lines = names.len(),
        limit = mapper.max_batch_lines(),
        "mapping product names"
    );

    let mut results = Vec::with_capacity(names.len());
    let interrupted = tokio::select! {
        outcome = mapper.map_product_names_into(&names, &mut results) => {
            outcome.context("product batch rejected")?;
            false
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            true
        }
    };
    if interrupted {
        warn!(
            completed = results.len(),
            "interrupted; writing the products mapped so far"
        );
    }

    log_summary(&results);
    write_results(
        &results,
        &MarketplaceId::MAPPABLE,
        "商品名",
        OutputFormat::from_flags(args.json, args.csv),
    )
}

pub async fn run_category(args: MapCategoryArgs) -> Result<()> {
    let source = SourceCategory {
        marketplace_id: args.source_marketplace,
        name: args.source_name.trim().to_string(),
        id: args.source_id.trim().to_string(),
    };
    if source.name.is_empty() || source.id.is_empty() {
        bail!("source category name and id must not be empty");
    }

    let targets = mappable_targets(&args.targets);
    if targets.is_empty() {
        warn!("no mappable target marketplaces given; nothing to map");
    }

    let (mapper, store) = build_mapper(&args.store, &args.llm)?;

    let results = tokio::select! {
        results = mapper.map_category(&source, &targets) => {
            results.context("category mapping rejected")?
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            bail!("interrupted before mapping finished; no results written");
        }
    };

    log_summary(&results);

    if args.confirm {
        let records = learning_records(&results);
        let outcomes = record_all(store.as_ref(), &records).await;
        let mut failed = 0;
        for (record, outcome) in records.iter().zip(&outcomes) {
            if let Err(err) = outcome {
                failed += 1;
                warn!(
                    target_marketplace = %record.target_marketplace_id,
                    target_id = %record.target_category_id,
                    error = %err,
                    "failed to record confirmed mapping"
                );
            }
        }
        info!(
            recorded = records.len() - failed,
            failed,
            "confirmed mappings recorded"
        );
    }

    write_results(
        &results,
        &targets,
        "元カテゴリ名",
        OutputFormat::from_flags(args.json, args.csv),
    )
}

fn build_mapper(store_args: &StoreArgs, llm_args: &LlmArgs) -> Result<(Mapper, Arc<SqliteStore>)> {
    let gemini = llm_args.gemini_settings();
    if gemini.api_key.is_none() {
        warn!("no API key configured (--api-key or GEMINI_API_KEY); every model call will fail");
    }

    let store = Arc::new(SqliteStore::new(store_args.resolved_db_path()));
    info!(
        db = %store.db_path().display(),
        fast_model = %gemini.fast_model,
        strong_model = %gemini.strong_model,
        "mapper configured"
    );

    let mapper = Mapper::new(
        store.clone(),
        Arc::new(GeminiClient::new(gemini)),
        llm_args.mapper_settings(),
    )
    .context("failed to build mapper")?;
    Ok((mapper, store))
}

fn read_product_names(input: Option<&Path>) -> Result<Vec<String>> {
    let content = match input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read product names: {}", path.display()))?,
        None => {
            let mut content = String::new();
            io::stdin()
                .read_to_string(&mut content)
                .context("failed to read product names from stdin")?;
            content
        }
    };

    Ok(content.lines().map(str::to_string).collect())
}

/// Drops duplicates and marketplaces that cannot be mapped onto, keeping the
/// order given.
fn mappable_targets(requested: &[MarketplaceId]) -> Vec<MarketplaceId> {
    let mut targets = Vec::with_capacity(requested.len());
    for marketplace in requested {
        if !marketplace.profile().mappable {
            warn!(marketplace = %marketplace, "not a mapping target; skipped");
            continue;
        }
        if !targets.contains(marketplace) {
            targets.push(*marketplace);
        }
    }
    targets
}

fn learning_records(results: &[MappingResult]) -> Vec<LearningRecord> {
    results
        .iter()
        .filter_map(|result| match &result.subject {
            MappingSubject::SourceCategory(source) => Some((source, &result.mappings)),
            MappingSubject::ProductName(_) => None,
        })
        .flat_map(|(source, mappings)| {
            mappings.iter().map(move |(target, selection)| {
                LearningRecord::from_selection(source, *target, selection, false)
            })
        })
        .collect()
}

fn log_summary(results: &[MappingResult]) {
    let mapped = results
        .iter()
        .map(|result| result.mappings.len())
        .sum::<usize>();
    let unmapped = results
        .iter()
        .filter(|result| result.mappings.is_empty())
        .count();
    info!(
        results = results.len(),
        mappings = mapped,
        fully_unmapped = unmapped,
        "mapping completed"
    );
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::model::MappingSelection;

    #[test]
    fn rakuma_and_duplicates_are_not_targets() {
        let targets = mappable_targets(&[
            MarketplaceId::Rakuten,
            MarketplaceId::Rakuma,
            MarketplaceId::Rakuten,
            MarketplaceId::MercariShops,
        ]);
        assert_eq!(
            targets,
            vec![MarketplaceId::Rakuten, MarketplaceId::MercariShops]
        );
    }

    #[test]
    fn confirmed_category_mappings_become_learning_records() {
        let source = SourceCategory {
            marketplace_id: MarketplaceId::MercariShops,
            name: "Tシャツ".to_string(),
            id: "m-1".to_string(),
        };
        let mut mappings = BTreeMap::new();
        mappings.insert(
            MarketplaceId::Rakuten,
            MappingSelection {
                name: "Tシャツ".to_string(),
                id: "100371".to_string(),
                full_path: None,
            },
        );
        let results = vec![
            MappingResult {
                subject: MappingSubject::SourceCategory(source),
                mappings: mappings.clone(),
            },
            MappingResult {
                subject: MappingSubject::ProductName("ignored".to_string()),
                mappings,
            },
        ];

        let records = learning_records(&results);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source_category_id, "m-1");
        assert_eq!(records[0].target_marketplace_id, MarketplaceId::Rakuten);
        assert_eq!(records[0].target_category_id, "100371");
        assert!(!records[0].is_manual_correction);
    }

    #[test]
    fn product_names_are_read_line_by_line() {
        let path = std::env::temp_dir().join(format!(
            "category-mapper-names-{}.txt",
            std::process::id()
        ));
        fs::write(&path, "赤いTシャツ\n\nバッグ\n").expect("fixture should write");

        let names = read_product_names(Some(&path)).expect("names should read");
        fs::remove_file(&path).expect("fixture should be removed");
        assert_eq!(names, vec!["赤いTシャツ", "", "バッグ"]);
    }
}
