use anyhow::{Context, Result, anyhow, bail};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::cli::LearnArgs;
use crate::model::{LearningRecord, MappingSelection, MarketplaceId, SourceCategory};
use crate::store::sqlite::{find_category, open_read_only};
use crate::store::{SqliteStore, record_all};

pub async fn run(args: LearnArgs) -> Result<()> {
    let source = SourceCategory {
        marketplace_id: args.source_marketplace,
        name: args.source_name.trim().to_string(),
        id: args.source_id.trim().to_string(),
    };
    if source.name.is_empty() || source.id.is_empty() {
        bail!("source category name and id must not be empty");
    }

    let targets = args
        .targets
        .iter()
        .map(|value| parse_target(value))
        .collect::<Result<Vec<(MarketplaceId, String)>>>()?;

    let store = SqliteStore::new(args.store.resolved_db_path());
    let connection = open_read_only(store.db_path()).with_context(|| {
        format!(
            "failed to open category database: {}",
            store.db_path().display()
        )
    })?;
    let records = resolve_records(&connection, &source, &targets, args.manual)?;
    drop(connection);

    let outcomes = record_all(&store, &records).await;
    let mut failed = 0;
    for (record, outcome) in records.iter().zip(&outcomes) {
        match outcome {
            Ok(()) => info!(
                source_marketplace = %record.source_marketplace_id,
                source_id = %record.source_category_id,
                target_marketplace = %record.target_marketplace_id,
                target_id = %record.target_category_id,
                manual = record.is_manual_correction,
                "learning recorded"
            ),
            Err(err) => {
                failed += 1;
                warn!(
                    target_marketplace = %record.target_marketplace_id,
                    target_id = %record.target_category_id,
                    error = %err,
                    "failed to record learning"
                );
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} learning records failed to persist", records.len());
    }
    Ok(())
}

/// Parses `<marketplace>=<categoryId>`.
fn parse_target(value: &str) -> Result<(MarketplaceId, String)> {
    let (marketplace, category_id) = value
        .split_once('=')
        .ok_or_else(|| anyhow!("target `{value}` must look like <marketplace>=<categoryId>"))?;

    let marketplace = marketplace
        .parse::<MarketplaceId>()
        .with_context(|| format!("invalid target `{value}`"))?;
    let category_id = category_id.trim();
    if category_id.is_empty() {
        bail!("target `{value}` has an empty category id");
    }

    Ok((marketplace, category_id.to_string()))
}

/// Target names and paths come from the catalog, so only known categories can
/// be recorded.
fn resolve_records(
    connection: &Connection,
    source: &SourceCategory,
    targets: &[(MarketplaceId, String)],
    manual: bool,
) -> Result<Vec<LearningRecord>> {
    targets
        .iter()
        .map(|(marketplace, category_id)| -> Result<LearningRecord> {
            let category = find_category(connection, *marketplace, category_id)
                .with_context(|| format!("failed to look up {marketplace} category {category_id}"))?
                .ok_or_else(|| anyhow!("{marketplace} category {category_id} is not in the catalog"))?;

            let selection = MappingSelection {
                name: category.category_name,
                id: category.category_id,
                full_path: category.full_path,
            };
            Ok(LearningRecord::from_selection(
                source,
                *marketplace,
                &selection,
                manual,
            ))
        })
        .collect()
}
