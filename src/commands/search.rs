use std::io::{self, Write};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::cli::SearchArgs;
use crate::model::{Category, MarketplaceId};
use crate::store::{CategoryStore, SqliteStore};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse<'a> {
    marketplace: MarketplaceId,
    query: &'a str,
    returned: usize,
    results: &'a [Category],
}

pub async fn run(args: SearchArgs) -> Result<()> {
    let store = SqliteStore::new(args.store.resolved_db_path());

    let mut results = store
        .search_categories(args.marketplace, &args.query)
        .await
        .with_context(|| format!("failed to search {} categories", args.marketplace))?;
    results.truncate(args.limit);

    info!(
        marketplace = %args.marketplace,
        db = %store.db_path().display(),
        returned = results.len(),
        "search completed"
    );

    if args.json {
        write_json_response(args.marketplace, &args.query, &results)
    } else {
        write_text_response(args.marketplace, &args.query, &results)
    }
}

fn write_json_response(marketplace: MarketplaceId, query: &str, results: &[Category]) -> Result<()> {
    let response = SearchResponse {
        marketplace,
        query,
        returned: results.len(),
        results,
    };

    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, &response)
        .context("failed to serialize search json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

fn write_text_response(marketplace: MarketplaceId, query: &str, results: &[Category]) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(output, "Marketplace: {} ({marketplace})", marketplace.display_name())?;
    writeln!(output, "Query: {query}")?;
    writeln!(output, "Results: {}", results.len())?;
    for (index, category) in results.iter().enumerate() {
        writeln!(
            output,
            "{}.\t{}\t{}",
            index + 1,
            category.category_id,
            category.display_label()
        )?;
    }

    output.flush()?;
    Ok(())
}
