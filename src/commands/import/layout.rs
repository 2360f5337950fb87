use std::io::Read;

use anyhow::{Context, Result, bail};
use csv::{ReaderBuilder, StringRecord, Trim};

use crate::model::{Category, MarketplaceId};
use crate::store::sqlite::category_key;

/// Header names of one marketplace's category export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct CsvLayout {
    pub id: &'static str,
    /// Absent when the name is derived from the last path segment.
    pub name: Option<&'static str>,
    pub path: &'static str,
}

pub(super) fn layout_for(marketplace: MarketplaceId) -> CsvLayout {
    match marketplace {
        MarketplaceId::MercariShops => CsvLayout {
            id: "カテゴリID",
            name: Some("カテゴリ名"),
            path: "カテゴリ名（フル）",
        },
        MarketplaceId::Rakuten => CsvLayout {
            id: "ジャンルID",
            name: None,
            path: "パス名",
        },
        MarketplaceId::YahooShopping => CsvLayout {
            id: "id",
            name: Some("name"),
            path: "path_name",
        },
        MarketplaceId::Rakuma => CsvLayout {
            id: "category_id",
            name: Some("category_name"),
            path: "full_path",
        },
    }
}

#[derive(Debug, Default)]
pub(super) struct ParsedCatalog {
    pub categories: Vec<Category>,
    pub skipped: usize,
}

pub(super) fn parse_catalog<R: Read>(marketplace: MarketplaceId, reader: R) -> Result<ParsedCatalog> {
    let layout = layout_for(marketplace);
    let mut csv_reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .context("failed to read CSV header row")?
        .clone();
    let id_column = column_index(&headers, layout.id)?;
    let name_column = layout
        .name
        .map(|name| column_index(&headers, name))
        .transpose()?;
    let path_column = column_index(&headers, layout.path)?;

    let mut parsed = ParsedCatalog::default();
    for (index, record) in csv_reader.records().enumerate() {
        // header is line 1
        let record = record.with_context(|| format!("failed to read CSV line {}", index + 2))?;

        let category_id = field(&record, id_column);
        let full_path = field(&record, path_column);
        let category_name = match name_column {
            Some(column) => field(&record, column).to_string(),
            None => last_path_segment(full_path).to_string(),
        };

        if category_id.is_empty() || category_name.is_empty() {
            parsed.skipped += 1;
            continue;
        }

        parsed.categories.push(Category {
            id: category_key(marketplace, category_id),
            marketplace_id: marketplace,
            category_name,
            category_id: category_id.to_string(),
            full_path: (!full_path.is_empty()).then(|| full_path.to_string()),
            parent_category_id: None,
        });
    }

    Ok(parsed)
}

fn column_index(headers: &StringRecord, column: &str) -> Result<usize> {
    match headers
        .iter()
        .position(|header| header.trim_start_matches('\u{feff}') == column)
    {
        Some(index) => Ok(index),
        None => bail!(
            "CSV is missing required column `{column}` (found: {})",
            headers.iter().collect::<Vec<&str>>().join(", ")
        ),
    }
}

fn field(record: &StringRecord, column: usize) -> &str {
    record.get(column).unwrap_or_default()
}

/// `A > B > C` names the category `C`; a path without separators is its own
/// name.
fn last_path_segment(path: &str) -> &str {
    match path.rsplit('>').next().map(str::trim) {
        Some(segment) if !segment.is_empty() => segment,
        _ => path,
    }
}
