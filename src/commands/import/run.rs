use std::fs::File;
use std::io::BufReader;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use super::layout::parse_catalog;
use crate::cli::ImportArgs;
use crate::store::sqlite::{delete_marketplace, open_read_write, upsert_categories};
use crate::util::ensure_parent_directory;

pub fn run(args: ImportArgs) -> Result<()> {
    let db_path = args.store.resolved_db_path();
    let file = File::open(&args.csv)
        .with_context(|| format!("failed to open CSV: {}", args.csv.display()))?;

    info!(
        marketplace = %args.marketplace,
        csv = %args.csv.display(),
        db = %db_path.display(),
        replace = args.replace,
        dry_run = args.dry_run,
        "import started"
    );

    let parsed = parse_catalog(args.marketplace, BufReader::new(file))
        .with_context(|| format!("failed to parse CSV: {}", args.csv.display()))?;
    if parsed.skipped > 0 {
        warn!(
            marketplace = %args.marketplace,
            skipped = parsed.skipped,
            "skipped rows with an empty category id or name"
        );
    }
    if parsed.categories.is_empty() {
        bail!(
            "no importable rows in {} for {}",
            args.csv.display(),
            args.marketplace
        );
    }

    if args.dry_run {
        info!(
            marketplace = %args.marketplace,
            rows = parsed.categories.len(),
            skipped = parsed.skipped,
            "dry run: nothing written"
        );
        return Ok(());
    }

    ensure_parent_directory(&db_path)?;
    let mut connection = open_read_write(&db_path)
        .with_context(|| format!("failed to open category database: {}", db_path.display()))?;

    if args.replace {
        let removed = delete_marketplace(&connection, args.marketplace).with_context(|| {
            format!("failed to clear existing {} categories", args.marketplace)
        })?;
        info!(marketplace = %args.marketplace, removed, "cleared existing categories");
    }

    let written = upsert_categories(&mut connection, &parsed.categories)
        .with_context(|| format!("failed to write {} categories", args.marketplace))?;

    info!(
        marketplace = %args.marketplace,
        rows = written,
        skipped = parsed.skipped,
        "import completed"
    );
    Ok(())
}
