use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::store::schema::read_metadata;
use crate::store::sqlite::{category_counts, learning_counts, open_read_only};

pub fn run(args: StatusArgs) -> Result<()> {
    let db_path = args.store.resolved_db_path();

    info!(cache_root = %args.store.cache_root.display(), "status requested");

    if !db_path.exists() {
        warn!(path = %db_path.display(), "database file missing; run `import` first");
        return Ok(());
    }

    let connection = open_read_only(&db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;

    let schema_version = read_metadata(&connection, "db_schema_version")
        .context("failed to read schema version")?
        .unwrap_or_default();
    let updated_at = read_metadata(&connection, "db_updated_at")
        .context("failed to read last update time")?
        .unwrap_or_default();
    info!(
        path = %db_path.display(),
        schema_version = %schema_version,
        updated_at = %updated_at,
        "database status"
    );

    for count in category_counts(&connection).context("failed to count categories")? {
        if count.categories == 0 && count.marketplace.profile().mappable {
            warn!(marketplace = %count.marketplace, "no categories imported; mappings will be empty");
        } else {
            info!(
                marketplace = %count.marketplace,
                categories = count.categories,
                "catalog"
            );
        }
    }

    let (learnings, manual) =
        learning_counts(&connection).context("failed to count learning records")?;
    info!(learnings, manual, "learning records");

    Ok(())
}
