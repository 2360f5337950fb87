use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use tracing::debug;

use super::schema;
use super::{CategoryStore, LearningSink};
use crate::error::{LearningSinkError, StoreError};
use crate::model::{Category, LearningRecord, MarketplaceCount, MarketplaceId};
use crate::util::{now_utc_millis_string, now_utc_string, sha256_hex};

/// Upper bound on rows returned per marketplace listing.
pub const CATALOG_ROW_CAP: usize = 10_000;
/// Rows written per import transaction.
pub const IMPORT_BATCH_SIZE: usize = 500;

const ID_HASH_PREFIX: usize = 24;

/// File-backed store. Every call opens its own connection on a blocking
/// thread, so the handle is freely shareable.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db_path: PathBuf,
}

impl SqliteStore {
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

#[async_trait]
impl CategoryStore for SqliteStore {
    async fn list_categories(
        &self,
        marketplace: MarketplaceId,
    ) -> Result<Vec<Category>, StoreError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let unavailable = |source| StoreError::Unavailable {
                marketplace,
                source,
            };
            let connection = open_read_only(&db_path).map_err(unavailable)?;
            let categories = load_categories(&connection, marketplace).map_err(unavailable)?;
            debug!(marketplace = %marketplace, rows = categories.len(), "loaded catalog");
            Ok::<_, StoreError>(categories)
        })
        .await?
    }
}

#[async_trait]
impl LearningSink for SqliteStore {
    async fn record(&self, record: &LearningRecord) -> Result<(), LearningSinkError> {
        let db_path = self.db_path.clone();
        let record = record.clone();
        tokio::task::spawn_blocking(move || {
            let connection = open_read_write(&db_path)?;
            let id = insert_learning(&connection, &record, &now_utc_millis_string())?;
            debug!(
                id = %id,
                source_marketplace = %record.source_marketplace_id,
                target_marketplace = %record.target_marketplace_id,
                manual = record.is_manual_correction,
                "recorded learning"
            );
            Ok::<_, LearningSinkError>(())
        })
        .await?
    }
}

pub fn open_read_only(db_path: &Path) -> rusqlite::Result<Connection> {
    Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
}

/// Opens (creating if needed) and brings the schema up to date.
pub fn open_read_write(db_path: &Path) -> rusqlite::Result<Connection> {
    let connection = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    schema::configure_connection(&connection)?;
    schema::ensure_schema(&connection)?;
    Ok(connection)
}

/// Stable storage key, so re-importing a marketplace upserts in place.
pub fn category_key(marketplace: MarketplaceId, category_id: &str) -> String {
    let digest = sha256_hex(&format!("{marketplace}\u{1f}{category_id}"));
    format!("cat_{}", &digest[..ID_HASH_PREFIX])
}

fn learning_key(record: &LearningRecord, created_at: &str) -> String {
    let material = [
        record.source_marketplace_id.as_str(),
        record.source_category_name.as_str(),
        record.source_category_id.as_str(),
        record.target_marketplace_id.as_str(),
        record.target_category_name.as_str(),
        record.target_category_id.as_str(),
        if record.is_manual_correction { "1" } else { "0" },
        created_at,
    ]
    .join("\u{1f}");
    format!("lrn_{}", &sha256_hex(&material)[..ID_HASH_PREFIX])
}

pub fn load_categories(
    connection: &Connection,
    marketplace: MarketplaceId,
) -> rusqlite::Result<Vec<Category>> {
    let mut statement = connection.prepare(
        "
        SELECT id, category_name, category_id, full_path, parent_category_id
        FROM categories
        WHERE mall_name = ?1
        ORDER BY rowid ASC
        LIMIT ?2
        ",
    )?;

    let mut rows = statement.query(params![marketplace.as_str(), CATALOG_ROW_CAP as i64])?;
    let mut out = Vec::<Category>::new();

    while let Some(row) = rows.next()? {
        out.push(Category {
            id: row.get(0)?,
            marketplace_id: marketplace,
            category_name: row.get(1)?,
            category_id: row.get(2)?,
            full_path: row.get(3)?,
            parent_category_id: row.get(4)?,
        });
    }

    Ok(out)
}

pub fn find_category(
    connection: &Connection,
    marketplace: MarketplaceId,
    category_id: &str,
) -> rusqlite::Result<Option<Category>> {
    connection
        .query_row(
            "
            SELECT id, category_name, category_id, full_path, parent_category_id
            FROM categories
            WHERE mall_name = ?1 AND category_id = ?2
            LIMIT 1
            ",
            params![marketplace.as_str(), category_id],
            |row| {
                Ok(Category {
                    id: row.get(0)?,
                    marketplace_id: marketplace,
                    category_name: row.get(1)?,
                    category_id: row.get(2)?,
                    full_path: row.get(3)?,
                    parent_category_id: row.get(4)?,
                })
            },
        )
        .optional()
}

/// Inserts or refreshes `categories` in batches of [`IMPORT_BATCH_SIZE`] rows
/// per transaction. Existing rows keep their position in listing order.
pub fn upsert_categories(
    connection: &mut Connection,
    categories: &[Category],
) -> rusqlite::Result<usize> {
    let now = now_utc_string();
    let mut written = 0;

    for batch in categories.chunks(IMPORT_BATCH_SIZE) {
        let tx = connection.transaction()?;
        {
            let mut statement = tx.prepare(
                "
                INSERT INTO categories(
                  id, mall_name, category_name, category_id, full_path,
                  parent_category_id, created_at, updated_at
                )
                VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                ON CONFLICT(mall_name, category_id) DO UPDATE SET
                  category_name=excluded.category_name,
                  full_path=excluded.full_path,
                  parent_category_id=excluded.parent_category_id,
                  updated_at=excluded.updated_at
                ",
            )?;

            for category in batch {
                written += statement.execute(params![
                    category.id,
                    category.marketplace_id.as_str(),
                    category.category_name,
                    category.category_id,
                    category.full_path,
                    category.parent_category_id,
                    now,
                ])?;
            }
        }
        tx.commit()?;
        debug!(rows = batch.len(), "committed category batch");
    }

    Ok(written)
}

pub fn delete_marketplace(
    connection: &Connection,
    marketplace: MarketplaceId,
) -> rusqlite::Result<usize> {
    connection.execute(
        "DELETE FROM categories WHERE mall_name = ?1",
        [marketplace.as_str()],
    )
}

/// Returns the record's storage id. Re-recording an identical record at the
/// same instant is a no-op.
pub fn insert_learning(
    connection: &Connection,
    record: &LearningRecord,
    created_at: &str,
) -> rusqlite::Result<String> {
    let id = learning_key(record, created_at);
    connection.execute(
        "
        INSERT INTO mapping_learnings(
          id, source_mall, source_category_name, source_category_id,
          target_mall, target_category_name, target_category_id,
          is_manual_correction, created_at
        )
        VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(id) DO NOTHING
        ",
        params![
            id,
            record.source_marketplace_id.as_str(),
            record.source_category_name,
            record.source_category_id,
            record.target_marketplace_id.as_str(),
            record.target_category_name,
            record.target_category_id,
            record.is_manual_correction,
            created_at,
        ],
    )?;
    Ok(id)
}

pub fn category_counts(connection: &Connection) -> rusqlite::Result<Vec<MarketplaceCount>> {
    let mut statement =
        connection.prepare("SELECT COUNT(*) FROM categories WHERE mall_name = ?1")?;

    MarketplaceId::ALL
        .into_iter()
        .map(|marketplace| -> rusqlite::Result<MarketplaceCount> {
            let categories = statement.query_row([marketplace.as_str()], |row| row.get(0))?;
            Ok(MarketplaceCount {
                marketplace,
                categories,
            })
        })
        .collect()
}

pub fn learning_counts(connection: &Connection) -> rusqlite::Result<(i64, i64)> {
    connection.query_row(
        "SELECT COUNT(*), COALESCE(SUM(is_manual_correction), 0) FROM mapping_learnings",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> Connection {
        let connection = Connection::open_in_memory().expect("in-memory db should open");
        schema::ensure_schema(&connection).expect("schema should be created");
        connection
    }

    fn category(marketplace: MarketplaceId, category_id: &str, name: &str) -> Category {
        Category {
            id: category_key(marketplace, category_id),
            marketplace_id: marketplace,
            category_name: name.to_string(),
            category_id: category_id.to_string(),
            full_path: Some(format!("Root > {name}")),
            parent_category_id: None,
        }
    }

    fn record(manual: bool) -> LearningRecord {
        LearningRecord {
            source_marketplace_id: MarketplaceId::MercariShops,
            source_category_name: "Tシャツ".to_string(),
            source_category_id: "m-1".to_string(),
            target_marketplace_id: MarketplaceId::Rakuten,
            target_category_name: "Tシャツ".to_string(),
            target_category_id: "100371".to_string(),
            is_manual_correction: manual,
        }
    }

    #[test]
    fn category_key_is_stable_and_scoped_by_marketplace() {
        let key = category_key(MarketplaceId::Rakuten, "100371");
        assert!(key.starts_with("cat_"));
        assert_eq!(key.len(), 4 + ID_HASH_PREFIX);
        assert_eq!(key, category_key(MarketplaceId::Rakuten, "100371"));
        assert_ne!(key, category_key(MarketplaceId::YahooShopping, "100371"));
    }

    #[test]
    fn listing_keeps_insertion_order_and_marketplace_scope() {
        let mut connection = connection();
        let rows = vec![
            category(MarketplaceId::Rakuten, "30", "C"),
            category(MarketplaceId::Rakuten, "10", "A"),
            category(MarketplaceId::YahooShopping, "10", "Y"),
            category(MarketplaceId::Rakuten, "20", "B"),
        ];
        upsert_categories(&mut connection, &rows).expect("rows should insert");

        let listed = load_categories(&connection, MarketplaceId::Rakuten)
            .expect("listing should succeed");
        let ids = listed
            .iter()
            .map(|c| c.category_id.as_str())
            .collect::<Vec<&str>>();
        assert_eq!(ids, vec!["30", "10", "20"]);
        assert!(listed.iter().all(|c| c.marketplace_id == MarketplaceId::Rakuten));
        assert_eq!(listed[0].full_path.as_deref(), Some("Root > C"));
    }

    #[test]
    fn reimport_updates_in_place() {
        let mut connection = connection();
        upsert_categories(
            &mut connection,
            &[
                category(MarketplaceId::Rakuten, "1", "Old"),
                category(MarketplaceId::Rakuten, "2", "Second"),
            ],
        )
        .expect("rows should insert");
        upsert_categories(&mut connection, &[category(MarketplaceId::Rakuten, "1", "New")])
            .expect("rows should upsert");

        let listed = load_categories(&connection, MarketplaceId::Rakuten)
            .expect("listing should succeed");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].category_name, "New");
        assert_eq!(listed[1].category_name, "Second");
    }

    #[test]
    fn listing_is_capped() {
        let mut connection = connection();
        let rows = (0..CATALOG_ROW_CAP + 5)
            .map(|index| category(MarketplaceId::MercariShops, &index.to_string(), "x"))
            .collect::<Vec<Category>>();
        upsert_categories(&mut connection, &rows).expect("rows should insert");

        let listed = load_categories(&connection, MarketplaceId::MercariShops)
            .expect("listing should succeed");
        assert_eq!(listed.len(), CATALOG_ROW_CAP);
        assert_eq!(listed[0].category_id, "0");
    }

    #[test]
    fn find_and_delete_by_marketplace() {
        let mut connection = connection();
        upsert_categories(
            &mut connection,
            &[
                category(MarketplaceId::Rakuten, "1", "A"),
                category(MarketplaceId::Rakuma, "1", "B"),
            ],
        )
        .expect("rows should insert");

        let found = find_category(&connection, MarketplaceId::Rakuma, "1")
            .expect("lookup should succeed")
            .expect("category should exist");
        assert_eq!(found.category_name, "B");
        assert!(
            find_category(&connection, MarketplaceId::Rakuma, "2")
                .expect("lookup should succeed")
                .is_none()
        );

        let removed =
            delete_marketplace(&connection, MarketplaceId::Rakuten).expect("delete should succeed");
        assert_eq!(removed, 1);

        let counts = category_counts(&connection).expect("counts should load");
        let by_marketplace = counts
            .iter()
            .map(|count| (count.marketplace, count.categories))
            .collect::<Vec<(MarketplaceId, i64)>>();
        assert_eq!(
            by_marketplace,
            vec![
                (MarketplaceId::MercariShops, 0),
                (MarketplaceId::Rakuten, 0),
                (MarketplaceId::YahooShopping, 0),
                (MarketplaceId::Rakuma, 1),
            ]
        );
    }

    #[test]
    fn learnings_are_appended_with_prefixed_ids() {
        let connection = connection();

        let first = insert_learning(&connection, &record(false), "2026-01-01T00:00:00.000Z")
            .expect("learning should insert");
        let second = insert_learning(&connection, &record(true), "2026-01-01T00:00:00.000Z")
            .expect("learning should insert");
        let repeat = insert_learning(&connection, &record(false), "2026-01-01T00:00:00.000Z")
            .expect("repeat should be accepted");

        assert!(first.starts_with("lrn_"));
        assert_ne!(first, second);
        assert_eq!(first, repeat);
        assert_eq!(
            learning_counts(&connection).expect("counts should load"),
            (2, 1)
        );
    }

    #[tokio::test]
    async fn missing_database_is_reported_as_unavailable() {
        let store = SqliteStore::new(PathBuf::from("/nonexistent/category-mapper/none.sqlite"));

        let err = store
            .list_categories(MarketplaceId::Rakuten)
            .await
            .expect_err("missing database should fail");
        assert!(matches!(
            err,
            StoreError::Unavailable {
                marketplace: MarketplaceId::Rakuten,
                ..
            }
        ));
    }
}
