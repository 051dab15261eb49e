use crate::asset::{Asset, AssetKind, NewAsset};
use crate::error::{MediaError, Result};
use crate::query::{AssetFilter, AssetPage, AssetSort, CategoryCount, PageRequest};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use std::path::{Path, PathBuf};
use std::time::Duration;
use ulid::Ulid;

/// Queryable store of asset records.
pub trait MetadataIndex: Send + Sync {
    /// Assign a fresh id and persist the record.
    fn insert(&self, asset: &NewAsset) -> Result<Asset>;

    fn get(&self, id: &str) -> Result<Asset>;

    fn delete(&self, id: &str) -> Result<()>;

    /// Matching records for one page plus the size of the whole filtered set.
    ///
    /// Fails with [`MediaError::PageOutOfRange`] when the page lies past the
    /// last page and at least one record matches.
    fn query(&self, filter: &AssetFilter, sort: AssetSort, page: PageRequest)
    -> Result<AssetPage>;

    /// Record counts per category among `kinds` (all kinds when empty),
    /// ascending by category.
    fn aggregate_by_category(&self, kinds: &[AssetKind]) -> Result<Vec<CategoryCount>>;

    /// Every `(id, url)` pair in the index.
    fn all_urls(&self) -> Result<Vec<(String, String)>>;
}

const ASSET_COLUMNS: &str = "id, name, kind, category, url, created_at";

/// SQLite-backed [`MetadataIndex`]. Opens a short-lived connection per call.
pub struct SqliteMetadataIndex {
    db_path: PathBuf,
}

impl SqliteMetadataIndex {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let index = Self { db_path };
        index.init_schema()?;
        tracing::info!("Opened metadata index at {:?}", index.db_path);
        Ok(index)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn get_conn(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.get_conn()?;

        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;

        // name_folded/category_folded hold lowercased copies for search.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS assets (
                pk INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                kind TEXT NOT NULL CHECK (kind IN ('image', 'icon')),
                category TEXT NOT NULL,
                url TEXT NOT NULL,
                created_at TEXT NOT NULL,
                name_folded TEXT NOT NULL,
                category_folded TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_assets_kind_category ON assets(kind, category)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_assets_created_at ON assets(created_at)",
            [],
        )?;

        Ok(())
    }
}

impl MetadataIndex for SqliteMetadataIndex {
    fn insert(&self, asset: &NewAsset) -> Result<Asset> {
        let conn = self.get_conn()?;
        let id = Ulid::new().to_string();

        conn.execute(
            "INSERT INTO assets (
                id, name, kind, category, url, created_at, name_folded, category_folded
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                asset.name,
                asset.kind.as_str(),
                asset.category,
                asset.url,
                format_timestamp(&asset.created_at),
                asset.name.to_lowercase(),
                asset.category.to_lowercase(),
            ],
        )?;

        Ok(asset.clone().into_asset(id))
    }

    fn get(&self, id: &str) -> Result<Asset> {
        let conn = self.get_conn()?;

        conn.query_row(
            &format!("SELECT {} FROM assets WHERE id = ?1", ASSET_COLUMNS),
            [id],
            asset_from_row,
        )
        .optional()?
        .ok_or_else(|| MediaError::NotFound(id.to_string()))
    }

    fn delete(&self, id: &str) -> Result<()> {
        let conn = self.get_conn()?;

        let affected = conn.execute("DELETE FROM assets WHERE id = ?1", [id])?;
        if affected == 0 {
            return Err(MediaError::NotFound(id.to_string()));
        }

        Ok(())
    }

    fn query(
        &self,
        filter: &AssetFilter,
        sort: AssetSort,
        page: PageRequest,
    ) -> Result<AssetPage> {
        let mut conn = self.get_conn()?;
        // Count and page come from the same snapshot.
        let tx = conn.transaction()?;

        let mut values = Vec::new();
        let where_sql = where_clause(filter, &mut values);

        let total: i64 = tx.query_row(
            &format!("SELECT COUNT(*) FROM assets{}", where_sql),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;
        let total = total as u64;

        let total_pages = page.total_pages(total);
        if total > 0 && page.page() > total_pages {
            return Err(MediaError::PageOutOfRange {
                page: page.page(),
                total_pages,
            });
        }

        let sql = format!(
            "SELECT {} FROM assets{} ORDER BY {} {dir}, pk {dir} LIMIT ? OFFSET ?",
            ASSET_COLUMNS,
            where_sql,
            sort.field.column(),
            dir = sort.order.keyword(),
        );
        values.push(Value::Integer(i64::from(page.page_size())));
        values.push(Value::Integer(page.offset() as i64));

        let items = {
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter()), asset_from_row)?;
            let mut items = Vec::new();
            for row in rows {
                items.push(row?);
            }
            items
        };

        Ok(AssetPage { items, total })
    }

    fn aggregate_by_category(&self, kinds: &[AssetKind]) -> Result<Vec<CategoryCount>> {
        let conn = self.get_conn()?;

        let kind_filter = AssetFilter::default().with_kinds(kinds.iter().copied());
        let mut values = Vec::new();
        let where_sql = where_clause(&kind_filter, &mut values);

        let mut stmt = conn.prepare(&format!(
            "SELECT category, COUNT(*) FROM assets{} GROUP BY category ORDER BY category ASC",
            where_sql
        ))?;

        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            let category: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok(CategoryCount {
                category,
                count: count as u64,
            })
        })?;

        let mut counts = Vec::new();
        for row in rows {
            counts.push(row?);
        }

        Ok(counts)
    }

    fn all_urls(&self) -> Result<Vec<(String, String)>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare("SELECT id, url FROM assets ORDER BY pk")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;

        let mut urls = Vec::new();
        for row in rows {
            urls.push(row?);
        }

        Ok(urls)
    }
}

fn where_clause(filter: &AssetFilter, values: &mut Vec<Value>) -> String {
    let mut clauses = Vec::new();

    if !filter.kinds.is_empty() {
        clauses.push(format!("kind IN ({})", placeholders(filter.kinds.len())));
        values.extend(
            filter
                .kinds
                .iter()
                .map(|kind| Value::Text(kind.as_str().to_string())),
        );
    }

    if !filter.categories.is_empty() {
        clauses.push(format!(
            "category IN ({})",
            placeholders(filter.categories.len())
        ));
        values.extend(filter.categories.iter().cloned().map(Value::Text));
    }

    if let Some(term) = filter.search.as_deref().filter(|term| !term.is_empty()) {
        let folded = term.to_lowercase();
        clauses.push("(instr(name_folded, ?) > 0 OR instr(category_folded, ?) > 0)".to_string());
        values.push(Value::Text(folded.clone()));
        values.push(Value::Text(folded));
    }

    if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn asset_from_row(row: &Row<'_>) -> rusqlite::Result<Asset> {
    let kind: String = row.get(2)?;
    let created_at: String = row.get(5)?;

    Ok(Asset {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: kind
            .parse::<AssetKind>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?,
        category: row.get(3)?,
        url: row.get(4)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?
            .with_timezone(&Utc),
    })
}
