use crate::models::error::StoreError;
use crate::models::log_row::{PersistedRow, StoredLogRow};
use crate::repo::row_store::RowStore;
use log::{debug, info};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

type DbPool = Pool<SqliteConnectionManager>;
type Result<T> = std::result::Result<T, StoreError>;

/// SQLite-backed log table, shared through an r2d2 connection pool.
#[derive(Clone)]
pub struct SqliteRowStore {
    pool: DbPool,
}

impl SqliteRowStore {
    pub fn open(db_file: &str) -> Result<Self> {
        info!("Initializing database connection pool: {}", db_file);

        let is_in_memory = db_file == ":memory:" || db_file.starts_with("file::memory:");
        let use_wal = !is_in_memory;

        let manager = SqliteConnectionManager::file(db_file).with_init(move |conn| {
            let mut pragmas = String::from(
                "PRAGMA busy_timeout = 5000;
                 PRAGMA synchronous = NORMAL;",
            );

            if use_wal {
                pragmas.push_str(" PRAGMA journal_mode = WAL;");
            }

            conn.execute_batch(&pragmas)
        });

        // A plain ":memory:" database is private to one connection
        let pool_size = if db_file == ":memory:" {
            1
        } else {
            num_cpus::get_physical() + 2
        };
        let pool = r2d2::Pool::builder()
            .max_size(pool_size as u32)
            .build(manager)
            .map_err(|cause| StoreError::Pool {
                path: db_file.to_string(),
                cause,
            })?;

        info!("Database pool created with {} connections", pool_size);
        Ok(Self { pool })
    }

    /// Create the logs table if it is missing. The timestamp column defaults
    /// to the insertion time.
    pub fn setup_logs_table(&self, table: &str) -> Result<()> {
        info!("Initializing logs table {}", table);
        let table_ident = quote_identifier(table);
        let setup_queries = format!(
            "BEGIN;

            CREATE TABLE IF NOT EXISTS {table_ident}(
                ID        integer not null
                    primary key autoincrement,
                level     TEXT,
                message   TEXT,
                meta      TEXT,
                timestamp TEXT    not null default CURRENT_TIMESTAMP);

            COMMIT;"
        );

        let conn = self.pool.get()?;
        conn.execute_batch(&setup_queries)
            .map_err(|cause| StoreError::Query {
                operation: format!("create table {}", table),
                cause,
            })?;
        Ok(())
    }

    /// Most recent rows first.
    pub fn query_logs(&self, table: &str, limit: Option<usize>) -> Result<Vec<StoredLogRow>> {
        let conn = self.pool.get()?;

        let mut query = format!(
            "SELECT ID, level, message, meta, timestamp FROM {} ORDER BY ID DESC",
            quote_identifier(table)
        );
        if let Some(lim) = limit {
            query.push_str(&format!(" LIMIT {}", lim));
        }

        let mut stmt = conn.prepare(&query).map_err(|cause| StoreError::Query {
            operation: "query logs".to_string(),
            cause,
        })?;

        let raw_rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(|cause| StoreError::Query {
                operation: "query logs".to_string(),
                cause,
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|cause| StoreError::Query {
                operation: "collect log rows".to_string(),
                cause,
            })?;

        raw_rows
            .into_iter()
            .map(|(id, level, message, meta, timestamp)| -> Result<StoredLogRow> {
                let meta = match meta {
                    Some(text) => serde_json::from_str(&text)
                        .map_err(|cause| StoreError::Decode { id, cause })?,
                    None => serde_json::Value::Null,
                };
                Ok(StoredLogRow {
                    id,
                    level: level.unwrap_or_default(),
                    message: message.unwrap_or_default(),
                    meta,
                    timestamp,
                })
            })
            .collect()
    }

    pub fn count_logs(&self, table: &str) -> Result<u64> {
        let conn = self.pool.get()?;
        conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_identifier(table)),
            [],
            |row| row.get(0),
        )
        .map_err(|cause| StoreError::Query {
            operation: "count logs".to_string(),
            cause,
        })
    }
}

impl RowStore for SqliteRowStore {
    fn insert(&self, table: &str, row: &PersistedRow) -> Result<()> {
        let meta = serde_json::to_string(&row.meta)?;
        let conn = self.pool.get()?;

        conn.execute(
            &format!(
                "INSERT INTO {} (level, message, meta) VALUES (?1, ?2, ?3)",
                quote_identifier(table)
            ),
            (&row.level, &row.message, &meta),
        )
        .map_err(|cause| StoreError::Insert {
            table: table.to_string(),
            cause,
        })?;

        debug!("Inserted log row into {}", table);
        Ok(())
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
