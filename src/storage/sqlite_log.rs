//! SQLite execution log, opened read-only through an r2d2 pool.

use std::path::{Path, PathBuf};
use std::time::Duration;

use r2d2::Pool as R2D2Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use super::{record_from_fields, schema, LoadError, LogSource, Snapshot, SnapshotVersion};

/// Connection Pool type
pub type Pool = R2D2Pool<SqliteConnectionManager>;

pub struct SqliteLog {
    path: PathBuf,
    pool: Pool,
}

impl SqliteLog {
    /// Open an existing database and check its schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(LoadError::Missing { path });
        }

        let manager = SqliteConnectionManager::file(&path)
            .with_flags(OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX)
            .with_init(|c| c.execute_batch("PRAGMA busy_timeout = 5000;"));

        let pool = R2D2Pool::builder()
            .max_size(4)
            .connection_timeout(Duration::from_secs(5))
            .build(manager)?;

        let conn = pool.get()?;
        schema::verify(&conn)?;
        drop(conn);

        Ok(Self { path, pool })
    }

}

fn current_version(conn: &Connection) -> Result<SnapshotVersion, LoadError> {
    // Rows are append-only, so count + highest id identifies the contents.
    let (count, max_id): (i64, Option<i64>) = conn.query_row(
        "SELECT COUNT(*), MAX(id) FROM executions",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(SnapshotVersion::new(format!("{count}:{}", max_id.unwrap_or(0))))
}

impl LogSource for SqliteLog {
    fn load(&self) -> Result<Snapshot, LoadError> {
        let conn = self.pool.get()?;
        let version = current_version(&conn)?;

        let mut stmt = conn.prepare(
            "SELECT id, region, pipeline_name, start_time, end_time, run_status
             FROM executions
             ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, i64>(5)?,
            ))
        })?;

        let mut records = Vec::new();
        for r in rows {
            let (id, region, pipeline_name, start_time, end_time, run_status) = r?;
            records.push(record_from_fields(
                id as usize,
                region,
                pipeline_name,
                &start_time,
                end_time.as_deref(),
                run_status,
            )?);
        }

        debug!(path = %self.path.display(), records = records.len(), %version, "loaded SQLite execution log");
        Ok(Snapshot::new(records, Some(version)))
    }

    fn version(&self) -> Result<Option<SnapshotVersion>, LoadError> {
        let conn = self.pool.get()?;
        current_version(&conn).map(Some)
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }
}
