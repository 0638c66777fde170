//! Schema of the SQLite execution log.

use rusqlite::Connection;

use super::LoadError;

/// Columns the reader selects from `executions`.
pub const EXPECTED_COLUMNS: &[&str] = &[
    "id",
    "region",
    "pipeline_name",
    "start_time",
    "end_time",
    "run_status",
];

/// Create the `executions` table and its index if missing.
pub fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS executions (
            id INTEGER PRIMARY KEY,
            region TEXT NOT NULL,
            pipeline_name TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT,
            run_status INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_executions_region_start
            ON executions(region, start_time);",
    )
}

/// Check that `executions` exists with every column the reader needs.
pub fn verify(conn: &Connection) -> Result<(), LoadError> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('executions')")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    if columns.is_empty() {
        return Err(LoadError::Schema(
            "table 'executions' does not exist".to_string(),
        ));
    }

    let missing: Vec<&str> = EXPECTED_COLUMNS
        .iter()
        .copied()
        .filter(|want| !columns.iter().any(|have| have == want))
        .collect();
    if !missing.is_empty() {
        return Err(LoadError::Schema(format!(
            "table 'executions' is missing columns: {}",
            missing.join(", ")
        )));
    }

    Ok(())
}
