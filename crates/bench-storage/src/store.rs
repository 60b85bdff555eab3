//! SQLite-backed [`MeasurementStore`].
//!
//! # Schema
//!
//! ```text
//! measurements
//!   id               INTEGER PRIMARY KEY
//!   chip_id          TEXT
//!   measurement_type TEXT     TestKind variant name
//!   parameter1       TEXT
//!   parameter2       TEXT
//!   temperature      REAL
//!   data             BLOB     WFB1 + bincode(WaveformBundle)
//!   result           TEXT     "Passed" | "Failed"
//!   time_stamp       TEXT     UTC, "%Y-%m-%d %H:%M:%S%.6f"
//! ```
//!
//! Timestamps are fixed-width text, so string comparison in SQL orders them
//! chronologically.

use std::path::{Path, PathBuf};

use bench_core::codec;
use bench_core::error::{BenchError, BenchResult};
use bench_core::record::{MeasurementField, MeasurementRecord, MeasurementSummary, TestKind};
use bench_core::waveform::WaveformBundle;
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

/// Text layout of the `time_stamp` column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS measurements (
    id INTEGER PRIMARY KEY,
    chip_id TEXT NOT NULL,
    measurement_type TEXT NOT NULL,
    parameter1 TEXT NOT NULL DEFAULT '',
    parameter2 TEXT NOT NULL DEFAULT '',
    temperature REAL NOT NULL DEFAULT 22.0,
    data BLOB NOT NULL,
    result TEXT NOT NULL,
    time_stamp TEXT NOT NULL
);";

const SUMMARY_COLUMNS: &str =
    "id, chip_id, measurement_type, parameter1, parameter2, temperature, result, time_stamp";

/// Columns that identify a repeated measurement.
const IDENTITY_COLUMNS: &str = "chip_id, measurement_type, parameter1, parameter2, temperature";

fn storage(e: rusqlite::Error) -> BenchError {
    BenchError::Storage(e.to_string())
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(text: &str) -> BenchResult<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| BenchError::Storage(format!("bad time_stamp '{text}': {e}")))
}

/// A row as SQLite returns it, before the text columns are parsed.
struct RawSummary {
    id: i64,
    chip_id: String,
    kind: String,
    parameter1: String,
    parameter2: String,
    temperature: f64,
    result: String,
    time_stamp: String,
}

impl RawSummary {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            chip_id: row.get(1)?,
            kind: row.get(2)?,
            parameter1: row.get(3)?,
            parameter2: row.get(4)?,
            temperature: row.get(5)?,
            result: row.get(6)?,
            time_stamp: row.get(7)?,
        })
    }

    fn parse(self) -> BenchResult<MeasurementSummary> {
        Ok(MeasurementSummary {
            id: self.id,
            chip_id: self.chip_id,
            test_kind: self.kind.parse().map_err(BenchError::Storage)?,
            parameter1: self.parameter1,
            parameter2: self.parameter2,
            temperature: self.temperature,
            result: self.result.parse().map_err(BenchError::Storage)?,
            timestamp: parse_timestamp(&self.time_stamp)?,
        })
    }
}

/// Handle to one measurement database.
///
/// The connection closes on drop; call [`MeasurementStore::close`] to see
/// the error if closing fails.
pub struct MeasurementStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl MeasurementStore {
    /// Open (or create) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> BenchResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(storage)?;
        let store = Self::init(conn, Some(path.to_path_buf()))?;
        info!(path = %path.display(), "measurement store opened");
        Ok(store)
    }

    /// Private database that disappears when the store is dropped.
    pub fn open_in_memory() -> BenchResult<Self> {
        Self::init(Connection::open_in_memory().map_err(storage)?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> BenchResult<Self> {
        conn.execute_batch(SCHEMA).map_err(storage)?;
        Ok(Self { conn, path })
    }

    /// File backing this store, `None` when in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Persist a record and return its new id.
    ///
    /// `record.id` is ignored.
    pub fn insert(&self, record: &MeasurementRecord) -> BenchResult<i64> {
        let blob = codec::encode(&record.bundle)?;
        self.conn
            .execute(
                "INSERT INTO measurements (chip_id, measurement_type, data, result, \
                 parameter1, parameter2, temperature, time_stamp) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.chip_id,
                    record.test_kind.as_str(),
                    blob,
                    record.result.as_str(),
                    record.parameter1,
                    record.parameter2,
                    record.temperature,
                    format_timestamp(&record.timestamp),
                ],
            )
            .map_err(storage)?;
        let id = self.conn.last_insert_rowid();
        debug!(id, chip_id = %record.chip_id, kind = %record.test_kind, "measurement stored");
        Ok(id)
    }

    /// Keep only the newest row of every repeated measurement.
    ///
    /// Rows are duplicates when chip, kind, both parameters and temperature
    /// all match; the one with the highest id survives. Returns the number of
    /// rows removed.
    pub fn prune_duplicates(&self) -> BenchResult<usize> {
        let sql = format!(
            "DELETE FROM measurements WHERE id NOT IN \
             (SELECT MAX(id) FROM measurements GROUP BY {IDENTITY_COLUMNS})"
        );
        let removed = self.conn.execute(&sql, []).map_err(storage)?;
        info!(removed, "duplicate measurements pruned");
        Ok(removed)
    }

    /// Delete every row stamped strictly before `cutoff`.
    pub fn delete_before(&self, cutoff: DateTime<Utc>) -> BenchResult<usize> {
        let removed = self
            .conn
            .execute(
                "DELETE FROM measurements WHERE time_stamp < ?1",
                params![format_timestamp(&cutoff)],
            )
            .map_err(storage)?;
        info!(removed, %cutoff, "old measurements deleted");
        Ok(removed)
    }

    /// Load one full record, waveform included.
    pub fn get(&self, id: i64) -> BenchResult<Option<MeasurementRecord>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {SUMMARY_COLUMNS}, data FROM measurements WHERE id = ?1"),
                params![id],
                |row| Ok((RawSummary::from_row(row)?, row.get::<_, Vec<u8>>(8)?)),
            )
            .optional()
            .map_err(storage)?;

        let Some((raw, blob)) = row else {
            return Ok(None);
        };
        let summary = raw.parse()?;
        Ok(Some(MeasurementRecord {
            id: Some(summary.id),
            chip_id: summary.chip_id,
            test_kind: summary.test_kind,
            parameter1: summary.parameter1,
            parameter2: summary.parameter2,
            temperature: summary.temperature,
            bundle: codec::decode(&blob)?,
            result: summary.result,
            timestamp: summary.timestamp,
        }))
    }

    /// Decode only the waveform of one row.
    pub fn bundle(&self, id: i64) -> BenchResult<Option<WaveformBundle>> {
        self.conn
            .query_row(
                "SELECT data FROM measurements WHERE id = ?1",
                params![id],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()
            .map_err(storage)?
            .map(|blob| codec::decode(&blob))
            .transpose()
    }

    /// Every row without its blob, in id order.
    pub fn summaries(&self) -> BenchResult<Vec<MeasurementSummary>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {SUMMARY_COLUMNS} FROM measurements ORDER BY id"
            ))
            .map_err(storage)?;
        let raw = stmt
            .query_map([], RawSummary::from_row)
            .map_err(storage)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(storage)?;
        raw.into_iter().map(RawSummary::parse).collect()
    }

    /// Delete the given ids in one transaction. Unknown ids are skipped.
    pub fn delete_ids(&self, ids: &[i64]) -> BenchResult<usize> {
        let tx = self.conn.unchecked_transaction().map_err(storage)?;
        let mut removed = 0;
        {
            let mut stmt = tx
                .prepare("DELETE FROM measurements WHERE id = ?1")
                .map_err(storage)?;
            for id in ids {
                removed += stmt.execute(params![id]).map_err(storage)?;
            }
        }
        tx.commit().map_err(storage)?;
        debug!(requested = ids.len(), removed, "measurements deleted");
        Ok(removed)
    }

    /// Delete the single oldest row of `kind`. Returns 0 if there is none.
    pub fn delete_oldest(&self, kind: TestKind) -> BenchResult<usize> {
        self.conn
            .execute(
                "DELETE FROM measurements WHERE id = \
                 (SELECT id FROM measurements WHERE measurement_type = ?1 \
                  ORDER BY time_stamp ASC, id ASC LIMIT 1)",
                params![kind.as_str()],
            )
            .map_err(storage)
    }

    /// Id of the newest row in every group of repeated measurements.
    pub fn newest_unique_ids(&self) -> BenchResult<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT MAX(id) FROM measurements GROUP BY {IDENTITY_COLUMNS} ORDER BY 1"
            ))
            .map_err(storage)?;
        let ids = stmt
            .query_map([], |row| row.get(0))
            .map_err(storage)?
            .collect::<rusqlite::Result<Vec<i64>>>()
            .map_err(storage)?;
        Ok(ids)
    }

    /// Distinct values stored in one metadata column, sorted.
    ///
    /// Temperatures are rendered with `f64` Display, so `25.0` reads `"25"`.
    pub fn distinct_values(&self, field: MeasurementField) -> BenchResult<Vec<String>> {
        let column = field.column();
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT DISTINCT {column} FROM measurements ORDER BY {column}"
            ))
            .map_err(storage)?;
        let values = stmt
            .query_map([], |row| row.get::<_, Value>(0))
            .map_err(storage)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(storage)?;
        Ok(values
            .into_iter()
            .filter_map(|value| match value {
                Value::Text(s) => Some(s),
                Value::Real(f) => Some(f.to_string()),
                Value::Integer(i) => Some(i.to_string()),
                Value::Null | Value::Blob(_) => None,
            })
            .collect())
    }

    /// Close the connection, reporting any error.
    pub fn close(self) -> BenchResult<()> {
        self.conn.close().map_err(|(_, e)| storage(e))
    }
}
