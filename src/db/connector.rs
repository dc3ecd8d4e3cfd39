use std::collections::HashMap;

use diesel::connection::SimpleConnection;
use diesel::dsl::{delete, insert_into};
use diesel::prelude::*;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::db::bindings::{NewFingerprint, NewRecording, RecordingRow};
use crate::db::{CorpusHit, CorpusIndex, Recording, RecordingId};
use crate::error::StorageError;
use crate::fingerprint::Fingerprint;
use crate::schema::{fingerprints, recordings};

/// Rows per multi-row INSERT; three bound parameters each.
const BATCH_SIZE: usize = 5000;
/// Hashes per `IN (...)` lookup.
const LOOKUP_CHUNK: usize = 900;

pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
CREATE TABLE IF NOT EXISTS recordings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE TABLE IF NOT EXISTS fingerprints (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    hash BIGINT NOT NULL,
    recording_id INTEGER NOT NULL REFERENCES recordings(id) ON DELETE CASCADE,
    anchor_time_ms BIGINT NOT NULL
);
CREATE INDEX IF NOT EXISTS fingerprints_hash_idx ON fingerprints (hash);
"#;

/// Corpus stored in SQLite through diesel.
///
/// The connection is opened once and lent out to one call at a time; the
/// guard is released when each call returns, on success or error.
pub struct SqliteIndex {
    connection: Mutex<SqliteConnection>,
}

impl SqliteIndex {
    pub fn open(database_url: &str) -> Result<Self, StorageError> {
        let mut connection = SqliteConnection::establish(database_url)?;
        connection
            .batch_execute(SCHEMA)
            .map_err(|e| StorageError::Setup(e.to_string()))?;

        info!(database_url, "opened corpus");
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        Self::open(":memory:")
    }

    fn with_connection<T>(
        &self,
        call: impl FnOnce(&mut SqliteConnection) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut connection = self.connection.lock();
        call(&mut connection)
    }
}

fn write_fingerprints(
    conn: &mut SqliteConnection,
    recording_id: RecordingId,
    fingerprints: &[Fingerprint],
) -> Result<usize, StorageError> {
    let rows: Vec<NewFingerprint> = fingerprints
        .iter()
        .map(|fp| NewFingerprint {
            hash: fp.hash as i64,
            recording_id,
            anchor_time_ms: fp.anchor_time_ms as i64,
        })
        .collect();

    let mut written = 0;
    for batch in rows.chunks(BATCH_SIZE) {
        written += insert_into(fingerprints::table).values(batch).execute(conn)?;
    }
    debug!(recording_id, written, "stored fingerprints");
    Ok(written)
}

fn to_hit((recording_id, anchor_time_ms, recording_name): (i32, i64, String)) -> CorpusHit {
    CorpusHit {
        recording_id,
        anchor_time_ms: anchor_time_ms as u32,
        recording_name,
    }
}

impl CorpusIndex for SqliteIndex {
    fn create_recording(&self, name: &str) -> Result<RecordingId, StorageError> {
        self.with_connection(|conn| {
            let id = insert_into(recordings::table)
                .values(&NewRecording { name })
                .returning(recordings::id)
                .get_result::<i32>(conn)?;
            Ok(id)
        })
    }

    fn store_fingerprints(
        &self,
        recording_id: RecordingId,
        fingerprints: &[Fingerprint],
    ) -> Result<usize, StorageError> {
        self.with_connection(|conn| {
            conn.transaction::<_, StorageError, _>(|conn| {
                let known: i64 = recordings::table
                    .filter(recordings::id.eq(recording_id))
                    .count()
                    .get_result(conn)?;
                if known == 0 {
                    return Err(StorageError::UnknownRecording(recording_id));
                }
                write_fingerprints(conn, recording_id, fingerprints)
            })
        })
    }

    fn insert_recording(
        &self,
        name: &str,
        fingerprints: &[Fingerprint],
    ) -> Result<RecordingId, StorageError> {
        self.with_connection(|conn| {
            conn.transaction::<_, StorageError, _>(|conn| {
                let recording_id = insert_into(recordings::table)
                    .values(&NewRecording { name })
                    .returning(recordings::id)
                    .get_result::<i32>(conn)?;
                write_fingerprints(conn, recording_id, fingerprints)?;
                Ok(recording_id)
            })
        })
    }

    fn lookup(&self, hash: u32) -> Result<Vec<CorpusHit>, StorageError> {
        self.with_connection(|conn| {
            let rows = fingerprints::table
                .inner_join(recordings::table)
                .filter(fingerprints::hash.eq(hash as i64))
                .order(fingerprints::id.asc())
                .select((
                    fingerprints::recording_id,
                    fingerprints::anchor_time_ms,
                    recordings::name,
                ))
                .load::<(i32, i64, String)>(conn)?;
            Ok(rows.into_iter().map(to_hit).collect())
        })
    }

    fn lookup_many(&self, hashes: &[u32]) -> Result<HashMap<u32, Vec<CorpusHit>>, StorageError> {
        let mut unique: Vec<i64> = hashes.iter().map(|&h| h as i64).collect();
        unique.sort_unstable();
        unique.dedup();

        self.with_connection(|conn| {
            let mut grouped: HashMap<u32, Vec<CorpusHit>> = HashMap::new();
            for chunk in unique.chunks(LOOKUP_CHUNK) {
                let rows = fingerprints::table
                    .inner_join(recordings::table)
                    .filter(fingerprints::hash.eq_any(chunk.to_vec()))
                    .order(fingerprints::id.asc())
                    .select((
                        fingerprints::hash,
                        fingerprints::recording_id,
                        fingerprints::anchor_time_ms,
                        recordings::name,
                    ))
                    .load::<(i64, i32, i64, String)>(conn)?;

                for (hash, recording_id, anchor_time_ms, name) in rows {
                    grouped
                        .entry(hash as u32)
                        .or_default()
                        .push(to_hit((recording_id, anchor_time_ms, name)));
                }
            }
            Ok(grouped)
        })
    }

    fn recordings(&self) -> Result<Vec<Recording>, StorageError> {
        self.with_connection(|conn| {
            let rows = recordings::table
                .order(recordings::id.asc())
                .select(RecordingRow::as_select())
                .load::<RecordingRow>(conn)?;
            Ok(rows.into_iter().map(Recording::from).collect())
        })
    }

    fn recording(&self, id: RecordingId) -> Result<Option<Recording>, StorageError> {
        self.with_connection(|conn| {
            let row = recordings::table
                .find(id)
                .select(RecordingRow::as_select())
                .first::<RecordingRow>(conn)
                .optional()?;
            Ok(row.map(Recording::from))
        })
    }

    fn delete_recording(&self, id: RecordingId) -> Result<bool, StorageError> {
        self.with_connection(|conn| {
            conn.transaction::<_, StorageError, _>(|conn| {
                delete(fingerprints::table.filter(fingerprints::recording_id.eq(id))).execute(conn)?;
                let removed = delete(recordings::table.find(id)).execute(conn)?;
                Ok(removed > 0)
            })
        })
    }

    fn clear_all(&self) -> Result<(), StorageError> {
        self.with_connection(|conn| {
            conn.transaction::<_, StorageError, _>(|conn| {
                let removed_fingerprints = delete(fingerprints::table).execute(conn)?;
                let removed_recordings = delete(recordings::table).execute(conn)?;
                info!(removed_fingerprints, removed_recordings, "cleared corpus");
                Ok(())
            })
        })
    }
}
