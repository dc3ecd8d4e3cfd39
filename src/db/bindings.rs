use diesel::prelude::*;

use crate::db::Recording;

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = crate::schema::recordings)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RecordingRow {
    pub id: i32,
    pub name: String,
}

impl From<RecordingRow> for Recording {
    fn from(row: RecordingRow) -> Self {
        Recording {
            id: row.id,
            name: row.name,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::recordings)]
pub struct NewRecording<'a> {
    pub name: &'a str,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::fingerprints)]
pub struct NewFingerprint {
    pub hash: i64,
    pub recording_id: i32,
    pub anchor_time_ms: i64,
}
