// Mirrors the tables created by `db::connector::SCHEMA`.

diesel::table! {
    fingerprints (id) {
        id -> Integer,
        hash -> BigInt,
        recording_id -> Integer,
        anchor_time_ms -> BigInt,
    }
}

diesel::table! {
    recordings (id) {
        id -> Integer,
        name -> Text,
    }
}

diesel::joinable!(fingerprints -> recordings (recording_id));

diesel::allow_tables_to_appear_in_same_query!(fingerprints, recordings);
