//! SQL schema and the versioned migration registry.
//!
//! Migrations are ordered and applied once at store open, gated on
//! `PRAGMA user_version`. Each entry is idempotent for a fresh database and
//! never re-runs once its version is recorded. Schema evolution happens by
//! appending to [`MIGRATIONS`], never by probing `PRAGMA table_info` at call
//! sites.

/// Connection pragmas, executed on every open (they are per-connection, not
/// part of the schema version).
pub const BOOTSTRAP: &str = "
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA wal_autocheckpoint = 1000;
PRAGMA busy_timeout = 5000;
";

/// v1 — base tables: current-state mirror, append-only history, static
/// metadata, and the denormalized view.
const V1_BASE_TABLES: &str = "
CREATE TABLE availability_current (
    facility_id        TEXT NOT NULL,
    category           TEXT NOT NULL,
    available_count    INTEGER NOT NULL,
    total_count        INTEGER,            -- fill-once, never cleared
    source_update_time TEXT NOT NULL,      -- upstream timestamp, opaque
    last_seen_at       TEXT NOT NULL,      -- ingestion-cycle timestamp
    PRIMARY KEY (facility_id, category)
);
CREATE INDEX idx_current_facility ON availability_current(facility_id);
CREATE INDEX idx_current_seen     ON availability_current(last_seen_at);

-- Append-only. No UPDATE or DELETE is ever issued against this table.
CREATE TABLE availability_history (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    facility_id        TEXT NOT NULL,
    category           TEXT NOT NULL,
    available_count    INTEGER NOT NULL,
    source_update_time TEXT NOT NULL,
    retrieved_at       TEXT NOT NULL
);
CREATE UNIQUE INDEX idx_history_identity
    ON availability_history(facility_id, category, source_update_time);
CREATE INDEX idx_history_time ON availability_history(source_update_time);

CREATE TABLE facility_metadata (
    facility_id        TEXT PRIMARY KEY,   -- stored normalized
    address            TEXT,
    x_coord            TEXT,
    y_coord            TEXT,
    facility_type      TEXT,
    parking_system     TEXT,
    short_term_parking TEXT,
    free_parking       TEXT,
    night_parking      TEXT,
    decks              TEXT,
    gantry_height      TEXT,
    basement           TEXT,
    updated_at         TEXT
);

CREATE TABLE availability_view (
    facility_id        TEXT NOT NULL,
    category           TEXT NOT NULL,
    available_count    INTEGER,
    total_count        INTEGER,
    source_update_time TEXT,
    address            TEXT,
    x_coord            TEXT,
    y_coord            TEXT,
    facility_type      TEXT,
    parking_system     TEXT,
    short_term_parking TEXT,
    free_parking       TEXT,
    night_parking      TEXT,
    decks              TEXT,
    gantry_height      TEXT,
    basement           TEXT,
    has_metadata       INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (facility_id, category)
);
";

/// v2 — pricing columns on metadata and view, plus the carry-forward
/// annotation column.
const V2_PRICING_AND_ANNOTATIONS: &str = "
ALTER TABLE facility_metadata ADD COLUMN is_central        INTEGER;
ALTER TABLE facility_metadata ADD COLUMN base_rate         REAL;
ALTER TABLE facility_metadata ADD COLUMN current_rate      REAL;
ALTER TABLE facility_metadata ADD COLUMN active_cap_kind   TEXT;
ALTER TABLE facility_metadata ADD COLUMN active_cap_amount REAL;
ALTER TABLE facility_metadata ADD COLUMN rate_updated_at   TEXT;

ALTER TABLE availability_view ADD COLUMN base_rate         REAL;
ALTER TABLE availability_view ADD COLUMN current_rate      REAL;
ALTER TABLE availability_view ADD COLUMN active_cap_kind   TEXT;
ALTER TABLE availability_view ADD COLUMN active_cap_amount REAL;
ALTER TABLE availability_view ADD COLUMN annotation        TEXT;
";

/// Ordered migration registry. Index `i` brings the store to
/// `user_version = i + 1`.
pub const MIGRATIONS: &[&str] = &[V1_BASE_TABLES, V2_PRICING_AND_ANNOTATIONS];

/// Apply every migration past the recorded `user_version`, each in its own
/// transaction.
pub fn apply_migrations(conn: &mut rusqlite::Connection) -> rusqlite::Result<()> {
  let version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;

  for (idx, sql) in MIGRATIONS.iter().enumerate().skip(version as usize) {
    let tx = conn.transaction()?;
    tx.execute_batch(sql)?;
    tx.pragma_update(None, "user_version", (idx + 1) as i64)?;
    tx.commit()?;
  }

  Ok(())
}
