//! [`SqliteStore`] — the SQLite implementation of [`PipelineStore`].

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, FixedOffset, Utc};
use rusqlite::TransactionBehavior;

use gantry_core::{
  availability::{AvailabilityRecord, IngestStats, Observation},
  facility::FacilityId,
  metadata::MetadataRow,
  pricing,
  store::PipelineStore,
  view::{AnnotationStats, JoinedRow, RebuildStats},
};

use crate::{
  Error, Result,
  encode::{RawJoinedRow, decode_dt, encode_dt},
  schema::{BOOTSTRAP, apply_migrations},
};

/// Native `INSERT .. ON CONFLICT DO UPDATE` arrived in SQLite 3.24.0.
const UPSERT_MIN_VERSION: i32 = 3_024_000;

// ─── Store ───────────────────────────────────────────────────────────────────

/// The gantry pipeline store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. A handle is
/// constructed per driver invocation and passed in explicitly; nothing here
/// is process-global.
#[derive(Clone)]
pub struct SqliteStore {
  conn:          tokio_rusqlite::Connection,
  /// Decided once at open, never rediscovered per call.
  native_upsert: bool,
}

impl SqliteStore {
  /// Open (or create) a store at `path`, set connection pragmas and apply
  /// pending migrations.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(BOOTSTRAP)?;
        apply_migrations(conn)?;
        Ok(())
      })
      .await?;

    let native_upsert = rusqlite::version_number() >= UPSERT_MIN_VERSION;
    Ok(Self { conn, native_upsert })
  }
}

// ─── Per-row write helpers ───────────────────────────────────────────────────

/// Atomic per-key upsert into the mirror. `total_count` is fill-once:
/// `COALESCE(stored, new)` keeps the first non-null value ever supplied.
fn upsert_mirror_row(
  tx: &rusqlite::Transaction<'_>,
  native_upsert: bool,
  obs: &Observation,
  seen: &str,
) -> rusqlite::Result<()> {
  if native_upsert {
    tx.execute(
      "INSERT INTO availability_current (
         facility_id, category, available_count, total_count,
         source_update_time, last_seen_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
       ON CONFLICT(facility_id, category) DO UPDATE SET
         available_count    = excluded.available_count,
         total_count        = COALESCE(availability_current.total_count,
                                       excluded.total_count),
         source_update_time = excluded.source_update_time,
         last_seen_at       = excluded.last_seen_at",
      rusqlite::params![
        obs.facility_id.as_str(),
        obs.category,
        obs.available_count,
        obs.total_count,
        obs.source_update_time,
        seen,
      ],
    )?;
    return Ok(());
  }

  // Read-modify-write fallback for runtimes without native upsert.
  let changed = tx.execute(
    "UPDATE availability_current SET
       available_count    = ?1,
       total_count        = CASE WHEN total_count IS NULL
                                 THEN ?2 ELSE total_count END,
       source_update_time = ?3,
       last_seen_at       = ?4
     WHERE facility_id = ?5 AND category = ?6",
    rusqlite::params![
      obs.available_count,
      obs.total_count,
      obs.source_update_time,
      seen,
      obs.facility_id.as_str(),
      obs.category,
    ],
  )?;

  if changed == 0 {
    tx.execute(
      "INSERT INTO availability_current (
         facility_id, category, available_count, total_count,
         source_update_time, last_seen_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
      rusqlite::params![
        obs.facility_id.as_str(),
        obs.category,
        obs.available_count,
        obs.total_count,
        obs.source_update_time,
        seen,
      ],
    )?;
  }

  Ok(())
}

/// Insert-or-ignore on the history identity. Returns whether a new row was
/// actually added.
fn append_history(
  tx: &rusqlite::Transaction<'_>,
  obs: &Observation,
  retrieved_at: &str,
) -> rusqlite::Result<bool> {
  let inserted = tx.execute(
    "INSERT OR IGNORE INTO availability_history (
       facility_id, category, available_count, source_update_time,
       retrieved_at
     ) VALUES (?1, ?2, ?3, ?4, ?5)",
    rusqlite::params![
      obs.facility_id.as_str(),
      obs.category,
      obs.available_count,
      obs.source_update_time,
      retrieved_at,
    ],
  )?;
  Ok(inserted > 0)
}

// ─── PipelineStore impl ──────────────────────────────────────────────────────

impl PipelineStore for SqliteStore {
  type Error = Error;

  async fn apply_snapshot_batch(
    &self,
    batch: Vec<Observation>,
    retrieved_at: DateTime<Utc>,
    strict_mirror: bool,
  ) -> Result<IngestStats> {
    let seen = encode_dt(retrieved_at);
    let native_upsert = self.native_upsert;

    let stats = self
      .conn
      .call(move |conn| {
        let tx =
          conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let observed = batch.len();
        let mut history_inserted = 0;
        for obs in &batch {
          upsert_mirror_row(&tx, native_upsert, obs, &seen)?;
          if append_history(&tx, obs, &seen)? {
            history_inserted += 1;
          }
        }

        // Every row touched this cycle carries `seen`; anything older was
        // not re-observed and is purged under strict-mirror policy.
        let evicted = if strict_mirror {
          tx.execute(
            "DELETE FROM availability_current WHERE last_seen_at < ?1",
            rusqlite::params![seen],
          )?
        } else {
          0
        };

        tx.commit()?;

        let snapshot_rows: i64 = conn.query_row(
          "SELECT COUNT(*) FROM availability_current",
          [],
          |r| r.get(0),
        )?;

        Ok(IngestStats {
          observed,
          history_inserted,
          evicted,
          snapshot_rows: snapshot_rows as u64,
        })
      })
      .await?;

    Ok(stats)
  }

  async fn replace_metadata(
    &self,
    rows: Vec<MetadataRow>,
    updated_at: DateTime<Utc>,
  ) -> Result<usize> {
    let updated_at_str = encode_dt(updated_at);

    let loaded = self
      .conn
      .call(move |conn| {
        let tx =
          conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute("DELETE FROM facility_metadata", [])?;

        let mut loaded = 0;
        {
          let mut insert = tx.prepare(
            "INSERT INTO facility_metadata (
               facility_id, address, x_coord, y_coord, facility_type,
               parking_system, short_term_parking, free_parking,
               night_parking, decks, gantry_height, basement, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
          )?;
          for row in &rows {
            insert.execute(rusqlite::params![
              row.facility_id.as_str(),
              row.attrs.address,
              row.attrs.x_coord,
              row.attrs.y_coord,
              row.attrs.facility_type,
              row.attrs.parking_system,
              row.attrs.short_term_parking,
              row.attrs.free_parking,
              row.attrs.night_parking,
              row.attrs.decks,
              row.attrs.gantry_height,
              row.attrs.basement,
              updated_at_str,
            ])?;
            loaded += 1;
          }
        }

        tx.commit()?;
        Ok(loaded)
      })
      .await?;

    Ok(loaded)
  }

  async fn classify_facilities(&self) -> Result<usize> {
    let tagged = self
      .conn
      .call(|conn| {
        let tx =
          conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let placeholders =
          vec!["?"; pricing::CENTRAL_FACILITIES.len()].join(", ");
        let sql = format!(
          "UPDATE facility_metadata SET is_central =
             CASE WHEN facility_id IN ({placeholders}) THEN 1 ELSE 0 END"
        );
        let tagged = tx.execute(
          &sql,
          rusqlite::params_from_iter(pricing::CENTRAL_FACILITIES.iter()),
        )?;

        tx.execute(
          "UPDATE facility_metadata SET base_rate =
             CASE WHEN is_central = 1 THEN ?1 ELSE ?2 END",
          rusqlite::params![
            pricing::CENTRAL_BASE_RATE,
            pricing::OUTSIDE_BASE_RATE,
          ],
        )?;

        tx.commit()?;
        Ok(tagged)
      })
      .await?;

    Ok(tagged)
  }

  async fn refresh_rates(&self, now: DateTime<FixedOffset>) -> Result<usize> {
    let stamped = encode_dt(now.with_timezone(&Utc));

    let updated = self
      .conn
      .call(move |conn| {
        let tx =
          conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let facilities: Vec<(String, Option<i64>, Option<String>)> = {
          let mut stmt = tx.prepare(
            "SELECT facility_id, is_central, night_parking
             FROM facility_metadata",
          )?;
          stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        let mut updated = 0;
        {
          let mut update = tx.prepare(
            "UPDATE facility_metadata SET
               current_rate      = ?1,
               active_cap_kind   = ?2,
               active_cap_amount = ?3,
               rate_updated_at   = ?4
             WHERE facility_id = ?5",
          )?;
          for (facility_id, is_central, night_parking) in facilities {
            let central = is_central.unwrap_or(0) == 1;
            let nps =
              pricing::night_service(night_parking.as_deref().unwrap_or(""));
            let quote = pricing::quote_at(central, nps, now);
            let (cap_kind, cap_amount) = match quote.cap {
              Some((kind, amount)) => (Some(kind.as_str()), Some(amount)),
              None => (None, None),
            };

            updated += update.execute(rusqlite::params![
              quote.current_rate,
              cap_kind,
              cap_amount,
              stamped,
              facility_id,
            ])?;
          }
        }

        tx.commit()?;
        Ok(updated)
      })
      .await?;

    Ok(updated)
  }

  async fn rebuild_view(&self) -> Result<RebuildStats> {
    let stats = self
      .conn
      .call(|conn| {
        let tx =
          conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // (a) carry-forward cache: lexicographically greatest non-blank
        // annotation per facility; (b) delete-all; (c) reinsert from the
        // mirror left-joined to metadata on the normalized key; (d) reapply
        // the cache.
        tx.execute_batch(
          "CREATE TEMP TABLE annotation_carry AS
             SELECT facility_id, MAX(annotation) AS annotation
             FROM availability_view
             WHERE annotation IS NOT NULL AND TRIM(annotation) <> ''
             GROUP BY facility_id;

           DELETE FROM availability_view;

           INSERT INTO availability_view (
             facility_id, category, available_count, total_count,
             source_update_time, address, x_coord, y_coord, facility_type,
             parking_system, short_term_parking, free_parking, night_parking,
             decks, gantry_height, basement, base_rate, current_rate,
             active_cap_kind, active_cap_amount, has_metadata
           )
           SELECT
             a.facility_id, a.category, a.available_count, a.total_count,
             a.source_update_time, m.address, m.x_coord, m.y_coord,
             m.facility_type, m.parking_system, m.short_term_parking,
             m.free_parking, m.night_parking, m.decks, m.gantry_height,
             m.basement, m.base_rate, m.current_rate, m.active_cap_kind,
             m.active_cap_amount,
             CASE WHEN m.facility_id IS NULL THEN 0 ELSE 1 END
           FROM availability_current AS a
           LEFT JOIN facility_metadata AS m
             ON UPPER(TRIM(a.facility_id)) = m.facility_id;

           UPDATE availability_view SET annotation =
             (SELECT c.annotation FROM annotation_carry c
               WHERE c.facility_id = availability_view.facility_id)
           WHERE EXISTS (SELECT 1 FROM annotation_carry c
                          WHERE c.facility_id = availability_view.facility_id);

           DROP TABLE annotation_carry;",
        )?;

        tx.commit()?;

        let total: i64 = conn.query_row(
          "SELECT COUNT(*) FROM availability_view",
          [],
          |r| r.get(0),
        )?;
        let unmatched: i64 = conn.query_row(
          "SELECT COUNT(*) FROM availability_view WHERE has_metadata = 0",
          [],
          |r| r.get(0),
        )?;

        Ok(RebuildStats {
          total:     total as u64,
          matched:   (total - unmatched) as u64,
          unmatched: unmatched as u64,
        })
      })
      .await?;

    Ok(stats)
  }

  async fn apply_annotations(
    &self,
    mapping: BTreeMap<FacilityId, String>,
    default_text: String,
  ) -> Result<AnnotationStats> {
    let stats = self
      .conn
      .call(move |conn| {
        let tx =
          conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Phase 1: default blank rows only, never overwriting a value.
        let defaulted = tx.execute(
          "UPDATE availability_view SET annotation = ?1
           WHERE annotation IS NULL OR TRIM(annotation) = ''",
          rusqlite::params![default_text],
        )? as u64;

        // Phase 2: mapping entries overwrite unconditionally.
        let mut mapped_applied = 0u64;
        {
          let mut apply = tx.prepare(
            "UPDATE availability_view SET annotation = ?1
             WHERE UPPER(TRIM(facility_id)) = ?2",
          )?;
          for (facility_id, text) in &mapping {
            mapped_applied +=
              apply.execute(rusqlite::params![text, facility_id.as_str()])?
                as u64;
          }
        }

        tx.commit()?;

        let total_rows: i64 = conn.query_row(
          "SELECT COUNT(*) FROM availability_view",
          [],
          |r| r.get(0),
        )?;
        let with_annotation: i64 = conn.query_row(
          "SELECT COUNT(*) FROM availability_view
           WHERE annotation IS NOT NULL
             AND TRIM(annotation) <> ''
             AND TRIM(annotation) <> ?1",
          rusqlite::params![default_text],
          |r| r.get(0),
        )?;

        Ok(AnnotationStats {
          total_rows:         total_rows as u64,
          mapped_applied,
          defaulted,
          with_annotation:    with_annotation as u64,
          without_annotation: (total_rows - with_annotation) as u64,
        })
      })
      .await?;

    Ok(stats)
  }

  async fn mirror_rows(&self) -> Result<Vec<AvailabilityRecord>> {
    let raws: Vec<(String, String, i64, Option<i64>, String, String)> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT facility_id, category, available_count, total_count,
                  source_update_time, last_seen_at
           FROM availability_current
           ORDER BY facility_id, category",
        )?;

        let rows = stmt
          .query_map([], |row| {
            Ok((
              row.get(0)?,
              row.get(1)?,
              row.get(2)?,
              row.get(3)?,
              row.get(4)?,
              row.get(5)?,
            ))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(facility, category, available, total, upstream_ts, seen)| {
        Ok(AvailabilityRecord {
          facility_id:        FacilityId::new(&facility)?,
          category,
          available_count:    available,
          total_count:        total,
          source_update_time: upstream_ts,
          last_seen_at:       decode_dt(&seen)?,
        })
      })
      .collect()
  }

  async fn view_rows(&self) -> Result<Vec<JoinedRow>> {
    let raws: Vec<RawJoinedRow> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT
             facility_id, category, available_count, total_count,
             source_update_time, address, x_coord, y_coord, facility_type,
             parking_system, short_term_parking, free_parking, night_parking,
             decks, gantry_height, basement, base_rate, current_rate,
             active_cap_kind, active_cap_amount, annotation, has_metadata
           FROM availability_view
           ORDER BY facility_id, category",
        )?;

        let rows = stmt
          .query_map([], |row| {
            Ok(RawJoinedRow {
              facility_id:        row.get(0)?,
              category:           row.get(1)?,
              available_count:    row.get(2)?,
              total_count:        row.get(3)?,
              source_update_time: row.get(4)?,
              address:            row.get(5)?,
              x_coord:            row.get(6)?,
              y_coord:            row.get(7)?,
              facility_type:      row.get(8)?,
              parking_system:     row.get(9)?,
              short_term_parking: row.get(10)?,
              free_parking:       row.get(11)?,
              night_parking:      row.get(12)?,
              decks:              row.get(13)?,
              gantry_height:      row.get(14)?,
              basement:           row.get(15)?,
              base_rate:          row.get(16)?,
              current_rate:       row.get(17)?,
              active_cap_kind:    row.get(18)?,
              active_cap_amount:  row.get(19)?,
              annotation:         row.get(20)?,
              has_metadata:       row.get(21)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawJoinedRow::into_row).collect()
  }
}

#[cfg(test)]
impl SqliteStore {
  /// Force the read-modify-write upsert path, regardless of the linked
  /// SQLite version.
  pub(crate) fn with_legacy_upsert(mut self) -> Self {
    self.native_upsert = false;
    self
  }
}
