//! Driver tests against stub sources and a real in-memory store.

use std::collections::BTreeMap;
use std::io;
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use gantry_core::{
  availability::Observation,
  facility::FacilityId,
  metadata::{CapKind, MetadataRow, StaticAttributes},
  store::PipelineStore,
  view::JoinedRow,
};
use gantry_store_sqlite::SqliteStore;

use crate::{
  annotations::{parse_annotation_csv, AnnotationSource},
  datastore::record_to_row,
  error::FetchError,
  export,
  feed::{flatten_payload, AvailabilityFeed, FeedPayload},
  jobs::{AnnotationJob, AvailabilityJob, MetadataJob, PricingJob},
  publish::BlobPublisher,
};

// ─── Stubs ───────────────────────────────────────────────────────────────────

struct StubFeed {
  batch: Vec<Observation>,
}

impl AvailabilityFeed for StubFeed {
  async fn pull(&self) -> Result<Vec<Observation>, FetchError> {
    Ok(self.batch.clone())
  }
}

#[derive(Clone, Default)]
struct MemPublisher {
  published: Arc<Mutex<Vec<(String, String)>>>,
}

impl MemPublisher {
  fn keys(&self) -> Vec<String> {
    self
      .published
      .lock()
      .unwrap()
      .iter()
      .map(|(key, _)| key.clone())
      .collect()
  }

  fn body_of(&self, key: &str) -> Option<String> {
    self
      .published
      .lock()
      .unwrap()
      .iter()
      .find(|(k, _)| k == key)
      .map(|(_, body)| body.clone())
  }
}

impl BlobPublisher for MemPublisher {
  async fn publish(
    &self,
    key: &str,
    body: Vec<u8>,
    _content_type: &str,
  ) -> io::Result<String> {
    let body = String::from_utf8(body)
      .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    self.published.lock().unwrap().push((key.to_owned(), body));
    Ok(key.to_owned())
  }
}

struct BrokenPublisher;

impl BlobPublisher for BrokenPublisher {
  async fn publish(
    &self,
    _key: &str,
    _body: Vec<u8>,
    _content_type: &str,
  ) -> io::Result<String> {
    Err(io::Error::other("bucket offline"))
  }
}

struct StubMetadata {
  rows: Vec<MetadataRow>,
}

impl crate::datastore::MetadataSource for StubMetadata {
  async fn pull(&self) -> Result<crate::datastore::MetadataPull, FetchError> {
    Ok(crate::datastore::MetadataPull {
      fields: vec!["address".to_owned()],
      rows:   self.rows.clone(),
    })
  }
}

struct StubAnnotations {
  mapping: BTreeMap<FacilityId, String>,
}

impl AnnotationSource for StubAnnotations {
  async fn load(&self) -> Result<BTreeMap<FacilityId, String>, FetchError> {
    Ok(self.mapping.clone())
  }
}

fn fid(s: &str) -> FacilityId { FacilityId::new(s).unwrap() }

fn obs(facility: &str, category: &str, available: i64) -> Observation {
  Observation {
    facility_id:        fid(facility),
    category:           category.to_owned(),
    available_count:    available,
    total_count:        Some(100),
    source_update_time: "2025-06-04T08:00:00".to_owned(),
  }
}

// ─── Feed parsing ────────────────────────────────────────────────────────────

#[test]
fn feed_payload_flattens_and_skips_blank_facilities() {
  let raw = r#"{
    "items": [{
      "carpark_data": [
        {
          "carpark_number": "acb",
          "update_datetime": "2025-06-04T08:00:00",
          "carpark_info": [
            { "lot_type": "C", "lots_available": "10", "total_lots": "100" },
            { "lot_type": "Y", "lots_available": "junk", "total_lots": "" }
          ]
        },
        {
          "carpark_number": "  ",
          "update_datetime": "2025-06-04T08:00:00",
          "carpark_info": [
            { "lot_type": "C", "lots_available": "5", "total_lots": "50" }
          ]
        }
      ]
    }]
  }"#;

  let payload: FeedPayload = serde_json::from_str(raw).unwrap();
  let batch = flatten_payload(payload);

  assert_eq!(batch.len(), 2);
  assert_eq!(batch[0].facility_id.as_str(), "ACB");
  assert_eq!(batch[0].category, "C");
  assert_eq!(batch[0].available_count, 10);
  assert_eq!(batch[0].total_count, Some(100));
  // Garbled counts degrade instead of dropping the observation.
  assert_eq!(batch[1].category, "Y");
  assert_eq!(batch[1].available_count, 0);
  assert_eq!(batch[1].total_count, None);
}

#[test]
fn metadata_record_maps_either_key_spelling() {
  let record: serde_json::Map<String, serde_json::Value> =
    serde_json::from_str(
      r#"{ "car_park_no": "acb ", "address": "1 Example Rd", "car_park_decks": 5 }"#,
    )
    .unwrap();
  let row = record_to_row(&record).unwrap();
  assert_eq!(row.facility_id.as_str(), "ACB");
  assert_eq!(row.attrs.address, "1 Example Rd");
  assert_eq!(row.attrs.decks, "5");

  let record: serde_json::Map<String, serde_json::Value> =
    serde_json::from_str(r#"{ "carpark_number": "bbb" }"#).unwrap();
  assert_eq!(record_to_row(&record).unwrap().facility_id.as_str(), "BBB");

  let record: serde_json::Map<String, serde_json::Value> =
    serde_json::from_str(r#"{ "address": "no id" }"#).unwrap();
  assert!(record_to_row(&record).is_none());
}

// ─── Annotation CSV ──────────────────────────────────────────────────────────

#[test]
fn annotation_csv_resolves_header_aliases() {
  let text = "\u{feff}Car Park No,EV Lot Location\nacb,Deck 2A\nBBB,Near lift\n";
  let mapping = parse_annotation_csv(text).unwrap();
  assert_eq!(mapping.len(), 2);
  assert_eq!(mapping[&fid("ACB")], "Deck 2A");
  assert_eq!(mapping[&fid("BBB")], "Near lift");
}

#[test]
fn annotation_csv_first_non_blank_value_wins() {
  let text = "facility_id,annotation\nACB,\nACB,Deck 2A\nACB,Deck 9Z\n";
  let mapping = parse_annotation_csv(text).unwrap();
  assert_eq!(mapping.len(), 1);
  assert_eq!(mapping[&fid("ACB")], "Deck 2A");
}

#[test]
fn annotation_csv_honours_quoted_fields() {
  let text =
    "facility_id,annotation\nACB,\"Deck 2A, beside lift \"\"B\"\"\"\n\nBBB,Roof\n";
  let mapping = parse_annotation_csv(text).unwrap();
  assert_eq!(mapping[&fid("ACB")], "Deck 2A, beside lift \"B\"");
  assert_eq!(mapping[&fid("BBB")], "Roof");
}

#[test]
fn annotation_csv_keeps_newlines_inside_quoted_fields() {
  let text =
    "facility_id,annotation\r\nACB,\"Deck 2A\nnear lift lobby\"\r\nBBB,Roof\r\n";
  let mapping = parse_annotation_csv(text).unwrap();
  assert_eq!(mapping.len(), 2);
  assert_eq!(mapping[&fid("ACB")], "Deck 2A\nnear lift lobby");
  assert_eq!(mapping[&fid("BBB")], "Roof");
}

#[test]
fn annotation_csv_rejects_missing_columns() {
  let err = parse_annotation_csv("facility_id,notes\nACB,hello\n").unwrap_err();
  assert!(matches!(err, FetchError::Malformed(_)));

  let err = parse_annotation_csv("").unwrap_err();
  assert!(matches!(err, FetchError::Malformed(_)));
}

// ─── Exports ─────────────────────────────────────────────────────────────────

fn sample_row() -> JoinedRow {
  JoinedRow {
    facility_id:        "ACB".to_owned(),
    category:           "C".to_owned(),
    available_count:    7,
    total_count:        Some(100),
    source_update_time: "2025-06-04T08:00:00".to_owned(),
    address:            Some("1 Example Rd, Blk \"A\"".to_owned()),
    x_coord:            Some("30314.78".to_owned()),
    y_coord:            Some("31490.93".to_owned()),
    facility_type:      Some("MULTI-STOREY CAR PARK".to_owned()),
    parking_system:     Some("ELECTRONIC PARKING".to_owned()),
    short_term_parking: Some("WHOLE DAY".to_owned()),
    free_parking:       Some("NO".to_owned()),
    night_parking:      Some("YES".to_owned()),
    decks:              Some("5".to_owned()),
    gantry_height:      Some("2.15".to_owned()),
    basement:           Some("N".to_owned()),
    base_rate:          Some(1.2),
    current_rate:       Some(1.2),
    cap_kind:           Some(CapKind::Day),
    cap_amount:         Some(20.0),
    annotation:         Some("Deck 2A".to_owned()),
    has_metadata:       true,
  }
}

#[test]
fn view_csv_quotes_delimiters_and_embedded_quotes() {
  let csv = export::view_to_csv(&[sample_row()]);
  let mut lines = csv.lines();

  assert_eq!(lines.next().unwrap(), export::VIEW_CSV_HEADER.join(","));
  let row = lines.next().unwrap();
  assert!(row.starts_with("ACB,C,7,100,2025-06-04T08:00:00,"));
  assert!(row.contains("\"1 Example Rd, Blk \"\"A\"\"\""));
  assert!(row.contains("DAY_CAP,20,"));
  assert!(row.ends_with(",Deck 2A,1"));
  assert!(lines.next().is_none());
}

#[test]
fn view_csv_leaves_missing_metadata_blank() {
  let row = JoinedRow {
    address: None,
    annotation: None,
    base_rate: None,
    current_rate: None,
    cap_kind: None,
    cap_amount: None,
    has_metadata: false,
    ..sample_row()
  };
  let csv = export::view_to_csv(&[row]);
  let data = csv.lines().nth(1).unwrap();
  assert!(data.ends_with(",,0"));
}

#[test]
fn artifact_keys_are_timestamped_under_the_prefix() {
  let at = Utc.with_ymd_and_hms(2025, 6, 4, 8, 15, 0).unwrap();
  assert_eq!(
    export::artifact_key("dumps/view/", "combined", "csv", at),
    "dumps/view/combined_20250604-081500.csv"
  );
}

// ─── Drivers ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn availability_job_ingests_rebuilds_and_publishes() {
  let publisher = MemPublisher::default();
  let job = AvailabilityJob {
    store:         SqliteStore::open_in_memory().await.unwrap(),
    feed:          StubFeed { batch: vec![obs("ACB", "C", 7), obs("BBB", "C", 3)] },
    publisher:     publisher.clone(),
    strict_mirror: true,
    export_prefix: "dumps/availability".to_owned(),
  };

  let report = job.run().await.unwrap();

  assert_eq!(report.ingest.observed, 2);
  assert_eq!(report.ingest.history_inserted, 2);
  assert_eq!(report.rebuild.total, 2);
  assert_eq!(report.rebuild.unmatched, 2);

  let keys = publisher.keys();
  assert_eq!(keys.len(), 2);
  assert!(keys[0].starts_with("dumps/availability/observations_"));
  assert!(keys[1].starts_with("dumps/availability/combined_"));
  assert_eq!(report.raw_key.as_deref(), Some(keys[0].as_str()));

  let csv = publisher.body_of(&keys[1]).unwrap();
  assert_eq!(csv.lines().count(), 3);
}

#[tokio::test]
async fn availability_job_survives_publish_failures() {
  let job = AvailabilityJob {
    store:         SqliteStore::open_in_memory().await.unwrap(),
    feed:          StubFeed { batch: vec![obs("ACB", "C", 7)] },
    publisher:     BrokenPublisher,
    strict_mirror: false,
    export_prefix: "dumps/availability".to_owned(),
  };

  // The cycle's data is committed; only the audit keys go missing.
  let report = job.run().await.unwrap();
  assert_eq!(report.ingest.observed, 1);
  assert!(report.raw_key.is_none());
  assert!(report.view_key.is_none());
}

fn meta(facility: &str, night_parking: &str) -> MetadataRow {
  MetadataRow {
    facility_id: fid(facility),
    attrs:       StaticAttributes {
      address: format!("{facility} street"),
      night_parking: night_parking.to_owned(),
      ..Default::default()
    },
  }
}

#[tokio::test]
async fn pricing_job_prices_all_known_facilities() {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let seed = AvailabilityJob {
    store:         store.clone(),
    feed:          StubFeed { batch: vec![obs("ACB", "C", 7), obs("ZZZ9", "C", 3)] },
    publisher:     MemPublisher::default(),
    strict_mirror: false,
    export_prefix: "dumps/availability".to_owned(),
  };
  seed.run().await.unwrap();
  store
    .replace_metadata(vec![meta("ACB", "YES"), meta("ZZZ9", "NO")], Utc::now())
    .await
    .unwrap();

  let job = PricingJob {
    store,
    publisher: MemPublisher::default(),
    export_prefix: "dumps/pricing".to_owned(),
  };
  // Wednesday 10:00 civil time.
  let now = gantry_core::pricing::civil_offset()
    .with_ymd_and_hms(2025, 6, 4, 10, 0, 0)
    .unwrap();
  let report = job.run_at(now).await.unwrap();

  assert_eq!(report.classified, 2);
  assert_eq!(report.repriced, 2);

  let rows = job.store.view_rows().await.unwrap();
  let acb = rows.iter().find(|r| r.facility_id == "ACB").unwrap();
  let zzz = rows.iter().find(|r| r.facility_id == "ZZZ9").unwrap();
  assert_eq!(acb.current_rate, Some(1.2));
  assert_eq!(acb.cap_amount, Some(20.0));
  assert_eq!(zzz.base_rate, Some(0.6));
  assert_eq!(zzz.cap_amount, Some(12.0));
}

#[tokio::test]
async fn metadata_job_replaces_reprices_and_rebuilds() {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let seed = AvailabilityJob {
    store:         store.clone(),
    feed:          StubFeed { batch: vec![obs("ACB", "C", 7), obs("XYZ", "C", 3)] },
    publisher:     MemPublisher::default(),
    strict_mirror: false,
    export_prefix: "dumps/availability".to_owned(),
  };
  seed.run().await.unwrap();

  let publisher = MemPublisher::default();
  let job = MetadataJob {
    store,
    source: StubMetadata { rows: vec![meta("ACB", "YES")] },
    publisher: publisher.clone(),
    export_prefix: "dumps/metadata".to_owned(),
  };

  let report = job.run().await.unwrap();
  assert_eq!(report.records_pulled, 1);
  assert_eq!(report.rows_loaded, 1);
  assert_eq!(report.classified, 1);
  assert_eq!(report.repriced, 1);
  assert_eq!(report.rebuild.total, 2);
  assert_eq!(report.rebuild.matched, 1);
  assert_eq!(report.rebuild.unmatched, 1);

  let rows = job.store.view_rows().await.unwrap();
  let acb = rows.iter().find(|r| r.facility_id == "ACB").unwrap();
  let xyz = rows.iter().find(|r| r.facility_id == "XYZ").unwrap();
  assert!(acb.has_metadata);
  assert_eq!(acb.address.as_deref(), Some("ACB street"));
  assert_eq!(acb.base_rate, Some(1.2));
  assert!(acb.current_rate.is_some());
  assert!(!xyz.has_metadata);
  assert_eq!(xyz.base_rate, None);

  let keys = publisher.keys();
  assert_eq!(keys.len(), 2);
  assert!(keys[0].starts_with("dumps/metadata/info_"));
  assert!(keys[1].starts_with("dumps/metadata/combined_"));
}

#[tokio::test]
async fn annotation_job_merges_mapping_over_defaults() {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let seed = AvailabilityJob {
    store:         store.clone(),
    feed:          StubFeed { batch: vec![obs("ACB", "C", 7), obs("BBB", "C", 3)] },
    publisher:     MemPublisher::default(),
    strict_mirror: false,
    export_prefix: "dumps/availability".to_owned(),
  };
  seed.run().await.unwrap();

  let publisher = MemPublisher::default();
  let job = AnnotationJob {
    store,
    source: StubAnnotations {
      mapping: BTreeMap::from([(fid("ACB"), "Deck 2A".to_owned())]),
    },
    publisher: publisher.clone(),
    default_text: "No charger".to_owned(),
    export_prefix: "dumps/annotations".to_owned(),
  };

  let report = job.run().await.unwrap();
  assert_eq!(report.mapping_size, 1);
  assert_eq!(report.stats.total_rows, 2);
  assert_eq!(report.stats.mapped_applied, 1);
  assert_eq!(report.stats.defaulted, 2);
  assert_eq!(report.stats.with_annotation, 1);

  let rows = job.store.view_rows().await.unwrap();
  let acb = rows.iter().find(|r| r.facility_id == "ACB").unwrap();
  let bbb = rows.iter().find(|r| r.facility_id == "BBB").unwrap();
  assert_eq!(acb.annotation.as_deref(), Some("Deck 2A"));
  assert_eq!(bbb.annotation.as_deref(), Some("No charger"));

  assert_eq!(publisher.keys().len(), 1);
  assert!(publisher.keys()[0].starts_with("dumps/annotations/view_snapshot_"));
}
