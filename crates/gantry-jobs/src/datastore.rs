//! The facility-metadata source — paginated pull of the full attribute set.

use std::future::Future;
use std::time::Duration;

use gantry_core::{
  facility::FacilityId,
  metadata::{MetadataRow, StaticAttributes},
};
use serde::Deserialize;
use serde_json::Value;

use crate::error::FetchError;

/// Result of one full metadata pull: upstream field names (for the raw audit
/// dump) plus the typed rows.
#[derive(Debug, Clone)]
pub struct MetadataPull {
  pub fields: Vec<String>,
  pub rows:   Vec<MetadataRow>,
}

/// Pull source for the slowly-changing facility attributes.
pub trait MetadataSource: Send + Sync {
  fn pull(
    &self,
  ) -> impl Future<Output = Result<MetadataPull, FetchError>> + Send + '_;
}

// ─── Wire format ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct DatastoreResponse {
  result: DatastoreResult,
}

#[derive(Debug, Deserialize)]
struct DatastoreResult {
  #[serde(default)]
  fields:  Vec<FieldDef>,
  #[serde(default)]
  records: Vec<serde_json::Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct FieldDef {
  #[serde(default)]
  id: String,
}

fn text_field(record: &serde_json::Map<String, Value>, key: &str) -> String {
  match record.get(key) {
    Some(Value::String(s)) => s.trim().to_owned(),
    Some(Value::Number(n)) => n.to_string(),
    _ => String::new(),
  }
}

pub(crate) fn record_to_row(
  record: &serde_json::Map<String, Value>,
) -> Option<MetadataRow> {
  let raw_id = match record.get("car_park_no") {
    Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
    _ => text_field(record, "carpark_number"),
  };
  let facility_id = FacilityId::new(&raw_id).ok()?;

  Some(MetadataRow {
    facility_id,
    attrs: StaticAttributes {
      address:            text_field(record, "address"),
      x_coord:            text_field(record, "x_coord"),
      y_coord:            text_field(record, "y_coord"),
      facility_type:      text_field(record, "car_park_type"),
      parking_system:     text_field(record, "type_of_parking_system"),
      short_term_parking: text_field(record, "short_term_parking"),
      free_parking:       text_field(record, "free_parking"),
      night_parking:      text_field(record, "night_parking"),
      decks:              text_field(record, "car_park_decks"),
      gantry_height:      text_field(record, "gantry_height"),
      basement:           text_field(record, "car_park_basement"),
    },
  })
}

// ─── HTTP client ─────────────────────────────────────────────────────────────

/// Paginated datastore_search client. Keeps fetching pages until a short or
/// empty page signals end-of-data.
#[derive(Clone)]
pub struct DatastoreClient {
  client:      reqwest::Client,
  base_url:    String,
  resource_id: String,
  page_size:   usize,
}

impl DatastoreClient {
  pub fn new(
    base_url: String,
    resource_id: String,
    page_size: usize,
  ) -> Result<Self, FetchError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(30))
      .build()?;
    Ok(Self { client, base_url, resource_id, page_size })
  }
}

impl MetadataSource for DatastoreClient {
  async fn pull(&self) -> Result<MetadataPull, FetchError> {
    let mut fields: Option<Vec<String>> = None;
    let mut rows = Vec::new();
    let mut offset = 0usize;

    loop {
      let response = self
        .client
        .get(&self.base_url)
        .query(&[
          ("resource_id", self.resource_id.as_str()),
          ("limit", &self.page_size.to_string()),
          ("offset", &offset.to_string()),
        ])
        .send()
        .await?;

      if !response.status().is_success() {
        return Err(FetchError::Status(response.status()));
      }

      let page: DatastoreResponse = response.json().await?;
      let result = page.result;

      if fields.is_none() {
        fields = Some(
          result
            .fields
            .iter()
            .map(|f| f.id.clone())
            .filter(|id| id != "_id")
            .collect(),
        );
      }

      if result.records.is_empty() {
        break;
      }

      let page_len = result.records.len();
      rows.extend(result.records.iter().filter_map(record_to_row));

      if page_len < self.page_size {
        break;
      }
      offset += page_len;
    }

    Ok(MetadataPull { fields: fields.unwrap_or_default(), rows })
  }
}
