//! The availability feed — periodic pull of facility/category observations.

use std::future::Future;
use std::time::Duration;

use gantry_core::{availability::Observation, facility::FacilityId};
use serde::Deserialize;

use crate::error::FetchError;

/// Pull source for availability observations.
pub trait AvailabilityFeed: Send + Sync {
  fn pull(
    &self,
  ) -> impl Future<Output = Result<Vec<Observation>, FetchError>> + Send + '_;
}

// ─── Wire format ─────────────────────────────────────────────────────────────

// The upstream payload nests observations two levels deep and reports all
// counts as strings.

#[derive(Debug, Deserialize)]
pub(crate) struct FeedPayload {
  #[serde(default)]
  items: Vec<FeedItem>,
}

#[derive(Debug, Deserialize)]
struct FeedItem {
  #[serde(default)]
  carpark_data: Vec<FacilityEntry>,
}

#[derive(Debug, Deserialize)]
struct FacilityEntry {
  #[serde(default)]
  carpark_number:  String,
  #[serde(default)]
  update_datetime: String,
  #[serde(default)]
  carpark_info:    Vec<LotEntry>,
}

#[derive(Debug, Deserialize)]
struct LotEntry {
  #[serde(default)]
  lot_type:       String,
  #[serde(default)]
  lots_available: String,
  #[serde(default)]
  total_lots:     String,
}

pub(crate) fn flatten_payload(payload: FeedPayload) -> Vec<Observation> {
  let mut observations = Vec::new();

  for item in payload.items {
    for entry in item.carpark_data {
      let facility_id = match FacilityId::new(&entry.carpark_number) {
        Ok(id) => id,
        Err(_) => {
          tracing::warn!(
            raw = %entry.carpark_number,
            "skipping feed entry with blank facility id"
          );
          continue;
        }
      };

      for lot in entry.carpark_info {
        // Missing or garbled counts read as 0 available; an absent total
        // stays None so fill-once semantics hold downstream.
        let available_count =
          lot.lots_available.trim().parse::<i64>().unwrap_or(0);
        let total_count = lot.total_lots.trim().parse::<i64>().ok();

        observations.push(Observation {
          facility_id: facility_id.clone(),
          category: lot.lot_type.trim().to_owned(),
          available_count,
          total_count,
          source_update_time: entry.update_datetime.clone(),
        });
      }
    }
  }

  observations
}

// ─── HTTP client ─────────────────────────────────────────────────────────────

/// Reqwest-backed feed client for the data.gov.sg availability endpoint.
#[derive(Clone)]
pub struct HttpFeed {
  client:  reqwest::Client,
  url:     String,
  api_key: Option<String>,
}

impl HttpFeed {
  pub fn new(url: String, api_key: Option<String>) -> Result<Self, FetchError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(30))
      .build()?;
    Ok(Self { client, url, api_key })
  }
}

impl AvailabilityFeed for HttpFeed {
  async fn pull(&self) -> Result<Vec<Observation>, FetchError> {
    let mut request = self.client.get(&self.url);
    if let Some(key) = &self.api_key {
      request = request.header("X-Api-Key", key);
    }

    let response = request.send().await?;
    if !response.status().is_success() {
      return Err(FetchError::Status(response.status()));
    }

    let payload: FeedPayload = response.json().await?;
    Ok(flatten_payload(payload))
  }
}
