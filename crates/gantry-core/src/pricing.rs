//! Time-dependent pricing rules.
//!
//! Pure functions of a fixed-offset civil clock (UTC+8) and two per-facility
//! flags. Two independent axes:
//!
//! - the *central rate window* (07:00–17:00, Mon–Sat) decides the effective
//!   half-hour rate;
//! - the *cap windows* (day 07:00–22:30, night 22:30–07:00) decide which cap
//!   applies.
//!
//! The axes deliberately disagree between 17:00 and 22:30 on weekdays:
//! central facilities are back to the off-peak rate but still under the day
//! cap. The source tariff defines them separately; do not unify.

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc};

use crate::{facility::FacilityId, metadata::CapKind};

/// Facilities in the central-area premium set.
pub const CENTRAL_FACILITIES: [&str; 16] = [
  "ACB", "BBB", "BRB1", "CY", "DUXM", "HLM", "KAB", "KAM", "KAS", "PRM",
  "SLS", "SR1", "SR2", "TPM", "UCS", "WCB",
];

pub const CENTRAL_BASE_RATE: f64 = 1.2;
pub const OUTSIDE_BASE_RATE: f64 = 0.6;
pub const NIGHT_CAP_AMOUNT: f64 = 5.0;
pub const DAY_CAP_CENTRAL: f64 = 20.0;
pub const DAY_CAP_OUTSIDE: f64 = 12.0;

/// The civil-time offset all windows are defined in (UTC+8).
pub fn civil_offset() -> FixedOffset {
  FixedOffset::east_opt(8 * 3600).expect("UTC+8 is in range")
}

/// Current wall-clock time in the civil offset.
pub fn civil_now() -> DateTime<FixedOffset> {
  Utc::now().with_timezone(&civil_offset())
}

pub fn is_central_facility(id: &FacilityId) -> bool {
  CENTRAL_FACILITIES.contains(&id.as_str())
}

pub fn base_rate(is_central: bool) -> f64 {
  if is_central { CENTRAL_BASE_RATE } else { OUTSIDE_BASE_RATE }
}

/// `night_parking` attribute values starting with "YES" opt the facility
/// into the night parking scheme.
pub fn night_service(night_parking_attr: &str) -> bool {
  night_parking_attr.trim().to_uppercase().starts_with("YES")
}

// ─── Windows ─────────────────────────────────────────────────────────────────

fn minute_of_day(at: DateTime<FixedOffset>) -> u32 {
  at.hour() * 60 + at.minute()
}

/// Night window: 22:30–07:00, wrapping midnight.
pub fn in_night_window(at: DateTime<FixedOffset>) -> bool {
  let m = minute_of_day(at);
  m >= 22 * 60 + 30 || m < 7 * 60
}

/// Day window: 07:00–22:30, the disjoint complement of the night window.
pub fn in_day_window(at: DateTime<FixedOffset>) -> bool {
  let m = minute_of_day(at);
  m >= 7 * 60 && m < 22 * 60 + 30
}

// ─── Quotes ──────────────────────────────────────────────────────────────────

/// The rate fields written back per facility on a pricing pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateQuote {
  pub current_rate: f64,
  pub cap:          Option<(CapKind, f64)>,
}

/// Effective half-hour rate at this instant.
///
/// 1.2 only for central facilities during 07:00–17:00 Mon–Sat; 0.6 otherwise.
pub fn current_rate(is_central: bool, at: DateTime<FixedOffset>) -> f64 {
  let workday = at.weekday().num_days_from_monday() <= 5; // Mon..=Sat
  if is_central && workday && (7..17).contains(&at.hour()) {
    CENTRAL_BASE_RATE
  } else {
    OUTSIDE_BASE_RATE
  }
}

/// Active cap at this instant. The night cap takes priority over the day cap
/// when a facility offers night service.
pub fn active_cap(
  is_central: bool,
  night_service: bool,
  at: DateTime<FixedOffset>,
) -> Option<(CapKind, f64)> {
  if night_service && in_night_window(at) {
    Some((CapKind::Night, NIGHT_CAP_AMOUNT))
  } else if in_day_window(at) {
    let amount = if is_central { DAY_CAP_CENTRAL } else { DAY_CAP_OUTSIDE };
    Some((CapKind::Day, amount))
  } else {
    None
  }
}

/// Full quote for one facility at one instant.
pub fn quote_at(
  is_central: bool,
  night_service: bool,
  at: DateTime<FixedOffset>,
) -> RateQuote {
  RateQuote {
    current_rate: current_rate(is_central, at),
    cap:          active_cap(is_central, night_service, at),
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<FixedOffset> {
    civil_offset()
      .with_ymd_and_hms(y, mo, d, h, mi, 0)
      .unwrap()
  }

  #[test]
  fn windows_are_disjoint_and_wrap() {
    // 2025-06-04 is a Wednesday.
    let night_late = at(2025, 6, 4, 23, 0);
    let night_early = at(2025, 6, 4, 3, 15);
    let boundary_night = at(2025, 6, 4, 22, 30);
    let boundary_day = at(2025, 6, 4, 7, 0);
    let last_day_minute = at(2025, 6, 4, 22, 29);

    assert!(in_night_window(night_late) && !in_day_window(night_late));
    assert!(in_night_window(night_early) && !in_day_window(night_early));
    assert!(in_night_window(boundary_night) && !in_day_window(boundary_night));
    assert!(in_day_window(boundary_day) && !in_night_window(boundary_day));
    assert!(in_day_window(last_day_minute) && !in_night_window(last_day_minute));
  }

  #[test]
  fn central_weekday_morning_gets_premium_rate_and_day_cap() {
    let q = quote_at(true, true, at(2025, 6, 4, 10, 0)); // Wed 10:00
    assert_eq!(q.current_rate, 1.2);
    assert_eq!(q.cap, Some((CapKind::Day, 20.0)));
  }

  #[test]
  fn central_late_night_gets_offpeak_rate_and_night_cap() {
    let q = quote_at(true, true, at(2025, 6, 4, 23, 0)); // Wed 23:00
    assert_eq!(q.current_rate, 0.6);
    assert_eq!(q.cap, Some((CapKind::Night, 5.0)));
  }

  #[test]
  fn night_cap_requires_night_service() {
    let q = quote_at(true, false, at(2025, 6, 4, 23, 0));
    assert_eq!(q.cap, None);
    assert_eq!(q.current_rate, 0.6);
  }

  #[test]
  fn outside_facility_day_cap_is_lower() {
    let q = quote_at(false, false, at(2025, 6, 4, 12, 0));
    assert_eq!(q.current_rate, 0.6);
    assert_eq!(q.cap, Some((CapKind::Day, 12.0)));
  }

  #[test]
  fn central_sunday_morning_is_offpeak() {
    // 2025-06-08 is a Sunday.
    let q = quote_at(true, true, at(2025, 6, 8, 10, 0));
    assert_eq!(q.current_rate, 0.6);
    assert_eq!(q.cap, Some((CapKind::Day, 20.0)));
  }

  #[test]
  fn central_saturday_counts_as_workday() {
    // 2025-06-07 is a Saturday.
    assert_eq!(current_rate(true, at(2025, 6, 7, 10, 0)), 1.2);
  }

  #[test]
  fn axes_disagree_on_weekday_evening() {
    // 17:00–22:30 weekday: off-peak rate, still under the day cap.
    let q = quote_at(true, true, at(2025, 6, 4, 19, 0));
    assert_eq!(q.current_rate, 0.6);
    assert_eq!(q.cap, Some((CapKind::Day, 20.0)));
  }

  #[test]
  fn rate_window_end_is_exclusive() {
    assert_eq!(current_rate(true, at(2025, 6, 4, 17, 0)), 0.6);
    assert_eq!(current_rate(true, at(2025, 6, 4, 16, 59)), 1.2);
  }

  #[test]
  fn night_service_attr_parsing() {
    assert!(night_service("YES"));
    assert!(night_service(" yes (from 10.30pm) "));
    assert!(!night_service("NO"));
    assert!(!night_service(""));
  }

  #[test]
  fn central_set_lookup() {
    assert!(is_central_facility(&FacilityId::new("acb").unwrap()));
    assert!(!is_central_facility(&FacilityId::new("BM29").unwrap()));
  }
}
