use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{
  Datelike,
  Days,
  NaiveDate
};
use serde::{
  Deserialize,
  Deserializer,
  Serialize,
  Serializer
};

const MAX_KEY_YEAR: i32 = 9999;

/// Canonical `YYYY-MM-DD` day key.
///
/// Tasks, holidays and grid cells are all joined on this key, so it is
/// kept to four-digit years: every key splits into exactly three numeric
/// parts on `-`.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash
)]
pub struct DateKey(NaiveDate);

impl DateKey {
  pub fn from_date(
    date: NaiveDate
  ) -> Option<Self> {
    if (0..=MAX_KEY_YEAR)
      .contains(&date.year())
    {
      Some(Self(date))
    } else {
      None
    }
  }

  /// Builds a key from a day, a zero-based month and a year, normalizing
  /// overflow the way calendar arithmetic does: day 0 is the last day of
  /// the previous month, month 12 is January of the next year.
  pub fn from_parts(
    day: i64,
    month: i64,
    year: i64
  ) -> Option<Self> {
    let total_months = year
      .checked_mul(12)?
      .checked_add(month)?;
    let year = i32::try_from(
      total_months.div_euclid(12)
    )
    .ok()?;
    let month =
      total_months.rem_euclid(12) as u32
        + 1;

    let first =
      NaiveDate::from_ymd_opt(
        year, month, 1
      )?;
    let offset = day.checked_sub(1)?;
    let date = if offset >= 0 {
      first.checked_add_days(Days::new(
        offset.unsigned_abs()
      ))?
    } else {
      first.checked_sub_days(Days::new(
        offset.unsigned_abs()
      ))?
    };

    Self::from_date(date)
  }

  #[must_use]
  pub fn date(&self) -> NaiveDate {
    self.0
  }

  #[must_use]
  pub fn year(&self) -> i32 {
    self.0.year()
  }

  #[must_use]
  pub fn month(&self) -> u32 {
    self.0.month()
  }

  #[must_use]
  pub fn day(&self) -> u32 {
    self.0.day()
  }
}

/// `format(day, month, year)` with a zero-based month.
///
/// Returns `None` only when the normalized date falls outside the
/// four-digit year range.
#[must_use]
pub fn format_date(
  day: i64,
  month: i64,
  year: i64
) -> Option<String> {
  DateKey::from_parts(day, month, year)
    .map(|key| key.to_string())
}

#[must_use]
pub fn days_in_month(
  year: i32,
  month: u32
) -> u32 {
  let (next_year, next_month) =
    if month >= 12 {
      (year.saturating_add(1), 1_u32)
    } else {
      (year, month + 1)
    };
  NaiveDate::from_ymd_opt(
    next_year, next_month, 1
  )
  .and_then(|first| first.pred_opt())
  .map(|last| last.day())
  .unwrap_or(31)
}

impl fmt::Display for DateKey {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "{:04}-{:02}-{:02}",
      self.0.year(),
      self.0.month(),
      self.0.day()
    )
  }
}

impl FromStr for DateKey {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let mut parts = s.split('-');
    let (
      Some(year),
      Some(month),
      Some(day),
      None
    ) = (
      parts.next(),
      parts.next(),
      parts.next(),
      parts.next()
    )
    else {
      return Err(anyhow!(
        "expected YYYY-MM-DD, got: {s}"
      ));
    };

    let widths_ok = year.len() == 4
      && month.len() == 2
      && day.len() == 2;
    let digits_ok = [year, month, day]
      .iter()
      .all(|part| {
        part
          .bytes()
          .all(|b| b.is_ascii_digit())
      });
    if !widths_ok || !digits_ok {
      return Err(anyhow!(
        "expected YYYY-MM-DD, got: {s}"
      ));
    }

    let date = NaiveDate::from_ymd_opt(
      year.parse()?,
      month.parse()?,
      day.parse()?
    )
    .ok_or_else(|| {
      anyhow!("not a calendar day: {s}")
    })?;

    Self::from_date(date).ok_or_else(
      || anyhow!("year out of range: {s}")
    )
  }
}

impl Serialize for DateKey {
  fn serialize<S>(
    &self,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer
      .collect_str(&self.to_string())
  }
}

impl<'de> Deserialize<'de> for DateKey {
  fn deserialize<D>(
    deserializer: D
  ) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw =
      String::deserialize(deserializer)?;
    raw.parse::<DateKey>().map_err(
      serde::de::Error::custom
    )
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashSet;

  use super::*;

  fn key(s: &str) -> DateKey {
    s.parse().expect("valid key")
  }

  #[test]
  fn month_input_is_zero_based() {
    assert_eq!(
      format_date(1, 2, 2025).as_deref(),
      Some("2025-03-01")
    );
  }

  #[test]
  fn overflow_normalizes_like_calendar_arithmetic()
  {
    assert_eq!(
      format_date(0, 2, 2024).as_deref(),
      Some("2024-02-29")
    );
    assert_eq!(
      format_date(1, 12, 2025).as_deref(),
      Some("2026-01-01")
    );
    assert_eq!(
      format_date(31, -1, 2025)
        .as_deref(),
      Some("2024-12-31")
    );
    assert_eq!(
      format_date(32, 0, 2025).as_deref(),
      Some("2025-02-01")
    );
    assert_eq!(
      format_date(-1, 0, 2025).as_deref(),
      Some("2024-12-30")
    );
  }

  #[test]
  fn out_of_range_years_have_no_key() {
    assert!(
      format_date(1, 0, 10_000).is_none()
    );
    assert!(
      format_date(1, 0, i64::MAX).is_none()
    );
  }

  #[test]
  fn keys_are_injective_and_reparse() {
    let mut seen = HashSet::new();
    for month in 0..12 {
      for day in
        1..=days_in_month(2024, month + 1)
      {
        let text = format_date(
          i64::from(day),
          i64::from(month),
          2024
        )
        .expect("in range");
        assert!(seen.insert(text.clone()));

        let parts: Vec<i64> = text
          .split('-')
          .map(|p| {
            p.parse().expect("numeric")
          })
          .collect();
        let again = format_date(
          parts[2],
          parts[1] - 1,
          parts[0]
        )
        .expect("in range");
        assert_eq!(again, text);
      }
    }
    assert_eq!(seen.len(), 366);
  }

  #[test]
  fn parse_is_strict() {
    assert!(
      "2025-3-01"
        .parse::<DateKey>()
        .is_err()
    );
    assert!(
      "2025-02-30"
        .parse::<DateKey>()
        .is_err()
    );
    assert!(
      "2025-02-01-01"
        .parse::<DateKey>()
        .is_err()
    );
    assert!(
      "+025-02-01"
        .parse::<DateKey>()
        .is_err()
    );
    assert_eq!(
      key("0999-01-05").to_string(),
      "0999-01-05"
    );
  }

  #[test]
  fn serde_uses_the_string_form() {
    let json = serde_json::to_string(
      &key("2026-10-16")
    )
    .expect("serialize");
    assert_eq!(json, "\"2026-10-16\"");

    let back: DateKey =
      serde_json::from_str(&json)
        .expect("deserialize");
    assert_eq!(back, key("2026-10-16"));
    assert!(
      serde_json::from_str::<DateKey>(
        "\"16.10.2026\""
      )
      .is_err()
    );
  }

  #[test]
  fn days_in_month_handles_leap_years() {
    assert_eq!(days_in_month(2024, 2), 29);
    assert_eq!(days_in_month(2025, 2), 28);
    assert_eq!(days_in_month(2025, 12), 31);
    assert_eq!(days_in_month(2025, 4), 30);
  }
}
