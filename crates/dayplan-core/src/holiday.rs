//! Public-holiday lookup.
//!
//! Holidays come from one external HTTP service, one year per request.
//! [`HolidayBook`] keeps the holidays of the visible year and stamps each
//! request with a generation number so a late answer for a year the user
//! already left cannot overwrite the current one.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::datekey::DateKey;

pub const DEFAULT_BASE_URL: &str = "https://date.nager.at/api/v3/PublicHolidays";
pub const DEFAULT_COUNTRY: &str = "ua";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holiday {
    pub date: DateKey,
    pub local_name: String,
    pub name: String,
    pub country_code: String,
    #[serde(default)]
    pub fixed: bool,
    #[serde(default)]
    pub global: bool,
    #[serde(default)]
    pub counties: Option<Vec<String>>,
    #[serde(default)]
    pub launch_year: Option<i32>,
    #[serde(default)]
    pub types: Vec<String>,
}

/// Anything that can produce the holidays of one year.
pub trait HolidaySource {
    fn fetch_year(&self, year: i32) -> impl Future<Output = anyhow::Result<Vec<Holiday>>> + Send;
}

#[derive(Debug, Clone)]
pub struct HolidayClient {
    http: reqwest::Client,
    base_url: String,
    country: String,
}

impl HolidayClient {
    pub fn new(base_url: &str, country: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed building HTTP client for holiday lookup")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            country: country.trim().to_ascii_lowercase(),
        })
    }

    pub fn year_url(&self, year: i32) -> String {
        format!("{}/{}/{}", self.base_url, year, self.country)
    }
}

impl HolidaySource for HolidayClient {
    #[tracing::instrument(skip(self))]
    async fn fetch_year(&self, year: i32) -> anyhow::Result<Vec<Holiday>> {
        let url = self.year_url(year);
        debug!(url = %url, "requesting holidays");

        let response = self
            .http
            .get(url.as_str())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| {
                warn!(url = %url, error = %err, "holiday request failed");
                anyhow::Error::new(err).context(format!("failed requesting {url}"))
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("failed reading holiday response body from {url}"))?;

        if !status.is_success() {
            warn!(url = %url, status = %status, "holiday service returned an error status");
            return Err(anyhow!("holiday service answered {status} for {url}"));
        }

        let holidays = parse_holidays(&body).with_context(|| format!("invalid holiday data from {url}"))?;
        info!(year, count = holidays.len(), "fetched holidays");
        Ok(holidays)
    }
}

pub fn parse_holidays(body: &str) -> anyhow::Result<Vec<Holiday>> {
    let holidays: Vec<Holiday> = serde_json::from_str(body)?;
    Ok(holidays)
}

/// The first holiday listed for `date`; the service may list several.
pub fn holiday_on<'a>(holidays: &'a [Holiday], date: &DateKey) -> Option<&'a Holiday> {
    holidays.iter().find(|holiday| &holiday.date == date)
}

/// Handle for one in-flight fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HolidayTicket {
    generation: u64,
    year: i32,
}

impl HolidayTicket {
    pub fn year(&self) -> i32 {
        self.year
    }
}

#[derive(Debug, Clone, Default)]
pub struct HolidayBook {
    generation: u64,
    year: Option<i32>,
    holidays: Vec<Holiday>,
}

impl HolidayBook {
    pub fn year(&self) -> Option<i32> {
        self.year
    }

    pub fn holidays(&self) -> &[Holiday] {
        &self.holidays
    }

    /// Starts a fetch for `year`. Any ticket issued earlier becomes stale.
    /// Holidays of another year are dropped right away.
    pub fn request(&mut self, year: i32) -> HolidayTicket {
        self.generation += 1;
        if self.year != Some(year) {
            self.year = Some(year);
            self.holidays.clear();
        }
        HolidayTicket {
            generation: self.generation,
            year,
        }
    }

    /// Applies a fetch result. Returns whether it was taken; results for
    /// superseded tickets are ignored, failures leave the book without
    /// holidays for that year.
    pub fn resolve(&mut self, ticket: HolidayTicket, result: anyhow::Result<Vec<Holiday>>) -> bool {
        if ticket.generation != self.generation {
            debug!(
                year = ticket.year,
                ticket = ticket.generation,
                current = self.generation,
                "dropping stale holiday result"
            );
            return false;
        }

        match result {
            Ok(holidays) => {
                self.holidays = holidays;
                true
            }
            Err(err) => {
                error!(year = ticket.year, error = %format!("{err:#}"), "error fetching holidays");
                self.holidays.clear();
                false
            }
        }
    }

    /// Request, await and resolve in one step.
    pub async fn refresh<S: HolidaySource>(&mut self, source: &S, year: i32) -> bool {
        let ticket = self.request(year);
        let result = source.fetch_year(year).await;
        self.resolve(ticket, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
      {"date":"2026-01-01","localName":"Новий рік","name":"New Year's Day","countryCode":"UA",
       "fixed":true,"global":true,"counties":null,"launchYear":null,"types":["Public"]},
      {"date":"2026-08-24","localName":"День Незалежності","name":"Independence Day","countryCode":"UA",
       "fixed":true,"global":true,"counties":null,"launchYear":null,"types":["Public"]}
    ]"#;

    struct FixedSource;

    impl HolidaySource for FixedSource {
        async fn fetch_year(&self, year: i32) -> anyhow::Result<Vec<Holiday>> {
            if year == 2026 {
                parse_holidays(SAMPLE)
            } else {
                Err(anyhow!("service unavailable"))
            }
        }
    }

    fn key(s: &str) -> DateKey {
        s.parse().expect("valid key")
    }

    #[test]
    fn parses_service_payload() {
        let holidays = parse_holidays(SAMPLE).expect("parse");
        assert_eq!(holidays.len(), 2);
        assert_eq!(holidays[1].name, "Independence Day");
        assert_eq!(holidays[1].local_name, "День Незалежності");
        assert_eq!(holidays[1].date, key("2026-08-24"));
        assert!(holidays[1].fixed);
    }

    #[test]
    fn rejects_non_json_body() {
        assert!(parse_holidays("<html>rate limited</html>").is_err());
        assert!(parse_holidays(r#"{"status":404}"#).is_err());
    }

    #[test]
    fn url_uses_year_and_country() {
        let client = HolidayClient::new("https://example.test/api/", "UA").expect("client");
        assert_eq!(client.year_url(2026), "https://example.test/api/2026/ua");
    }

    #[test]
    fn stale_ticket_is_not_applied() {
        let mut book = HolidayBook::default();
        let old = book.request(2025);
        let current = book.request(2026);

        let late = vec![Holiday {
            date: key("2025-01-01"),
            local_name: "x".to_string(),
            name: "Stale".to_string(),
            country_code: "UA".to_string(),
            fixed: true,
            global: true,
            counties: None,
            launch_year: None,
            types: vec![],
        }];
        assert!(!book.resolve(old, Ok(late)));
        assert!(book.holidays().is_empty());

        assert!(book.resolve(current, parse_holidays(SAMPLE)));
        assert_eq!(book.year(), Some(2026));
        assert_eq!(
            holiday_on(book.holidays(), &key("2026-08-24")).map(|h| h.name.as_str()),
            Some("Independence Day")
        );
    }

    #[test]
    fn failure_leaves_year_without_holidays() {
        let mut book = HolidayBook::default();
        let ticket = book.request(2026);
        assert!(book.resolve(ticket, parse_holidays(SAMPLE)));

        let again = book.request(2026);
        assert!(!book.resolve(again, Err(anyhow!("boom"))));
        assert!(book.holidays().is_empty());
    }

    #[tokio::test]
    async fn refresh_goes_through_the_source() {
        let mut book = HolidayBook::default();
        assert!(book.refresh(&FixedSource, 2026).await);
        assert_eq!(book.holidays().len(), 2);

        assert!(!book.refresh(&FixedSource, 2027).await);
        assert_eq!(book.year(), Some(2027));
        assert!(book.holidays().is_empty());
    }
}
