//! Visual Crossing Timeline API integration
//!
//! This module validates the requested date and fetches the raw forecast
//! for a location. The provider body is returned verbatim; field
//! extraction happens in the recommendation step.

use chrono::{Local, NaiveDate};
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// ---------------------------------------------------------------------------
/// Configuration Constants
/// ---------------------------------------------------------------------------

const WEATHER_API_BASE: &str =
  "https://weather.visualcrossing.com/VisualCrossingWebServices/rest/services/timeline";

/// Forecast elements requested from the provider
const FORECAST_ELEMENTS: &str = "datetime,address,temp,feelslike,humidity,precipprob,\
preciptype,windspeedmean,pressure,cloudcover,visibility,uvindex";

const DATE_FORMAT: &str = "%Y-%m-%d";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
  #[error("Invalid date format, expected YYYY-MM-DD")]
  InvalidDate,

  #[error("Error fetching weather data: cannot request past dates")]
  PastDate,

  #[error("HTTP request failed: {0}")]
  Request(#[from] reqwest::Error),

  #[error("Invalid provider URL: {0}")]
  Url(String),

  #[error("Error fetching weather data")]
  Upstream { status: u16 },
}

/// ---------------------------------------------------------------------------
/// Weather Client
/// ---------------------------------------------------------------------------

pub struct WeatherClient {
  client: Client,
  api_key: String,
  base_url: String,
}

impl WeatherClient {
  pub fn new(api_key: impl Into<String>) -> Self {
    Self::with_base_url(api_key, WEATHER_API_BASE)
  }

  /// Point the client at a different provider base URL (used by tests)
  pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
    Self {
      client: Client::new(),
      api_key: api_key.into(),
      base_url: base_url.into(),
    }
  }

  /// Fetch the forecast for a location and date.
  ///
  /// The date must parse as YYYY-MM-DD and be today or later. On success
  /// the provider's JSON body is returned untouched.
  pub async fn fetch_weather(
    &self,
    location: &str,
    date: &str,
  ) -> Result<serde_json::Value, WeatherError> {
    let parsed = NaiveDate::parse_from_str(date, DATE_FORMAT)
      .map_err(|_| WeatherError::InvalidDate)?;

    if parsed < Local::now().date_naive() {
      return Err(WeatherError::PastDate);
    }

    let url = self.build_url(location, date)?;

    tracing::info!(location, date, "fetching forecast");
    let response = self
      .client
      .get(url)
      .timeout(REQUEST_TIMEOUT)
      .send()
      .await?;

    let status = response.status();
    if status.as_u16() != 200 {
      tracing::warn!(status = status.as_u16(), "weather provider returned an error");
      return Err(WeatherError::Upstream {
        status: status.as_u16(),
      });
    }

    Ok(response.json().await?)
  }

  /// Build the timeline URL: `{base}/{location}/{date}` plus the fixed
  /// query parameters (metric units, forecast days only, null suppression).
  fn build_url(&self, location: &str, date: &str) -> Result<Url, WeatherError> {
    let mut url = Url::parse(&self.base_url).map_err(|e| WeatherError::Url(e.to_string()))?;

    url
      .path_segments_mut()
      .map_err(|_| WeatherError::Url("base URL cannot have segments appended".into()))?
      .push(location)
      .push(date);

    url
      .query_pairs_mut()
      .append_pair("key", &self.api_key)
      .append_pair("unitGroup", "metric")
      .append_pair("elements", FORECAST_ELEMENTS)
      .append_pair("include", "fcst,days")
      .append_pair("options", "nonulls")
      .append_pair("contentType", "json");

    Ok(url)
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
