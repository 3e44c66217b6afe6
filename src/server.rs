//! HTTP surface: routing, request validation, and response assembly
//!
//! One POST endpoint drives the whole pipeline: validate the body and
//! shared token, fetch the forecast, generate the recommendation, and
//! merge everything into a single envelope.

use axum::{
  extract::State,
  http::StatusCode,
  response::{Html, IntoResponse, Response},
  routing::{get, post},
  Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::llm::{OpenRouterClient, RecommendationResult};
use crate::weather::{WeatherClient, WeatherError};

/// ---------------------------------------------------------------------------
/// Application State
/// ---------------------------------------------------------------------------

/// Shared across requests; holds only configuration and the two upstream
/// clients, nothing mutable.
pub struct AppState {
  pub config: AppConfig,
  pub weather: WeatherClient,
  pub llm: OpenRouterClient,
}

impl AppState {
  pub fn new(config: AppConfig) -> Self {
    let weather = WeatherClient::new(&config.weather_api_key);
    let llm = OpenRouterClient::new(&config.openrouter_api_key);
    Self {
      config,
      weather,
      llm,
    }
  }
}

/// ---------------------------------------------------------------------------
/// Router
/// ---------------------------------------------------------------------------

pub fn router(state: Arc<AppState>) -> Router {
  Router::new()
    .route("/", get(home_page))
    .route("/content/api/v1/weather", post(weather_endpoint))
    .with_state(state)
}

async fn home_page() -> Html<&'static str> {
  Html(include_str!("../static/index.html"))
}

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
  #[error("{0}")]
  Validation(String),

  #[error("wrong API token")]
  Auth,

  #[error("Error fetching weather data")]
  Upstream { status: u16 },

  #[error("{0}")]
  Internal(String),
}

impl From<WeatherError> for ApiError {
  fn from(e: WeatherError) -> Self {
    match e {
      WeatherError::InvalidDate | WeatherError::PastDate => ApiError::Validation(e.to_string()),
      WeatherError::Upstream { status } => ApiError::Upstream { status },
      // Transport failure: no provider status to forward
      WeatherError::Request(_) => ApiError::Upstream { status: 502 },
      WeatherError::Url(e) => ApiError::Internal(e),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::Validation(_) => StatusCode::BAD_REQUEST,
      ApiError::Auth => StatusCode::FORBIDDEN,
      ApiError::Upstream { status } => {
        StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
      }
      ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (status, Json(json!({ "message": self.to_string() }))).into_response()
  }
}

/// ---------------------------------------------------------------------------
/// Request Validation
/// ---------------------------------------------------------------------------

const REQUIRED_PARAMS: [&str; 4] = ["token", "location", "date", "requester_name"];

struct ValidatedRequest {
  location: String,
  date: String,
  requester_name: String,
}

fn validate_request(body: &Value, api_token: &str) -> Result<ValidatedRequest, ApiError> {
  for param in REQUIRED_PARAMS {
    if is_falsy(body.get(param)) {
      return Err(ApiError::Validation(format!("{} is required", param)));
    }
  }

  if body.get("token").and_then(Value::as_str) != Some(api_token) {
    return Err(ApiError::Auth);
  }

  Ok(ValidatedRequest {
    location: require_str(body, "location")?,
    date: require_str(body, "date")?,
    requester_name: require_str(body, "requester_name")?,
  })
}

fn require_str(body: &Value, key: &str) -> Result<String, ApiError> {
  body
    .get(key)
    .and_then(Value::as_str)
    .map(str::to_string)
    .ok_or_else(|| ApiError::Validation(format!("{} is required", key)))
}

/// Absent, null, empty string/collection, zero, and false all count as
/// missing. Extra body fields are ignored.
fn is_falsy(value: Option<&Value>) -> bool {
  match value {
    None | Some(Value::Null) => true,
    Some(Value::Bool(b)) => !b,
    Some(Value::String(s)) => s.is_empty(),
    Some(Value::Number(n)) => n.as_f64() == Some(0.0),
    Some(Value::Array(a)) => a.is_empty(),
    Some(Value::Object(o)) => o.is_empty(),
  }
}

/// ---------------------------------------------------------------------------
/// Weather Endpoint
/// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ResultEnvelope {
  pub requester_name: String,
  pub timestamp: String,
  pub location: String,
  pub date: String,
  pub weather: Value,
  pub sports_recommendation: RecommendationResult,
}

async fn weather_endpoint(
  State(state): State<Arc<AppState>>,
  Json(body): Json<Value>,
) -> Result<Json<ResultEnvelope>, ApiError> {
  let request = validate_request(&body, &state.config.api_token)?;
  let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

  let weather = state
    .weather
    .fetch_weather(&request.location, &request.date)
    .await?;

  // Recommendation failures never fail the request; the weather data is
  // returned either way.
  let outcome = state.llm.recommend(&weather).await;
  if let Err(e) = &outcome {
    tracing::warn!("recommendation failed: {}", e);
  }
  let sports_recommendation = RecommendationResult::from_outcome(outcome);

  Ok(Json(ResultEnvelope {
    requester_name: request.requester_name,
    timestamp,
    location: request.location,
    date: request.date,
    weather,
    sports_recommendation,
  }))
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use axum::body::Body;
  use axum::http::Request;
  use chrono::{Duration as ChronoDuration, Local};
  use tower::ServiceExt;

  const TEST_TOKEN: &str = "T";

  fn tomorrow() -> String {
    (Local::now().date_naive() + ChronoDuration::days(1))
      .format("%Y-%m-%d")
      .to_string()
  }

  fn test_app(weather_url: &str, llm_url: &str) -> Router {
    let config = AppConfig {
      api_token: TEST_TOKEN.to_string(),
      weather_api_key: "wx-key".to_string(),
      openrouter_api_key: "or-key".to_string(),
      bind_addr: "127.0.0.1:0".to_string(),
    };
    router(Arc::new(AppState {
      config,
      weather: WeatherClient::with_base_url("wx-key", weather_url),
      llm: OpenRouterClient::with_api_url("or-key", format!("{}/chat", llm_url)),
    }))
  }

  /// App whose upstream calls would fail; good enough for tests that
  /// never get past validation.
  fn validation_app() -> Router {
    test_app("http://127.0.0.1:1", "http://127.0.0.1:1")
  }

  async fn post_weather(app: Router, body: Value) -> (StatusCode, Value) {
    let response = app
      .oneshot(
        Request::builder()
          .method("POST")
          .uri("/content/api/v1/weather")
          .header("content-type", "application/json")
          .body(Body::from(body.to_string()))
          .unwrap(),
      )
      .await
      .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
      .await
      .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap();
    (status, json)
  }

  fn valid_body(date: &str) -> Value {
    json!({
      "token": TEST_TOKEN,
      "location": "Paris",
      "date": date,
      "requester_name": "Alice",
    })
  }

  fn weather_days(date: &str) -> String {
    json!({
      "days": [{
        "datetime": date,
        "temp": 20,
        "feelslike": 19,
        "precipprob": 10,
        "windspeedmean": 5,
        "humidity": 60,
        "cloudcover": 20,
        "visibility": 10,
        "uvindex": 4,
        "pressure": 1013,
      }]
    })
    .to_string()
  }

  fn llm_body() -> String {
    let content = "```json\n{\"sports_recommendation\": {\"activity_recommendation\": \"Perfect running weather.\", \"health_safety\": \"Bring water.\"}}\n```";
    json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] })
      .to_string()
  }

  #[tokio::test]
  async fn test_home_page_renders() {
    let response = validation_app()
      .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
      .await
      .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn test_missing_fields_are_named() {
    for param in REQUIRED_PARAMS {
      let mut body = valid_body("2030-06-01");
      body.as_object_mut().unwrap().remove(param);

      let (status, json) = post_weather(validation_app(), body).await;
      assert_eq!(status, StatusCode::BAD_REQUEST);
      assert_eq!(json["message"], format!("{} is required", param));
    }
  }

  #[tokio::test]
  async fn test_empty_field_is_missing() {
    let mut body = valid_body("2030-06-01");
    body["location"] = json!("");

    let (status, json) = post_weather(validation_app(), body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "location is required");
  }

  #[tokio::test]
  async fn test_wrong_token_is_forbidden() {
    let mut body = valid_body("2030-06-01");
    body["token"] = json!("not-the-token");

    let (status, json) = post_weather(validation_app(), body).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["message"], "wrong API token");
  }

  #[tokio::test]
  async fn test_malformed_date_is_rejected() {
    let (status, json) = post_weather(validation_app(), valid_body("06/01/2030")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Invalid date format, expected YYYY-MM-DD");
  }

  #[tokio::test]
  async fn test_past_date_is_rejected() {
    let yesterday = (Local::now().date_naive() - ChronoDuration::days(1))
      .format("%Y-%m-%d")
      .to_string();

    let (status, json) = post_weather(validation_app(), valid_body(&yesterday)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
      json["message"],
      "Error fetching weather data: cannot request past dates"
    );
  }

  #[tokio::test]
  async fn test_weather_provider_status_is_forwarded() {
    let mut weather_server = mockito::Server::new_async().await;
    let date = tomorrow();

    weather_server
      .mock("GET", format!("/Paris/{}", date).as_str())
      .match_query(mockito::Matcher::Any)
      .with_status(503)
      .create_async()
      .await;

    let app = test_app(&weather_server.url(), "http://127.0.0.1:1");
    let (status, json) = post_weather(app, valid_body(&date)).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["message"], "Error fetching weather data");
  }

  #[tokio::test]
  async fn test_full_pipeline_returns_envelope() {
    let mut weather_server = mockito::Server::new_async().await;
    let mut llm_server = mockito::Server::new_async().await;
    let date = tomorrow();

    weather_server
      .mock("GET", format!("/Paris/{}", date).as_str())
      .match_query(mockito::Matcher::Any)
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(weather_days(&date))
      .create_async()
      .await;

    llm_server
      .mock("POST", "/chat")
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(llm_body())
      .create_async()
      .await;

    let app = test_app(&weather_server.url(), &llm_server.url());
    let (status, json) = post_weather(app, valid_body(&date)).await;

    assert_eq!(status, StatusCode::OK);

    // Requester metadata round-trips verbatim
    assert_eq!(json["requester_name"], "Alice");
    assert_eq!(json["location"], "Paris");
    assert_eq!(json["date"], date);

    // UTC timestamp with Z suffix
    let timestamp = json["timestamp"].as_str().unwrap();
    assert!(timestamp.ends_with('Z'));

    // Full weather payload plus the parsed recommendation
    assert_eq!(json["weather"]["days"][0]["temp"], 20);
    assert_eq!(
      json["sports_recommendation"]["activity_recommendation"],
      "Perfect running weather."
    );
    assert_eq!(json["sports_recommendation"]["health_safety"], "Bring water.");
  }

  #[tokio::test]
  async fn test_llm_failure_is_soft() {
    let mut weather_server = mockito::Server::new_async().await;
    let mut llm_server = mockito::Server::new_async().await;
    let date = tomorrow();

    weather_server
      .mock("GET", format!("/Paris/{}", date).as_str())
      .match_query(mockito::Matcher::Any)
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(weather_days(&date))
      .create_async()
      .await;

    llm_server
      .mock("POST", "/chat")
      .with_status(500)
      .with_body("model overloaded")
      .create_async()
      .await;

    let app = test_app(&weather_server.url(), &llm_server.url());
    let (status, json) = post_weather(app, valid_body(&date)).await;

    // Still 200: weather data is returned with the error embedded
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["weather"]["days"][0]["temp"], 20);
    let error = json["sports_recommendation"]["error"].as_str().unwrap();
    assert!(error.starts_with("Error generating sports recommendation:"));
  }

  #[tokio::test]
  async fn test_malformed_days_is_soft_failure() {
    let mut weather_server = mockito::Server::new_async().await;
    let date = tomorrow();

    weather_server
      .mock("GET", format!("/Paris/{}", date).as_str())
      .match_query(mockito::Matcher::Any)
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(r#"{"address": "Paris"}"#)
      .create_async()
      .await;

    let app = test_app(&weather_server.url(), "http://127.0.0.1:1");
    let (status, json) = post_weather(app, valid_body(&date)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["sports_recommendation"]["error"]
      .as_str()
      .unwrap()
      .contains("no forecast days"));
  }

  #[tokio::test]
  async fn test_extra_body_fields_are_ignored() {
    let mut weather_server = mockito::Server::new_async().await;
    let mut llm_server = mockito::Server::new_async().await;
    let date = tomorrow();

    weather_server
      .mock("GET", format!("/Paris/{}", date).as_str())
      .match_query(mockito::Matcher::Any)
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(weather_days(&date))
      .create_async()
      .await;

    llm_server
      .mock("POST", "/chat")
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(llm_body())
      .create_async()
      .await;

    let mut body = valid_body(&date);
    body["unexpected"] = json!({ "nested": true });

    let app = test_app(&weather_server.url(), &llm_server.url());
    let (status, _json) = post_weather(app, body).await;

    assert_eq!(status, StatusCode::OK);
  }
}
