//! LLM integration for activity recommendations
//!
//! This module handles communication with the OpenRouter chat-completions
//! API for turning a day's forecast into a short outdoor-activity
//! recommendation with health and safety advice.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// ---------------------------------------------------------------------------
/// Configuration Constants
/// ---------------------------------------------------------------------------

const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const OPENROUTER_MODEL: &str = "deepseek/deepseek-chat:free";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-field character limit the model is asked to stay under
const MAX_FIELD_CHARS: usize = 220;

const SYSTEM_PROMPT: &str = r#"Please respond only in valid JSON format with the following structure: {"sports_recommendation": {"activity_recommendation": "<string>", "health_safety": "<string>"}}"#;

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum LlmError {
  #[error("HTTP request failed: {0}")]
  Request(#[from] reqwest::Error),

  #[error("OpenRouter API error: {0}")]
  Api(String),

  #[error("Error parsing API response: {0}")]
  Parse(String),
}

/// ---------------------------------------------------------------------------
/// Chat Completion API Types
/// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest {
  model: String,
  messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
  role: String,
  content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
  choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
  message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
  content: String,
}

/// ---------------------------------------------------------------------------
/// Forecast Input
/// ---------------------------------------------------------------------------

/// The fields consumed from the first element of the provider's "days"
/// list. Anything missing here makes the recommendation fail softly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastDay {
  pub datetime: String,
  pub temp: f64,
  pub feelslike: f64,
  pub precipprob: f64,
  pub windspeedmean: f64,
  pub humidity: f64,
  pub cloudcover: f64,
  pub visibility: f64,
  pub uvindex: f64,
  pub pressure: f64,
}

/// ---------------------------------------------------------------------------
/// Recommendation Types (from the LLM)
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SportsRecommendation {
  /// Suitability judgment and suggested activities
  pub activity_recommendation: String,

  /// Safety precautions (UV protection, hydration, visibility, ...)
  pub health_safety: String,
}

/// Outcome embedded in the response envelope. A failed recommendation
/// never fails the request; it serializes as `{"error": "..."}` instead.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RecommendationResult {
  Ready(SportsRecommendation),
  Failed { error: String },
}

impl RecommendationResult {
  pub fn from_outcome(outcome: Result<SportsRecommendation, LlmError>) -> Self {
    match outcome {
      Ok(recommendation) => Self::Ready(recommendation),
      Err(e) => Self::Failed {
        error: format!("Error generating sports recommendation: {}", e),
      },
    }
  }
}

/// ---------------------------------------------------------------------------
/// OpenRouter Client
/// ---------------------------------------------------------------------------

pub struct OpenRouterClient {
  client: Client,
  api_key: String,
  api_url: String,
}

impl OpenRouterClient {
  pub fn new(api_key: impl Into<String>) -> Self {
    Self::with_api_url(api_key, OPENROUTER_API_URL)
  }

  /// Point the client at a different completions URL (used by tests)
  pub fn with_api_url(api_key: impl Into<String>, api_url: impl Into<String>) -> Self {
    Self {
      client: Client::new(),
      api_key: api_key.into(),
      api_url: api_url.into(),
    }
  }

  /// Generate an activity recommendation from a raw weather payload.
  ///
  /// Reads `days[0]`, renders the prompt, calls the model, and parses the
  /// strict-JSON reply. Every failure path returns an `LlmError` for the
  /// caller to embed as a soft failure.
  pub async fn recommend(
    &self,
    weather: &serde_json::Value,
  ) -> Result<SportsRecommendation, LlmError> {
    let day = first_forecast_day(weather)?;
    let prompt = build_prompt(&day);

    tracing::info!(date = %day.datetime, "requesting activity recommendation");
    let content = self.complete(SYSTEM_PROMPT, &prompt).await?;

    let json_str = strip_code_fence(&content);
    if json_str.is_empty() {
      return Err(LlmError::Parse("No content found in API response".into()));
    }

    let parsed: serde_json::Value =
      serde_json::from_str(json_str).map_err(|e| LlmError::Parse(e.to_string()))?;

    let recommendation = parsed
      .get("sports_recommendation")
      .ok_or_else(|| LlmError::Parse("missing sports_recommendation in reply".into()))?;

    serde_json::from_value(recommendation.clone()).map_err(|e| LlmError::Parse(e.to_string()))
  }

  /// Call the chat-completions endpoint with a system and user message
  async fn complete(&self, system_prompt: &str, user_message: &str) -> Result<String, LlmError> {
    let request = ChatRequest {
      model: OPENROUTER_MODEL.to_string(),
      messages: vec![
        ChatMessage {
          role: "system".to_string(),
          content: system_prompt.to_string(),
        },
        ChatMessage {
          role: "user".to_string(),
          content: user_message.to_string(),
        },
      ],
    };

    let response = self
      .client
      .post(&self.api_url)
      .bearer_auth(&self.api_key)
      .timeout(REQUEST_TIMEOUT)
      .json(&request)
      .send()
      .await?;

    let status = response.status();
    if status.as_u16() != 200 {
      let body = response.text().await.unwrap_or_default();
      tracing::warn!(status = status.as_u16(), "OpenRouter returned an error");
      return Err(LlmError::Api(format!("{} - {}", status.as_u16(), body)));
    }

    let chat_response: ChatResponse = response
      .json()
      .await
      .map_err(|e| LlmError::Parse(e.to_string()))?;

    chat_response
      .choices
      .into_iter()
      .next()
      .map(|choice| choice.message.content)
      .ok_or_else(|| LlmError::Parse("no choices in API response".into()))
  }
}

/// ---------------------------------------------------------------------------
/// Prompt Rendering
/// ---------------------------------------------------------------------------

fn build_prompt(day: &ForecastDay) -> String {
  format!(
    r#"Based on the weather data on {date}, recommend suitable outdoor activities and provide relevant health advice. The current conditions are:

Temperature: {temp}°C (Feels like: {feelslike}°C)
Precipitation probability: {precipprob}%
Wind speed: {windspeed} km/h
Humidity: {humidity}%
Cloud cover: {cloudcover}%
Visibility: {visibility} km
UV index: {uvindex}
Pressure: {pressure} mb

Provide a brief recommendation for:
    1. Whether conditions are suitable for running, walking, or other outdoor activities
    2. Any specific activities particularly well-suited to today's weather
    3. Important health or safety precautions (such as UV protection, hydration needs, or visibility concerns)
Keep your response informal, concise and friendly, focusing on practical advice for today's conditions.
Answer meaningfully but briefly. Make sure that your description for each category does not exceed {max_chars} characters!"#,
    date = day.datetime,
    temp = day.temp,
    feelslike = day.feelslike,
    precipprob = day.precipprob,
    windspeed = day.windspeedmean,
    humidity = day.humidity,
    cloudcover = day.cloudcover,
    visibility = day.visibility,
    uvindex = day.uvindex,
    pressure = day.pressure,
    max_chars = MAX_FIELD_CHARS,
  )
}

/// Extract the first entry of the provider's "days" list
fn first_forecast_day(weather: &serde_json::Value) -> Result<ForecastDay, LlmError> {
  let day = weather
    .get("days")
    .and_then(|days| days.get(0))
    .ok_or_else(|| LlmError::Parse("no forecast days in weather data".into()))?;

  serde_json::from_value(day.clone()).map_err(|e| LlmError::Parse(e.to_string()))
}

/// Strip a markdown code fence from the model's reply (handles both
/// ```json and plain ``` fences; unfenced text passes through)
fn strip_code_fence(text: &str) -> &str {
  let trimmed = text.trim();

  if let Some(rest) = trimmed
    .strip_prefix("```json")
    .or_else(|| trimmed.strip_prefix("```"))
  {
    if let Some(inner) = rest.strip_suffix("```") {
      return inner.trim();
    }
  }

  trimmed
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
