//! Minimal Gemini client for our use-cases.
//!
//! We only call `models/{model}:generateContent` and ask for either plain text,
//! schema-constrained JSON, or text plus an inline image.
//! Calls are instrumented and log model names, latencies and token usage (not contents).
//!
//! NOTE: We never log the API key or the uploaded file.

use std::time::Instant;

use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::error::GeminiError;
use crate::util::trunc_for_log;

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Clone)]
pub struct Gemini {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  /// Extraction and text-only praise.
  pub model: String,
  /// When set, praise is requested together with an illustration.
  pub image_model: Option<String>,
}

/// Base64 payload plus MIME type, as sent and received in `inlineData` parts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
  pub mime_type: String,
  pub data: String,
}

impl InlineData {
  pub fn to_data_url(&self) -> String {
    format!("data:{};base64,{}", self.mime_type, self.data)
  }
}

/// Text and first image of a multimodal reply.
#[derive(Clone, Debug, Default)]
pub struct TextAndImage {
  pub text: String,
  pub image: Option<InlineData>,
}

impl Gemini {
  /// Construct the client if we find GEMINI_API_KEY (or API_KEY); otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("GEMINI_API_KEY")
      .or_else(|_| std::env::var("API_KEY"))
      .ok()
      .filter(|k| !k.trim().is_empty())?;
    let base_url = std::env::var("GEMINI_BASE_URL")
      .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".into());
    let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".into());
    let image_model = std::env::var("GEMINI_IMAGE_MODEL").ok().filter(|m| !m.is_empty());

    // No request timeout: the UI shows a spinner until the call settles.
    let client = match reqwest::Client::builder().build() {
      Ok(c) => c,
      Err(e) => {
        error!(target: "gemini", error = %e, "Failed to build HTTP client; AI disabled");
        return None;
      }
    };

    Some(Self { client, api_key, base_url, model, image_model })
  }

  #[instrument(level = "info", skip(self, model, req), fields(model = %model))]
  async fn generate(&self, model: &str, req: &GenerateContentRequest) -> Result<GenerateContentResponse, GeminiError> {
    let url = format!("{}/models/{}:generateContent", self.base_url.trim_end_matches('/'), model);
    let start = Instant::now();

    let res = self.client.post(&url)
      .header(USER_AGENT, "baitap-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(API_KEY_HEADER, &self.api_key)
      .json(req).send().await?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_gemini_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      error!(target: "gemini", elapsed = ?start.elapsed(), status, %message, "Gemini call failed");
      return Err(GeminiError::Api { status, message });
    }

    let body: GenerateContentResponse = res.json().await?;
    if let Some(usage) = &body.usage_metadata {
      info!(
        target: "gemini",
        elapsed = ?start.elapsed(),
        prompt_tokens = ?usage.prompt_token_count,
        candidates_tokens = ?usage.candidates_token_count,
        total_tokens = ?usage.total_token_count,
        "Gemini usage"
      );
    }
    Ok(body)
  }

  /// Plain-text reply to a single prompt.
  #[instrument(level = "info", skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
  pub async fn generate_text(&self, prompt: &str) -> Result<String, GeminiError> {
    let req = GenerateContentRequest {
      contents: vec![Content::user(vec![Part::text(prompt)])],
      generation_config: None,
    };
    let body = self.generate(&self.model, &req).await?;
    let text = body.text();
    if text.is_empty() {
      return Err(GeminiError::EmptyResponse);
    }
    Ok(text)
  }

  /// Schema-constrained JSON reply about an inline file. Returns the raw JSON text.
  #[instrument(level = "info", skip(self, file, prompt, schema), fields(model = %self.model, mime = %file.mime_type, data_len = file.data.len()))]
  pub async fn generate_json_for_file(
    &self,
    file: InlineData,
    prompt: &str,
    schema: serde_json::Value,
  ) -> Result<String, GeminiError> {
    let req = GenerateContentRequest {
      contents: vec![Content::user(vec![Part::inline(file), Part::text(prompt)])],
      generation_config: Some(GenerationConfig {
        response_mime_type: Some("application/json".into()),
        response_schema: Some(schema),
        response_modalities: None,
      }),
    };
    let body = self.generate(&self.model, &req).await?;
    let text = body.text();
    if text.is_empty() {
      return Err(GeminiError::EmptyResponse);
    }
    Ok(text)
  }

  /// Text plus illustration from `image_model`. Falls back to text-only when no image model is set.
  #[instrument(level = "info", skip(self, prompt), fields(image_model = ?self.image_model, prompt_len = prompt.len()))]
  pub async fn generate_text_and_image(&self, prompt: &str) -> Result<TextAndImage, GeminiError> {
    let Some(image_model) = &self.image_model else {
      let text = self.generate_text(prompt).await?;
      return Ok(TextAndImage { text, image: None });
    };

    let req = GenerateContentRequest {
      contents: vec![Content::user(vec![Part::text(prompt)])],
      generation_config: Some(GenerationConfig {
        response_mime_type: None,
        response_schema: None,
        response_modalities: Some(vec!["TEXT".into(), "IMAGE".into()]),
      }),
    };
    let body = self.generate(image_model, &req).await?;
    let out = TextAndImage { text: body.text(), image: body.first_image() };
    if out.text.is_empty() {
      return Err(GeminiError::EmptyResponse);
    }
    Ok(out)
  }
}

// --- generateContent DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
  contents: Vec<Content>,
  #[serde(skip_serializing_if = "Option::is_none")]
  generation_config: Option<GenerationConfig>,
}

#[derive(Serialize, Deserialize)]
struct Content {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  role: Option<String>,
  #[serde(default)]
  parts: Vec<Part>,
}

impl Content {
  fn user(parts: Vec<Part>) -> Self {
    Self { role: Some("user".into()), parts }
  }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  text: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  inline_data: Option<InlineData>,
}

impl Part {
  fn text(s: &str) -> Self {
    Self { text: Some(s.to_string()), inline_data: None }
  }
  fn inline(data: InlineData) -> Self {
    Self { text: None, inline_data: Some(data) }
  }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
  #[serde(skip_serializing_if = "Option::is_none")]
  response_mime_type: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_schema: Option<serde_json::Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_modalities: Option<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
  #[serde(default)]
  candidates: Vec<Candidate>,
  #[serde(default)]
  usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
  #[serde(default)]
  content: Option<Content>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
  #[serde(default)] prompt_token_count: Option<u32>,
  #[serde(default)] candidates_token_count: Option<u32>,
  #[serde(default)] total_token_count: Option<u32>,
}

impl GenerateContentResponse {
  fn parts(&self) -> impl Iterator<Item = &Part> {
    self.candidates
      .first()
      .and_then(|c| c.content.as_ref())
      .map(|c| c.parts.iter())
      .into_iter()
      .flatten()
  }

  /// Concatenated, trimmed text parts of the first candidate.
  fn text(&self) -> String {
    self.parts()
      .filter_map(|p| p.text.as_deref())
      .collect::<String>()
      .trim()
      .to_string()
  }

  fn first_image(&self) -> Option<InlineData> {
    self.parts()
      .filter_map(|p| p.inline_data.as_ref())
      .find(|d| d.mime_type.starts_with("image/"))
      .cloned()
  }
}

/// Try to extract a clean error message from a Gemini error body.
fn extract_gemini_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
