use std::env;
use std::fmt;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Value};

use crate::client::{GenerationRequest, JsonRequest, VisionClient};
use crate::codec::ImagePayload;
use crate::error::{StudioError, StudioResult};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_ANALYSIS_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

const NO_IMAGE: &str = "The AI did not return a new image.";
const ERROR_BODY_CHARS: usize = 512;
/// The key travels in a header so it never appears in a URL or an error message.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Connection settings for the Gemini `generateContent` API.
#[derive(Debug, Clone, PartialEq)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub analysis_model: String,
    pub image_model: String,
    pub request_timeout_s: f64,
    pub transport_retries: usize,
    pub retry_backoff_s: f64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            analysis_model: DEFAULT_ANALYSIS_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            request_timeout_s: 90.0,
            transport_retries: 2,
            retry_backoff_s: 1.2,
        }
    }
}

impl GeminiConfig {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Reads the key from `GEMINI_API_KEY`, `GOOGLE_API_KEY` or `API_KEY`, and
    /// the transport knobs from `GEMINI_*` variables. Out-of-range values are
    /// clamped rather than rejected.
    pub fn from_env() -> Self {
        let api_key = non_empty_env("GEMINI_API_KEY")
            .or_else(|| non_empty_env("GOOGLE_API_KEY"))
            .or_else(|| non_empty_env("API_KEY"));
        let api_base = non_empty_env("GEMINI_API_BASE")
            .map(|value| value.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let env_value = |key: &str| non_empty_env(key).map(Value::String);
        Self {
            api_key,
            api_base,
            analysis_model: non_empty_env("GEMINI_ANALYSIS_MODEL")
                .unwrap_or_else(|| DEFAULT_ANALYSIS_MODEL.to_string()),
            image_model: non_empty_env("GEMINI_IMAGE_MODEL")
                .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            request_timeout_s: request_timeout_seconds(env_value("GEMINI_REQUEST_TIMEOUT").as_ref()),
            transport_retries: transport_retry_count(env_value("GEMINI_TRANSPORT_RETRIES").as_ref()),
            retry_backoff_s: retry_backoff_seconds(env_value("GEMINI_RETRY_BACKOFF").as_ref()),
        }
    }
}

fn request_timeout_seconds(value: Option<&Value>) -> f64 {
    value_as_f64(value, 90.0, 15.0, 300.0)
}

fn transport_retry_count(value: Option<&Value>) -> usize {
    value_as_f64(value, 2.0, 0.0, 4.0).round() as usize
}

fn retry_backoff_seconds(value: Option<&Value>) -> f64 {
    value_as_f64(value, 1.2, 0.1, 10.0)
}

#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    api_key: String,
    http: HttpClient,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut config = self.config.clone();
        config.api_key = config.api_key.map(|_| "<redacted>".to_string());
        f.debug_struct("GeminiClient")
            .field("config", &config)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> StudioResult<Self> {
        Self::with_http(config, HttpClient::new())
    }

    pub fn with_http(config: GeminiConfig, http: HttpClient) -> StudioResult<Self> {
        let Some(api_key) = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
        else {
            return Err(StudioError::Config {
                message: "GEMINI_API_KEY (or GOOGLE_API_KEY / API_KEY) is not set".to_string(),
            });
        };
        Ok(Self {
            config,
            api_key,
            http,
        })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let model = model.trim();
        let model = model.strip_prefix("models/").unwrap_or(model);
        let base = self.config.api_base.trim_end_matches('/');
        format!("{base}/models/{model}:generateContent")
    }

    /// Posts once, then retries transport failures with linear backoff.
    /// HTTP error statuses are returned as responses and never retried.
    fn send(&self, endpoint: &str, payload: &Value) -> Result<HttpResponse> {
        let timeout = Duration::from_secs_f64(self.config.request_timeout_s);
        let mut attempt = 0;
        loop {
            let sent = self
                .http
                .post(endpoint)
                .header(API_KEY_HEADER, self.api_key.as_str())
                .timeout(timeout)
                .json(payload)
                .send();
            let err = match sent {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };
            if !worth_retrying(&err) || attempt >= self.config.transport_retries {
                return Err(anyhow::Error::new(err.without_url())
                    .context(format!("Gemini request failed ({endpoint})")));
            }
            attempt += 1;
            thread::sleep(Duration::from_secs_f64(
                self.config.retry_backoff_s * attempt as f64,
            ));
        }
    }

    fn call(&self, model: &str, payload: &Value) -> Result<Value> {
        let endpoint = self.endpoint_for_model(model);
        let response = self.send(&endpoint, payload)?;
        read_json_body(response)
    }
}

impl VisionClient for GeminiClient {
    fn generate_image(&self, request: &GenerationRequest) -> StudioResult<ImagePayload> {
        let payload = json!({
            "contents": [{ "role": "user", "parts": content_parts(&request.images, &request.prompt) }],
            "generationConfig": { "responseModalities": request.modalities.as_wire() },
            "safetySettings": default_safety_settings(),
        });
        let response = self
            .call(&self.config.image_model, &payload)
            .map_err(|err| StudioError::generation(format!("{err:#}")))?;
        let image = extract_first_image(&response)
            .map_err(|err| StudioError::generation(format!("{err:#}")))?;
        image.ok_or_else(|| StudioError::generation(NO_IMAGE))
    }

    fn generate_json(&self, request: &JsonRequest) -> StudioResult<Value> {
        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": content_parts(std::slice::from_ref(&request.image), &request.prompt),
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": request.schema,
            },
        });
        let response = self
            .call(&self.config.analysis_model, &payload)
            .map_err(|err| StudioError::generation(format!("{err:#}")))?;
        let Some(text) = extract_first_text(&response) else {
            return Err(StudioError::generation("Gemini returned no text part"));
        };
        serde_json::from_str(strip_code_fence(&text))
            .map_err(|err| StudioError::generation(format!("Gemini returned invalid JSON: {err}")))
    }
}

fn content_parts(images: &[ImagePayload], prompt: &str) -> Vec<Value> {
    let mut parts: Vec<Value> = images
        .iter()
        .map(|image| {
            json!({
                "inlineData": {
                    "mimeType": image.mime_type,
                    "data": image.to_base64(),
                }
            })
        })
        .collect();
    parts.push(json!({ "text": prompt }));
    parts
}

fn default_safety_settings() -> Vec<Value> {
    [
        "HARM_CATEGORY_HARASSMENT",
        "HARM_CATEGORY_HATE_SPEECH",
        "HARM_CATEGORY_SEXUALLY_EXPLICIT",
        "HARM_CATEGORY_DANGEROUS_CONTENT",
    ]
    .into_iter()
    .map(|category| {
        json!({
            "category": category,
            "threshold": "OFF",
        })
    })
    .collect()
}

fn response_parts(response: &Value) -> impl Iterator<Item = &Value> {
    response
        .get("candidates")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|candidate| {
            candidate
                .get("content")
                .and_then(|content| content.get("parts"))
                .and_then(Value::as_array)
        })
        .flatten()
}

/// First `inlineData` part across all candidates.
fn extract_first_image(response: &Value) -> Result<Option<ImagePayload>> {
    for part in response_parts(response) {
        let Some(inline) = part
            .get("inlineData")
            .or_else(|| part.get("inline_data"))
            .and_then(Value::as_object)
        else {
            continue;
        };
        let data = inline
            .get("data")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if data.is_empty() {
            continue;
        }
        let bytes = BASE64
            .decode(data.as_bytes())
            .context("Gemini returned an image that is not valid base64")?;
        let mime_type = inline
            .get("mimeType")
            .or_else(|| inline.get("mime_type"))
            .and_then(Value::as_str)
            .unwrap_or("image/png");
        return Ok(Some(ImagePayload::new(mime_type, bytes)));
    }
    Ok(None)
}

fn extract_first_text(response: &Value) -> Option<String> {
    response_parts(response)
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .map(str::trim)
        .find(|text| !text.is_empty())
        .map(str::to_string)
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = body.strip_prefix("json").unwrap_or(body);
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Non-2xx statuses become errors carrying the status code and the start of the body.
fn read_json_body(response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let body = response.text().context("reading Gemini response body")?;
    if !status.is_success() {
        bail!(
            "Gemini request failed ({}): {}",
            status.as_u16(),
            clip(&body, ERROR_BODY_CHARS)
        );
    }
    serde_json::from_str(&body).context("Gemini response was not JSON")
}

fn worth_retrying(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

fn clip(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

fn value_as_f64(value: Option<&Value>, default: f64, min: f64, max: f64) -> f64 {
    let parsed = match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse().ok(),
        _ => None,
    };
    parsed.unwrap_or(default).clamp(min, max)
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
