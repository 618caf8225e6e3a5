use std::env;

use reqwest::Client as ReqwestClient;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::ProxyError;
use crate::retry::fetch_with_retry;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const TEXT_MODEL: &str = "gemini-2.0-flash";
const IMAGE_MODEL: &str = "gemini-2.0-flash-preview-image-generation";

const DEFAULT_POEM_SYSTEM_PROMPT: &str =
    "تو یک شاعر هستی. برای موضوع داده‌شده یک شعر کوتاه فارسی بسرای، حداکثر در چهار مصراع.";
const DEFAULT_IMAGE_SYSTEM_PROMPT: &str =
    "Generate a highly detailed, vibrant and imaginative image for the given prompt.";

/// Placeholder poem used when the model returns no text at all.
pub const NO_POEM_PLACEHOLDER: &str = "(شعری تولید نشد)";

const DEFAULT_IMAGE_MIME: &str = "image/png";

// Response-side wire types. Every level is optional or defaulted; the
// API omits whole subtrees when a prompt is blocked.

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
    safety_ratings: Vec<SafetyRating>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Part {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct InlineData {
    mime_type: Option<String>,
    data: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SafetyRating {
    probability: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextResult {
    pub poem: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageResult {
    pub data_url: String,
    pub mime_type: String,
}

pub struct GeminiClient {
    http: ReqwestClient,
    api_key: String,
    base_url: String,
    poem_system_prompt: String,
    image_system_prompt: String,
}

impl GeminiClient {
    pub fn from_env(http: ReqwestClient) -> Result<Self, ProxyError> {
        let api_key = env::var("GEMINI_API_KEY")
            .map_err(|_| ProxyError::Config("GEMINI_API_KEY not set".to_string()))?;

        Ok(Self {
            http,
            api_key,
            base_url: env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            poem_system_prompt: env::var("POEM_SYSTEM_PROMPT")
                .unwrap_or_else(|_| DEFAULT_POEM_SYSTEM_PROMPT.to_string()),
            image_system_prompt: env::var("IMAGE_SYSTEM_PROMPT")
                .unwrap_or_else(|_| DEFAULT_IMAGE_SYSTEM_PROMPT.to_string()),
        })
    }

    pub async fn generate_text(&self, prompt: &str) -> Result<TextResult, ProxyError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "systemInstruction": { "parts": [{ "text": self.poem_system_prompt }] },
        });

        debug!("requesting poem from {}", TEXT_MODEL);
        let response = self.call(TEXT_MODEL, &body).await?;
        Ok(TextResult {
            poem: extract_poem(&response),
        })
    }

    pub async fn generate_image(&self, prompt: &str) -> Result<ImageResult, ProxyError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "systemInstruction": { "parts": [{ "text": self.image_system_prompt }] },
            "generationConfig": { "responseModalities": ["TEXT", "IMAGE"] },
        });

        debug!("requesting image from {}", IMAGE_MODEL);
        let response = self.call(IMAGE_MODEL, &body).await?;
        extract_image(&response)
    }

    async fn call(&self, model: &str, body: &Value) -> Result<Value, ProxyError> {
        let url = self.endpoint(model);
        fetch_with_retry(|| self.attempt(&url, body), tokio::time::sleep).await
    }

    /// Credential travels as a query parameter, as the API expects.
    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        )
    }

    async fn attempt(&self, url: &str, body: &Value) -> Result<Value, String> {
        // Strip the URL from transport errors before stringifying;
        // it carries the credential in its query string.
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| e.without_url().to_string())?;

        let status = response.status();

        // The API returns structured errors in the body even on a
        // failure status, so parse before checking the status.
        let parsed: Value = response
            .json()
            .await
            .map_err(|e| e.without_url().to_string())?;

        if status.is_success() {
            Ok(parsed)
        } else {
            Err(parsed.to_string())
        }
    }
}

/// Pulls the first text part out of the first candidate. A blocked or
/// empty response is not an error here; the caller gets a fixed
/// placeholder poem instead.
fn extract_poem(body: &Value) -> String {
    let parsed: GenerateContentResponse = match serde_json::from_value(body.clone()) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("unexpected response shape: {}", e);
            return NO_POEM_PLACEHOLDER.to_string();
        }
    };

    parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text)
        .unwrap_or_else(|| {
            warn!("no text part in response, using placeholder");
            NO_POEM_PLACEHOLDER.to_string()
        })
}

/// Finds the first inline-data part carrying an image and folds it into
/// a self-contained data URL. Unlike the text path, a response with no
/// image payload is a hard failure, reported with whatever finish
/// reason and safety probability the response happens to carry.
fn extract_image(body: &Value) -> Result<ImageResult, ProxyError> {
    let parsed: GenerateContentResponse = serde_json::from_value(body.clone()).unwrap_or_default();

    let (finish_reason, safety_probability, parts) = match parsed.candidates.into_iter().next() {
        Some(candidate) => (
            candidate.finish_reason,
            candidate
                .safety_ratings
                .into_iter()
                .next()
                .and_then(|rating| rating.probability),
            candidate
                .content
                .map(|content| content.parts)
                .unwrap_or_default(),
        ),
        None => (None, None, Vec::new()),
    };

    let image = parts.into_iter().find_map(|part| {
        let inline = part.inline_data?;
        match &inline.mime_type {
            Some(mime) if mime.starts_with("image/") => Some(inline),
            Some(_) => None,
            // MIME type missing but payload present: assume PNG.
            None => Some(inline),
        }
    });

    match image {
        Some(inline) => {
            let mime_type = inline
                .mime_type
                .unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string());
            Ok(ImageResult {
                data_url: format!("data:{};base64,{}", mime_type, inline.data),
                mime_type,
            })
        }
        None => Err(ProxyError::Generation {
            finish_reason: finish_reason.unwrap_or_else(|| "unknown".to_string()),
            safety_probability: safety_probability.unwrap_or_else(|| "N/A".to_string()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;

    #[test]
    fn poem_is_taken_from_first_text_part() {
        let body = json!({
            "candidates": [{ "content": { "parts": [{ "text": "سلام" }] } }]
        });
        assert_eq!(extract_poem(&body), "سلام");
    }

    #[test]
    fn empty_parts_fall_back_to_placeholder() {
        let body = json!({ "candidates": [{ "content": { "parts": [] } }] });
        assert_eq!(extract_poem(&body), NO_POEM_PLACEHOLDER);
    }

    #[test]
    fn missing_candidates_fall_back_to_placeholder() {
        assert_eq!(extract_poem(&json!({})), NO_POEM_PLACEHOLDER);
    }

    #[test]
    fn non_text_first_part_falls_back_to_placeholder() {
        let body = json!({
            "candidates": [{ "content": { "parts": [
                { "inlineData": { "mimeType": "image/png", "data": "AAAA" } }
            ] } }]
        });
        assert_eq!(extract_poem(&body), NO_POEM_PLACEHOLDER);
    }

    #[test]
    fn image_part_becomes_data_url() {
        let body = json!({
            "candidates": [{ "content": { "parts": [
                { "text": "here is your image" },
                { "inlineData": { "mimeType": "image/png", "data": "AAAA" } }
            ] } }]
        });

        let result = extract_image(&body).unwrap();
        assert_eq!(result.data_url, "data:image/png;base64,AAAA");
        assert_eq!(result.mime_type, "image/png");
    }

    #[test]
    fn missing_mime_type_defaults_to_png() {
        let body = json!({
            "candidates": [{ "content": { "parts": [
                { "inlineData": { "data": "QkJCQg==" } }
            ] } }]
        });

        let result = extract_image(&body).unwrap();
        assert_eq!(result.mime_type, "image/png");
        assert_eq!(result.data_url, "data:image/png;base64,QkJCQg==");
    }

    #[test]
    fn non_image_mime_types_are_skipped() {
        let body = json!({
            "candidates": [{
                "content": { "parts": [
                    { "inlineData": { "mimeType": "audio/mp3", "data": "AAAA" } }
                ] },
                "finishReason": "IMAGE_SAFETY",
                "safetyRatings": [{ "probability": "HIGH" }]
            }]
        });

        match extract_image(&body).unwrap_err() {
            ProxyError::Generation {
                finish_reason,
                safety_probability,
            } => {
                assert_eq!(finish_reason, "IMAGE_SAFETY");
                assert_eq!(safety_probability, "HIGH");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn missing_diagnostics_render_as_markers() {
        match extract_image(&json!({})).unwrap_err() {
            ProxyError::Generation {
                finish_reason,
                safety_probability,
            } => {
                assert_eq!(finish_reason, "unknown");
                assert_eq!(safety_probability, "N/A");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn transport_failure_detail_never_contains_the_credential() {
        let client = GeminiClient {
            http: ReqwestClient::new(),
            api_key: "SUPERSECRETKEY123".to_string(),
            // Unroutable port: the send itself fails, no server needed.
            base_url: "http://127.0.0.1:1/v1beta".to_string(),
            poem_system_prompt: DEFAULT_POEM_SYSTEM_PROMPT.to_string(),
            image_system_prompt: DEFAULT_IMAGE_SYSTEM_PROMPT.to_string(),
        };

        let url = client.endpoint(TEXT_MODEL);
        let detail = client.attempt(&url, &json!({})).await.unwrap_err();

        assert!(!detail.is_empty());
        assert!(
            !detail.contains("SUPERSECRETKEY123"),
            "credential leaked into failure detail: {}",
            detail
        );
    }

    #[test]
    fn data_url_round_trips_to_original_bytes() {
        let original = b"not actually a png";
        let encoded = BASE64.encode(original);
        let body = json!({
            "candidates": [{ "content": { "parts": [
                { "inlineData": { "mimeType": "image/jpeg", "data": encoded } }
            ] } }]
        });

        let result = extract_image(&body).unwrap();
        let prefix = format!("data:{};base64,", result.mime_type);
        assert_eq!(result.mime_type, "image/jpeg");

        let payload = result.data_url.strip_prefix(&prefix).unwrap();
        assert_eq!(BASE64.decode(payload).unwrap(), original);
    }
}
