use serde::{Deserialize, Serialize};

use crate::apis::ImageResult;

const SUCCESS_POEM_FA: &str = "شعر شما آماده است!";
const SUCCESS_IMAGE_FA: &str = "تصویر شما آماده است!";
const ERROR_FA: &str = "متاسفانه مشکلی پیش آمد. لطفا دوباره تلاش کنید.";

/// What the browser client sends us.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    pub prompt: String,
}

impl GenerateRequest {
    /// Absent or unrecognized `type` means text generation.
    pub fn kind(&self) -> GenerationKind {
        match self.kind.as_deref() {
            Some("image") => GenerationKind::Image,
            _ => GenerationKind::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationKind {
    Text,
    Image,
}

impl GenerationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationKind::Text => "text",
            GenerationKind::Image => "image",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SuccessEnvelope {
    status: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    prompt_sent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    poem: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mime_type: Option<String>,
    message_fa: &'static str,
}

impl SuccessEnvelope {
    pub fn poem(prompt_sent: String, poem: String) -> Self {
        Self {
            status: "success",
            kind: GenerationKind::Text.as_str(),
            prompt_sent,
            poem: Some(poem),
            image_url: None,
            mime_type: None,
            message_fa: SUCCESS_POEM_FA,
        }
    }

    pub fn image(prompt_sent: String, image: ImageResult) -> Self {
        Self {
            status: "success",
            kind: GenerationKind::Image.as_str(),
            prompt_sent,
            poem: None,
            image_url: Some(image.data_url),
            mime_type: Some(image.mime_type),
            message_fa: SUCCESS_IMAGE_FA,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    status: &'static str,
    message: String,
    message_fa: &'static str,
}

impl ErrorEnvelope {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: message.into(),
            message_fa: ERROR_FA,
        }
    }
}
