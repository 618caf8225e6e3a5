use thiserror::Error;

/// Failures that escape the generation paths.
///
/// `Upstream` comes out of the retry executor once every attempt has
/// failed. `Generation` comes out of the image path when the upstream
/// call succeeded but carried no usable image payload.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("upstream request failed after {attempts} attempts: {detail}")]
    Upstream { attempts: u32, detail: String },

    #[error(
        "no image data in response (finish reason: {finish_reason}, safety: {safety_probability})"
    )]
    Generation {
        finish_reason: String,
        safety_probability: String,
    },

    #[error("configuration error: {0}")]
    Config(String),
}
