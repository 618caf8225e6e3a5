use lambda_http::http::Method;
use lambda_http::{run, service_fn, Error};

use reqwest::Client as ReqwestClient;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

mod apis;
mod error;
mod retry;
mod structs;

mod utils;
use utils::*;

use apis::GeminiClient;
use structs::{ErrorEnvelope, GenerateRequest, GenerationKind, SuccessEnvelope};

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .with_env_filter(EnvFilter::new("poem_proxy=debug"))
        .init();

    info!("Starting the poem proxy");

    // Setup the upstream client here because this place is a cold start
    let client = ReqwestClient::new();
    let gemini = GeminiClient::from_env(client)?;
    info!("Gemini client initialized");

    // Run the Lambda function
    info!("Starting Lambda function");
    run(service_fn(|req| handler(req, &gemini))).await
}

async fn handler(
    req: lambda_http::Request,
    gemini: &GeminiClient,
) -> Result<lambda_http::Response<String>, lambda_http::Error> {
    debug!("Received a new {} request", req.method());

    if req.method() == Method::OPTIONS {
        return Ok(preflight_response());
    }

    if req.method() != Method::POST {
        return Ok(json_response(
            405,
            &ErrorEnvelope::new("method not allowed"),
        ));
    }

    let request: GenerateRequest = match serde_json::from_slice(req.body()) {
        Ok(request) => request,
        Err(e) => {
            warn!("Failed to parse request body: {}", e);
            return Ok(json_response(400, &ErrorEnvelope::new("invalid JSON body")));
        }
    };

    let prompt = request.prompt.trim();
    if prompt.is_empty() {
        warn!("Rejected a request with an empty prompt");
        return Ok(json_response(
            400,
            &ErrorEnvelope::new("prompt must not be empty"),
        ));
    }

    let kind = request.kind();
    info!("Dispatching {} generation", kind.as_str());

    let result = match kind {
        GenerationKind::Text => gemini
            .generate_text(prompt)
            .await
            .map(|text| SuccessEnvelope::poem(prompt.to_string(), text.poem)),
        GenerationKind::Image => gemini
            .generate_image(prompt)
            .await
            .map(|image| SuccessEnvelope::image(prompt.to_string(), image)),
    };

    match result {
        Ok(envelope) => Ok(json_response(200, &envelope)),
        Err(e) => {
            error!("{} generation failed: {}", kind.as_str(), e);
            Ok(json_response(502, &ErrorEnvelope::new(e.to_string())))
        }
    }
}
