use lambda_http::Response;
use serde::Serialize;
use tracing::error;

/// CORS headers go on every response so the browser client can call us
/// cross-origin, including error and preflight responses.
fn cors_builder(status: u16) -> lambda_http::http::response::Builder {
    Response::builder()
        .status(status)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "POST, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type")
}

/// Empty reply to an OPTIONS preflight.
pub fn preflight_response() -> Response<String> {
    cors_builder(204).body(String::new()).unwrap()
}

pub fn json_response<T: Serialize>(status: u16, payload: &T) -> Response<String> {
    let body = serde_json::to_string(payload).unwrap_or_else(|e| {
        error!("failed to serialize response body: {}", e);
        r#"{"status":"error"}"#.to_string()
    });

    cors_builder(status)
        .header("Content-Type", "application/json; charset=utf-8")
        .body(body)
        .unwrap()
}
