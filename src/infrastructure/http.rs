use crate::error::Result;
use reqwest::Response;
use serde_json::Value;

/// Reads a response body as JSON. Empty bodies become `Value::Null` and
/// non-JSON bodies are kept as a string.
pub(crate) async fn json_or_null(response: Response) -> Result<Value> {
    let text = response.text().await?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

/// Pulls a human-readable message out of an error body.
pub(crate) fn error_message(body: &Value) -> Option<String> {
    error_message_from(body, &["error", "message", "msg", "error_description"])
}

/// Like [`error_message`], with an explicit key precedence.
pub(crate) fn error_message_from(body: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| match body.get(key) {
            Some(Value::String(message)) if !message.is_empty() => Some(message.clone()),
            Some(Value::Object(inner)) => inner
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_owned),
            _ => None,
        })
}
