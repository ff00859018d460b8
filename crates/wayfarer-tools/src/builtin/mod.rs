pub mod geo;
pub mod image_search;
pub mod tripadvisor;
pub mod web_search;

use serde::de::DeserializeOwned;
use serde_json::Value;

use wayfarer_core::error::{Result, WayfarerError};

pub(crate) fn tool_err(tool: &str, message: impl Into<String>) -> WayfarerError {
    WayfarerError::ToolExecution {
        tool: tool.to_string(),
        message: message.into(),
    }
}

/// Deserialize tool arguments, reporting problems as validation errors.
pub(crate) fn parse_input<T: DeserializeOwned>(tool: &str, input: Value) -> Result<T> {
    serde_json::from_value(input)
        .map_err(|e| WayfarerError::ToolValidation(format!("{}: {}", tool, e)))
}

/// Send a request and decode a JSON body. Non-2xx responses become tool errors.
pub(crate) async fn send_json(tool: &str, req: reqwest::RequestBuilder) -> Result<Value> {
    let resp = req
        .send()
        .await
        .map_err(|e| tool_err(tool, format!("request failed: {}", e)))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(tool_err(
            tool,
            format!("HTTP {}: {}", status.as_u16(), truncate(&body, 200)),
        ));
    }

    resp.json()
        .await
        .map_err(|e| tool_err(tool, format!("invalid JSON response: {}", e)))
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

/// Reduce an HTML page to readable text.
pub(crate) fn strip_html(html: &str) -> Result<String> {
    let compile = |pattern: &str| {
        regex::Regex::new(pattern).map_err(|e| WayfarerError::ToolExecution {
            tool: "html".into(),
            message: e.to_string(),
        })
    };

    let cleaned = compile(r"(?is)<(script|style|noscript)[^>]*>.*?</(script|style|noscript)>")?
        .replace_all(html, " ");
    let text = compile(r"<[^>]+>")?.replace_all(&cleaned, " ");
    let text = text
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ");
    let text = compile(r"[ \t]+")?.replace_all(&text, " ");
    let text = compile(r"\s*\n\s*(\n\s*)+")?.replace_all(&text, "\n\n");
    Ok(text.trim().to_string())
}
