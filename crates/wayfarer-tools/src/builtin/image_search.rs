use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{json, Value};

use wayfarer_core::config::TavilyConfig;
use wayfarer_core::error::Result;
use wayfarer_core::traits::Tool;
use wayfarer_core::types::{ToolContext, ToolOutput};

use super::{parse_input, send_json};

/// Destination photos via Tavily. Returns a short summary for the model and
/// an HTML gallery artifact for the client.
pub struct ImageSearchTool {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    max_results: u32,
    timeout: u64,
}

impl ImageSearchTool {
    pub fn new(http: reqwest::Client, config: &TavilyConfig, timeout: u64) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            max_results: config.max_results,
            timeout,
        }
    }
}

#[derive(Deserialize)]
struct ImageInput {
    #[serde(alias = "query")]
    term: String,
}

impl Tool for ImageSearchTool {
    fn name(&self) -> &str {
        "imageSearch"
    }

    fn description(&self) -> &str {
        "Find photos of a destination or landmark to show the traveller."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "term": { "type": "string", "description": "What to find pictures of" }
            },
            "required": ["term"]
        })
    }

    fn timeout_secs(&self) -> u64 {
        self.timeout
    }

    fn execute(&self, input: Value, _ctx: ToolContext) -> BoxFuture<'_, Result<ToolOutput>> {
        Box::pin(async move {
            let params: ImageInput = parse_input(self.name(), input)?;
            let body = send_json(
                self.name(),
                self.http
                    .post(format!("{}/search", self.base_url.trim_end_matches('/')))
                    .bearer_auth(&self.api_key)
                    .json(&json!({
                        "query": params.term,
                        "max_results": self.max_results,
                        "include_images": true,
                        "include_image_descriptions": true,
                    })),
            )
            .await?;

            let images: Vec<(String, String)> = body["images"]
                .as_array()
                .map(|items| items.iter().filter_map(image_entry).collect())
                .unwrap_or_default();

            let summary = if images.is_empty() {
                format!("No images found for '{}'.", params.term)
            } else {
                format!("Found {} images of '{}'.", images.len(), params.term)
            };
            let urls: Vec<&str> = images.iter().map(|(url, _)| url.as_str()).collect();

            Ok(ToolOutput::success(json!({ "summary": summary, "images": urls }))
                .with_artifact(gallery_html(&params.term, &images)))
        })
    }
}

/// Tavily returns either bare URLs or `{url, description}` objects.
fn image_entry(item: &Value) -> Option<(String, String)> {
    match item {
        Value::String(url) => Some((url.clone(), String::new())),
        Value::Object(obj) => {
            let url = obj.get("url")?.as_str()?.to_string();
            let desc = obj
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Some((url, desc))
        }
        _ => None,
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn gallery_html(term: &str, images: &[(String, String)]) -> String {
    let mut html = format!(
        "<div class=\"image-gallery\" data-term=\"{}\">",
        escape_html(term)
    );
    for (url, desc) in images {
        let alt = if desc.is_empty() { term } else { desc.as_str() };
        html.push_str(&format!(
            "<figure><img src=\"{}\" alt=\"{}\" loading=\"lazy\"/></figure>",
            escape_html(url),
            escape_html(alt)
        ));
    }
    html.push_str("</div>");
    html
}
