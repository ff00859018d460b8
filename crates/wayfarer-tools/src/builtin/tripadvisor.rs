//! Hotel and attraction lookups against the TripAdvisor content API.
//!
//! One search/details/reviews trio per category; the hotel and sightseeing
//! advisors each get the trio for their category.

use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use wayfarer_core::config::TripAdvisorConfig;
use wayfarer_core::error::Result;
use wayfarer_core::event::DataItemKind;
use wayfarer_core::traits::Tool;
use wayfarer_core::types::{ToolContext, ToolOutput};

use super::{parse_input, send_json};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Hotels,
    Attractions,
}

impl Category {
    fn api_name(self) -> &'static str {
        match self {
            Self::Hotels => "hotels",
            Self::Attractions => "attractions",
        }
    }

    fn tool_prefix(self) -> &'static str {
        match self {
            Self::Hotels => "hotel",
            Self::Attractions => "sightseeing",
        }
    }

    fn empty_message(self) -> &'static str {
        match self {
            Self::Hotels => "No hotels found",
            Self::Attractions => "No sights found",
        }
    }
}

#[derive(Clone)]
struct Api {
    http: reqwest::Client,
    base_url: String,
    key: String,
    radius_unit: String,
}

impl Api {
    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .get(format!("{}{}", self.base_url.trim_end_matches('/'), path))
            .query(&[("key", self.key.as_str()), ("language", "en")])
    }
}

/// All six TripAdvisor-backed tools.
pub fn all_tools(
    http: reqwest::Client,
    config: &TripAdvisorConfig,
    timeout: u64,
) -> Vec<TripAdvisorTool> {
    let api = Api {
        http,
        base_url: config.base_url.clone(),
        key: config.api_key.clone(),
        radius_unit: config.radius_unit.clone(),
    };
    let mut tools = Vec::new();
    for category in [Category::Hotels, Category::Attractions] {
        for op in [Operation::Search, Operation::Details, Operation::Reviews] {
            tools.push(TripAdvisorTool::new(api.clone(), category, op, timeout));
        }
    }
    tools
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Search,
    Details,
    Reviews,
}

pub struct TripAdvisorTool {
    api: Api,
    category: Category,
    op: Operation,
    name: String,
    description: String,
    timeout: u64,
}

impl TripAdvisorTool {
    fn new(api: Api, category: Category, op: Operation, timeout: u64) -> Self {
        let (suffix, description) = match (category, op) {
            (Category::Hotels, Operation::Search) => (
                "Search",
                "Find hotels near a latitude/longitude, optionally matching a query (e.g. 'boutique', 'spa').",
            ),
            (Category::Attractions, Operation::Search) => (
                "Search",
                "Find attractions and sights near a latitude/longitude, optionally matching a query (e.g. 'museum').",
            ),
            (_, Operation::Details) => (
                "Details",
                "Details (address, rating, price level, amenities) for a location id returned by a search.",
            ),
            (_, Operation::Reviews) => (
                "Reviews",
                "Recent traveller reviews for a location id returned by a search.",
            ),
        };
        Self {
            name: format!("{}{}", category.tool_prefix(), suffix),
            description: description.to_string(),
            api,
            category,
            op,
            timeout,
        }
    }
}

#[derive(Deserialize)]
struct SearchInput {
    lat: f64,
    long: f64,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    radius: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationInput {
    #[serde(alias = "location_id")]
    location_id: LocationId,
}

/// Models emit ids as strings or numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum LocationId {
    Text(String),
    Number(u64),
}

impl LocationId {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }
}

impl TripAdvisorTool {
    async fn search(&self, input: Value) -> Result<ToolOutput> {
        let params: SearchInput = parse_input(&self.name, input)?;
        let lat_long = format!("{},{}", params.lat, params.long);
        let radius = params.radius.unwrap_or(5.0).to_string();

        let mut query = vec![
            ("category", self.category.api_name().to_string()),
            ("latLong", lat_long),
            ("radius", radius),
            ("radiusUnit", self.api.radius_unit.clone()),
        ];
        // Free-text searches go through /location/search; otherwise nearby.
        let path = match params.query.filter(|q| !q.trim().is_empty()) {
            Some(q) => {
                query.push(("searchQuery", q));
                "/location/search"
            }
            None => "/location/nearby_search",
        };
        debug!(tool = %self.name, path, "TripAdvisor search");

        let body = send_json(&self.name, self.api.get(path).query(&query)).await?;
        let candidates: Vec<Value> = body["data"]
            .as_array()
            .map(|items| items.iter().map(summarize_location).collect())
            .unwrap_or_default();

        if candidates.is_empty() {
            return Ok(ToolOutput::success(json!(self.category.empty_message())));
        }
        Ok(ToolOutput::success(json!(candidates)))
    }

    async fn lookup(&self, input: Value) -> Result<ToolOutput> {
        let params: LocationInput = parse_input(&self.name, input)?;
        let id = params.location_id.into_string();
        let path = match self.op {
            Operation::Reviews => format!("/location/{}/reviews", id),
            _ => format!("/location/{}/details", id),
        };
        let body = send_json(&self.name, self.api.get(&path)).await?;

        if self.op == Operation::Reviews {
            let reviews: Vec<Value> = body["data"]
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .map(|r| {
                            json!({
                                "title": r["title"],
                                "rating": r["rating"],
                                "text": r["text"],
                                "travelDate": r["travel_date"],
                            })
                        })
                        .collect()
                })
                .unwrap_or_default();
            return Ok(ToolOutput::success(json!({ "locationId": id, "reviews": reviews })));
        }
        Ok(ToolOutput::success(body))
    }
}

fn summarize_location(item: &Value) -> Value {
    json!({
        "locationId": item["location_id"],
        "name": item["name"],
        "distance": item["distance"],
        "address": item["address_obj"]["address_string"],
    })
}

impl Tool for TripAdvisorTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        match self.op {
            Operation::Search => json!({
                "type": "object",
                "properties": {
                    "lat": { "type": "number" },
                    "long": { "type": "number" },
                    "query": { "type": "string", "description": "Optional keywords" },
                    "radius": { "type": "number", "description": "Search radius (default 5)" }
                },
                "required": ["lat", "long"]
            }),
            _ => json!({
                "type": "object",
                "properties": {
                    "locationId": { "type": "string" }
                },
                "required": ["locationId"]
            }),
        }
    }

    fn timeout_secs(&self) -> u64 {
        self.timeout
    }

    fn data_item(&self) -> Option<DataItemKind> {
        match (self.op, self.category) {
            (Operation::Search, Category::Hotels) => Some(DataItemKind::HotelSearch),
            (Operation::Search, Category::Attractions) => Some(DataItemKind::SightSearch),
            _ => None,
        }
    }

    fn execute(&self, input: Value, _ctx: ToolContext) -> BoxFuture<'_, Result<ToolOutput>> {
        Box::pin(async move {
            match self.op {
                Operation::Search => self.search(input).await,
                Operation::Details | Operation::Reviews => self.lookup(input).await,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfarer_core::types::ThreadId;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tools(server: &MockServer) -> Vec<TripAdvisorTool> {
        all_tools(
            reqwest::Client::new(),
            &TripAdvisorConfig {
                api_key: "ta-key".into(),
                base_url: server.uri(),
                radius_unit: "km".into(),
            },
            5,
        )
    }

    fn find<'a>(tools: &'a [TripAdvisorTool], name: &str) -> &'a TripAdvisorTool {
        tools.iter().find(|t| t.name() == name).unwrap()
    }

    #[test]
    fn test_tool_names_and_kinds() {
        let api = Api {
            http: reqwest::Client::new(),
            base_url: String::new(),
            key: String::new(),
            radius_unit: "km".into(),
        };
        let tool = TripAdvisorTool::new(api, Category::Attractions, Operation::Search, 5);
        assert_eq!(tool.name(), "sightseeingSearch");
        assert_eq!(tool.data_item(), Some(DataItemKind::SightSearch));
    }

    #[tokio::test]
    async fn test_hotel_search_with_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/location/search"))
            .and(query_param("category", "hotels"))
            .and(query_param("searchQuery", "spa"))
            .and(query_param("key", "ta-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{
                    "location_id": "123", "name": "Hotel Azul", "distance": "0.4",
                    "address_obj": {"address_string": "Rua 1, Lisbon"}
                }]
            })))
            .mount(&server)
            .await;

        let tools = tools(&server);
        let out = find(&tools, "hotelSearch")
            .execute(
                json!({"lat": 38.7, "long": -9.1, "query": "spa"}),
                ToolContext::new(ThreadId::new()),
            )
            .await
            .unwrap();
        assert_eq!(out.content[0]["locationId"], "123");
        assert_eq!(out.content[0]["address"], "Rua 1, Lisbon");
    }

    #[tokio::test]
    async fn test_empty_search_says_so() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/location/nearby_search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let tools = tools(&server);
        let out = find(&tools, "hotelSearch")
            .execute(json!({"lat": 0.0, "long": 0.0}), ToolContext::new(ThreadId::new()))
            .await
            .unwrap();
        assert_eq!(out.content, json!("No hotels found"));
    }

    #[tokio::test]
    async fn test_reviews_accept_numeric_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/location/77/reviews"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"title": "Lovely", "rating": 5, "text": "Great view", "travel_date": "2026-05"}]
            })))
            .mount(&server)
            .await;

        let tools = tools(&server);
        let out = find(&tools, "sightseeingReviews")
            .execute(json!({"locationId": 77}), ToolContext::new(ThreadId::new()))
            .await
            .unwrap();
        assert_eq!(out.content["locationId"], "77");
        assert_eq!(out.content["reviews"][0]["rating"], 5);
    }

    #[tokio::test]
    async fn test_upstream_error_is_tool_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let tools = tools(&server);
        let err = find(&tools, "hotelDetails")
            .execute(json!({"locationId": "1"}), ToolContext::new(ThreadId::new()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("HTTP 500"));
    }
}
