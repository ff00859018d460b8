use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use wayfarer_core::config::OpenMeteoConfig;
use wayfarer_core::error::Result;
use wayfarer_core::event::DataItemKind;
use wayfarer_core::traits::Tool;
use wayfarer_core::types::{ToolContext, ToolOutput};

use super::{parse_input, send_json, tool_err};

/// Resolves a free-text place name to coordinates via Open-Meteo geocoding.
pub struct GeocodeTool {
    http: reqwest::Client,
    url: String,
    timeout: u64,
}

impl GeocodeTool {
    pub fn new(http: reqwest::Client, config: &OpenMeteoConfig, timeout: u64) -> Self {
        Self {
            http,
            url: config.geocode_url.clone(),
            timeout,
        }
    }
}

#[derive(Deserialize)]
struct GeocodeInput {
    location: String,
}

impl Tool for GeocodeTool {
    fn name(&self) -> &str {
        "geocode"
    }

    fn description(&self) -> &str {
        "Look up the latitude and longitude of a city or place. Call this before any tool that needs coordinates."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "location": {
                    "type": "string",
                    "description": "Place name, e.g. 'Kyoto' or 'Porto, Portugal'"
                }
            },
            "required": ["location"]
        })
    }

    fn timeout_secs(&self) -> u64 {
        self.timeout
    }

    fn execute(&self, input: Value, _ctx: ToolContext) -> BoxFuture<'_, Result<ToolOutput>> {
        Box::pin(async move {
            let params: GeocodeInput = parse_input(self.name(), input)?;
            // Open-Meteo matches on the leading place name only.
            let name = params.location.split(',').next().unwrap_or_default().trim();
            debug!(location = %params.location, "Geocoding");

            let body = send_json(
                self.name(),
                self.http.get(&self.url).query(&[
                    ("name", name),
                    ("count", "1"),
                    ("language", "en"),
                    ("format", "json"),
                ]),
            )
            .await?;

            let Some(place) = body["results"].as_array().and_then(|r| r.first()) else {
                return Err(tool_err(
                    self.name(),
                    format!("no location found for '{}'", params.location),
                ));
            };

            let formatted = ["name", "admin1", "country"]
                .iter()
                .filter_map(|k| place[*k].as_str())
                .collect::<Vec<_>>()
                .join(", ");

            Ok(ToolOutput::success(json!({
                "lat": place["latitude"],
                "long": place["longitude"],
                "formattedName": formatted,
            })))
        })
    }
}

/// Multi-day forecast for a coordinate pair.
pub struct WeatherForecastTool {
    http: reqwest::Client,
    url: String,
    days: u8,
    timeout: u64,
}

impl WeatherForecastTool {
    pub fn new(http: reqwest::Client, config: &OpenMeteoConfig, timeout: u64) -> Self {
        Self {
            http,
            url: config.forecast_url.clone(),
            days: config.forecast_days,
            timeout,
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct Coordinates {
    pub lat: f64,
    pub long: f64,
}

impl Tool for WeatherForecastTool {
    fn name(&self) -> &str {
        "weatherForecast"
    }

    fn description(&self) -> &str {
        "Daily weather forecast (temperatures, precipitation chance, conditions) for a latitude/longitude."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "lat": { "type": "number" },
                "long": { "type": "number" }
            },
            "required": ["lat", "long"]
        })
    }

    fn timeout_secs(&self) -> u64 {
        self.timeout
    }

    fn data_item(&self) -> Option<DataItemKind> {
        Some(DataItemKind::Weather)
    }

    fn execute(&self, input: Value, _ctx: ToolContext) -> BoxFuture<'_, Result<ToolOutput>> {
        Box::pin(async move {
            let at: Coordinates = parse_input(self.name(), input)?;

            let body = send_json(
                self.name(),
                self.http.get(&self.url).query(&[
                    ("latitude", at.lat.to_string()),
                    ("longitude", at.long.to_string()),
                    (
                        "daily",
                        "weather_code,temperature_2m_max,temperature_2m_min,precipitation_probability_max"
                            .to_string(),
                    ),
                    ("timezone", "auto".to_string()),
                    ("forecast_days", self.days.to_string()),
                ]),
            )
            .await?;

            Ok(ToolOutput::success(reshape_forecast(&at, &body)?))
        })
    }
}

/// Turn Open-Meteo's column-oriented `daily` block into one object per day.
fn reshape_forecast(at: &Coordinates, body: &Value) -> Result<Value> {
    let daily = &body["daily"];
    let dates = daily["time"]
        .as_array()
        .ok_or_else(|| tool_err("weatherForecast", "response has no daily forecast"))?;

    let column = |key: &str, i: usize| daily[key].get(i).cloned().unwrap_or(Value::Null);
    let days: Vec<Value> = dates
        .iter()
        .enumerate()
        .map(|(i, date)| {
            json!({
                "date": date,
                "weatherCode": column("weather_code", i),
                "tempMax": column("temperature_2m_max", i),
                "tempMin": column("temperature_2m_min", i),
                "precipitationChance": column("precipitation_probability_max", i),
            })
        })
        .collect();

    Ok(json!({
        "lat": at.lat,
        "long": at.long,
        "timezone": body["timezone"],
        "units": body["daily_units"],
        "days": days,
    }))
}
