use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use super::{WeatherError, WeatherSettings, WeatherTool};
use crate::backend::types::{McpTool, McpToolResult, ServerInfo};
use crate::error::Result;
use crate::server::ToolService;

pub const SERVER_NAME: &str = "weather-mcp-server";

/// Current conditions for one city, in metric units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherData {
    pub city: String,
    pub country: String,
    /// Celsius
    pub temperature: f64,
    pub feels_like: f64,
    /// Percent
    pub humidity: i64,
    /// hPa
    pub pressure: i64,
    pub description: String,
    /// m/s
    pub wind_speed: f64,
    /// Cloud cover, percent
    pub clouds: i64,
}

pub struct WeatherService {
    client: reqwest::Client,
    settings: WeatherSettings,
}

impl WeatherService {
    pub fn new(settings: WeatherSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &WeatherSettings {
        &self.settings
    }

    pub async fn get_current_weather(
        &self,
        city: &str,
        country: Option<&str>,
    ) -> std::result::Result<WeatherData, WeatherError> {
        let location = match country {
            Some(country) => format!("{},{}", city, country),
            None => city.to_string(),
        };
        info!(location = %location, "fetching weather");

        let response = self
            .client
            .get(self.settings.weather_api_url())
            .query(&[
                ("q", location.as_str()),
                ("appid", self.settings.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        let body = response.text().await.map_err(classify_request_error)?;

        match status {
            s if s.is_success() => {}
            StatusCode::UNAUTHORIZED => return Err(WeatherError::InvalidApiKey),
            StatusCode::NOT_FOUND => return Err(WeatherError::CityNotFound(location)),
            other => {
                warn!(status = %other, "weather API error");
                return Err(WeatherError::Service(format!("{}: {}", other, body.trim())));
            }
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| WeatherError::InvalidResponse(format!("not JSON: {}", e)))?;
        let data = parse_weather_response(&value)?;
        debug!(city = %data.city, country = %data.country, "weather parsed");
        Ok(data)
    }

    async fn run(&self, tool: WeatherTool) -> std::result::Result<Value, WeatherError> {
        match tool {
            WeatherTool::GetCurrentWeather { city, country } => {
                let data = self.get_current_weather(&city, country.as_deref()).await?;
                serde_json::to_value(data)
                    .map_err(|e| WeatherError::InvalidResponse(e.to_string()))
            }
        }
    }
}

fn classify_request_error(err: reqwest::Error) -> WeatherError {
    let err = err.without_url();
    if err.is_timeout() {
        WeatherError::Timeout
    } else if err.is_connect() {
        WeatherError::Connect
    } else {
        WeatherError::Service(err.to_string())
    }
}

/// Pull the fields we report out of an OpenWeatherMap current-weather body.
pub fn parse_weather_response(data: &Value) -> std::result::Result<WeatherData, WeatherError> {
    fn field<'a>(data: &'a Value, path: &[&str]) -> std::result::Result<&'a Value, WeatherError> {
        path.iter()
            .try_fold(data, |value, key| value.get(*key))
            .ok_or_else(|| WeatherError::InvalidResponse(format!("missing '{}'", path.join("."))))
    }

    fn number(data: &Value, path: &[&str]) -> std::result::Result<f64, WeatherError> {
        field(data, path)?.as_f64().ok_or_else(|| {
            WeatherError::InvalidResponse(format!("'{}' is not a number", path.join(".")))
        })
    }

    fn text(data: &Value, path: &[&str]) -> std::result::Result<String, WeatherError> {
        field(data, path)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                WeatherError::InvalidResponse(format!("'{}' is not a string", path.join(".")))
            })
    }

    let description = data
        .get("weather")
        .and_then(Value::as_array)
        .and_then(|conditions| conditions.first())
        .and_then(|first| first.get("description"))
        .and_then(Value::as_str)
        .ok_or_else(|| WeatherError::InvalidResponse("missing 'weather[0].description'".into()))?
        .to_string();

    Ok(WeatherData {
        city: text(data, &["name"])?,
        country: text(data, &["sys", "country"])?,
        temperature: number(data, &["main", "temp"])?,
        feels_like: number(data, &["main", "feels_like"])?,
        humidity: number(data, &["main", "humidity"])?.round() as i64,
        pressure: number(data, &["main", "pressure"])?.round() as i64,
        description,
        wind_speed: number(data, &["wind", "speed"])?,
        clouds: number(data, &["clouds", "all"])?.round() as i64,
    })
}

#[async_trait]
impl ToolService for WeatherService {
    fn server_info(&self) -> ServerInfo {
        ServerInfo {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    fn tools(&self) -> Vec<McpTool> {
        WeatherTool::definitions()
    }

    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> McpToolResult {
        let outcome = match WeatherTool::parse(name, &arguments) {
            Ok(tool) => self.run(tool).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(payload) => match serde_json::to_string_pretty(&payload) {
                Ok(text) => McpToolResult::text(text),
                Err(e) => McpToolResult::error(e.to_string()),
            },
            Err(e) => {
                error!(tool = name, "tool call failed: {}", e);
                McpToolResult::error(e.to_string())
            }
        }
    }
}
