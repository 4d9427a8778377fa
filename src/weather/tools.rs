use serde_json::{json, Map, Value};

use super::WeatherError;
use crate::backend::types::McpTool;

pub const GET_CURRENT_WEATHER: &str = "get_current_weather";

/// Every call the weather server accepts, parsed from its wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeatherTool {
    GetCurrentWeather {
        city: String,
        country: Option<String>,
    },
}

impl WeatherTool {
    pub fn definitions() -> Vec<McpTool> {
        vec![McpTool {
            name: GET_CURRENT_WEATHER.to_string(),
            description: Some(
                "Get the current weather for a specified city. Returns temperature, humidity, conditions, and more."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "city": {
                        "type": "string",
                        "description": "The city name (e.g., 'London', 'San Francisco')"
                    },
                    "country": {
                        "type": "string",
                        "description": "Optional ISO 3166 country code (e.g., 'US', 'GB', 'FR')"
                    }
                },
                "required": ["city"]
            }),
        }]
    }

    pub fn parse(name: &str, arguments: &Map<String, Value>) -> Result<Self, WeatherError> {
        match name {
            GET_CURRENT_WEATHER => {
                let city = match arguments.get("city") {
                    Some(Value::String(city)) if !city.trim().is_empty() => city.trim().to_string(),
                    Some(Value::String(_)) | None | Some(Value::Null) => {
                        return Err(WeatherError::InvalidArguments(
                            "Missing required parameter: city".to_string(),
                        ))
                    }
                    Some(_) => {
                        return Err(WeatherError::InvalidArguments(
                            "Parameter 'city' must be a string".to_string(),
                        ))
                    }
                };

                let country = match arguments.get("country") {
                    Some(Value::String(country)) if !country.trim().is_empty() => {
                        Some(country.trim().to_string())
                    }
                    Some(Value::String(_)) | None | Some(Value::Null) => None,
                    Some(_) => {
                        return Err(WeatherError::InvalidArguments(
                            "Parameter 'country' must be a string".to_string(),
                        ))
                    }
                };

                Ok(WeatherTool::GetCurrentWeather { city, country })
            }
            other => Err(WeatherError::UnknownTool(other.to_string())),
        }
    }
}
