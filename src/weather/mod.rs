//! The `get_current_weather` tool, backed by OpenWeatherMap.

mod config;
mod service;
mod tools;

use thiserror::Error;

pub use config::WeatherSettings;
pub use service::{parse_weather_response, WeatherData, WeatherService};
pub use tools::WeatherTool;

/// Failures of a weather tool call. The display text is what the model
/// sees, so it never includes the request URL (which carries the API key).
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Cannot connect to weather service. Please check your internet connection.")]
    Connect,

    #[error("Weather service request timed out. Please try again.")]
    Timeout,

    #[error("Invalid API key. Please check your OPENWEATHERMAP_API_KEY.")]
    InvalidApiKey,

    #[error("City '{0}' not found. Please check the city name and country code.")]
    CityNotFound(String),

    #[error("Weather service error: {0}")]
    Service(String),

    #[error("Invalid response from weather service: {0}")]
    InvalidResponse(String),
}
