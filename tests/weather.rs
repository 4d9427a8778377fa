use mcp2ai::error::Mcp2AiError;
use mcp2ai::server::ToolService;
use mcp2ai::weather::{
    parse_weather_response, WeatherError, WeatherService, WeatherSettings, WeatherTool,
};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

fn owm_body() -> Value {
    json!({
        "name": "Tokyo",
        "sys": { "country": "JP" },
        "main": { "temp": 18.4, "feels_like": 17.9, "humidity": 62, "pressure": 1015 },
        "weather": [{ "main": "Clear", "description": "clear sky" }],
        "wind": { "speed": 3.6 },
        "clouds": { "all": 0 }
    })
}

fn args(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn settings(base_url: &str) -> WeatherSettings {
    WeatherSettings {
        api_key: "test-key".to_string(),
        base_url: base_url.to_string(),
        request_timeout: Duration::from_secs(5),
    }
}

/// Answers a single HTTP request and resolves to its request line.
async fn http_stub(status: &'static str, body: String) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 2048];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();

        String::from_utf8_lossy(&request)
            .lines()
            .next()
            .unwrap_or_default()
            .to_string()
    });

    (url, handle)
}

#[test]
fn test_parse_tool_arguments() {
    let tool = WeatherTool::parse(
        "get_current_weather",
        &args(json!({"city": " Tokyo ", "country": "JP"})),
    )
    .unwrap();
    assert_eq!(
        tool,
        WeatherTool::GetCurrentWeather {
            city: "Tokyo".to_string(),
            country: Some("JP".to_string())
        }
    );

    let tool = WeatherTool::parse("get_current_weather", &args(json!({"city": "Paris", "country": ""})))
        .unwrap();
    assert_eq!(
        tool,
        WeatherTool::GetCurrentWeather {
            city: "Paris".to_string(),
            country: None
        }
    );
}

#[test]
fn test_parse_tool_rejects_bad_input() {
    let err = WeatherTool::parse("get_current_weather", &args(json!({}))).unwrap_err();
    assert_eq!(err.to_string(), "Invalid arguments: Missing required parameter: city");

    let err = WeatherTool::parse("get_current_weather", &args(json!({"city": 7}))).unwrap_err();
    assert!(matches!(err, WeatherError::InvalidArguments(_)));

    let err = WeatherTool::parse("get_forecast", &args(json!({"city": "Oslo"}))).unwrap_err();
    assert_eq!(err.to_string(), "Unknown tool: get_forecast");
}

#[test]
fn test_tool_definitions() {
    let tools = WeatherTool::definitions();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "get_current_weather");
    assert_eq!(tools[0].input_schema["required"], json!(["city"]));
}

#[test]
fn test_parse_weather_response() {
    let data = parse_weather_response(&owm_body()).unwrap();
    assert_eq!(data.city, "Tokyo");
    assert_eq!(data.country, "JP");
    assert_eq!(data.temperature, 18.4);
    assert_eq!(data.humidity, 62);
    assert_eq!(data.pressure, 1015);
    assert_eq!(data.description, "clear sky");
    assert_eq!(data.wind_speed, 3.6);
    assert_eq!(data.clouds, 0);
}

#[test]
fn test_parse_weather_response_missing_fields() {
    let mut body = owm_body();
    body["main"].as_object_mut().unwrap().remove("temp");
    let err = parse_weather_response(&body).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid response from weather service: missing 'main.temp'"
    );

    let mut body = owm_body();
    body["weather"] = json!([]);
    assert!(matches!(
        parse_weather_response(&body),
        Err(WeatherError::InvalidResponse(_))
    ));
}

#[test]
fn test_settings_from_lookup() {
    let settings = WeatherSettings::from_lookup(|name| match name {
        "OPENWEATHERMAP_API_KEY" => Some("abc123".to_string()),
        "OPENWEATHERMAP_BASE_URL" => Some("http://localhost:9000/data/2.5/".to_string()),
        "REQUEST_TIMEOUT" => Some("3".to_string()),
        _ => None,
    })
    .unwrap();

    assert_eq!(settings.api_key, "abc123");
    assert_eq!(settings.weather_api_url(), "http://localhost:9000/data/2.5/weather");
    assert_eq!(settings.request_timeout, Duration::from_secs(3));
    assert!(!format!("{:?}", settings).contains("abc123"));

    let defaults = WeatherSettings::from_lookup(|name| {
        (name == "OPENWEATHERMAP_API_KEY").then(|| "k".to_string())
    })
    .unwrap();
    assert_eq!(
        defaults.weather_api_url(),
        "https://api.openweathermap.org/data/2.5/weather"
    );
    assert_eq!(defaults.request_timeout, Duration::from_secs(10));
}

#[test]
fn test_settings_require_api_key() {
    let err = WeatherSettings::from_lookup(|_| None).unwrap_err();
    match err {
        Mcp2AiError::Config(message) => {
            assert_eq!(message, "OPENWEATHERMAP_API_KEY environment variable not set")
        }
        other => panic!("expected Config error, got {:?}", other),
    }

    let err = WeatherSettings::from_lookup(|name| match name {
        "OPENWEATHERMAP_API_KEY" => Some("k".to_string()),
        "REQUEST_TIMEOUT" => Some("soon".to_string()),
        _ => None,
    })
    .unwrap_err();
    assert!(matches!(err, Mcp2AiError::Config(_)));
}

#[tokio::test]
async fn test_call_tool_success() {
    let (url, stub) = http_stub("200 OK", owm_body().to_string()).await;
    let service = WeatherService::new(settings(&url)).unwrap();

    let result = service
        .call_tool("get_current_weather", args(json!({"city": "Tokyo", "country": "JP"})))
        .await;

    assert!(result.is_error.is_none());
    let text = result.content[0].text.clone().unwrap();
    let payload: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(payload["city"], "Tokyo");
    assert_eq!(payload["temperature"], 18.4);

    let request_line = stub.await.unwrap();
    assert!(request_line.starts_with("GET /weather?"));
    assert!(request_line.contains("q=Tokyo%2CJP"));
    assert!(request_line.contains("units=metric"));
    assert!(request_line.contains("appid=test-key"));
}

#[tokio::test]
async fn test_call_tool_city_not_found() {
    let (url, _stub) = http_stub(
        "404 Not Found",
        json!({"cod": "404", "message": "city not found"}).to_string(),
    )
    .await;
    let service = WeatherService::new(settings(&url)).unwrap();

    let result = service
        .call_tool("get_current_weather", args(json!({"city": "Atlantis"})))
        .await;

    assert_eq!(result.is_error, Some(true));
    assert_eq!(
        result.content[0].text.as_deref(),
        Some("City 'Atlantis' not found. Please check the city name and country code.")
    );
}

#[tokio::test]
async fn test_call_tool_invalid_key() {
    let (url, _stub) = http_stub("401 Unauthorized", json!({"cod": 401}).to_string()).await;
    let service = WeatherService::new(settings(&url)).unwrap();

    let err = service.get_current_weather("Tokyo", None).await.unwrap_err();
    assert!(matches!(err, WeatherError::InvalidApiKey));
}

#[tokio::test]
async fn test_call_tool_errors_are_results() {
    let service = WeatherService::new(settings("http://127.0.0.1:9")).unwrap();

    let missing = service.call_tool("get_current_weather", Map::new()).await;
    assert_eq!(missing.is_error, Some(true));
    assert_eq!(
        missing.content[0].text.as_deref(),
        Some("Invalid arguments: Missing required parameter: city")
    );

    let unknown = service.call_tool("get_forecast", Map::new()).await;
    assert_eq!(unknown.is_error, Some(true));
}

#[tokio::test]
async fn test_unreachable_service_does_not_leak_key() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let service = WeatherService::new(settings(&url)).unwrap();
    let result = service
        .call_tool("get_current_weather", args(json!({"city": "Tokyo"})))
        .await;

    assert_eq!(result.is_error, Some(true));
    let text = result.content[0].text.clone().unwrap();
    assert!(!text.contains("test-key"), "{}", text);
}
