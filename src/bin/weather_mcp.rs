use std::process;
use std::sync::Arc;
use tracing::{error, info};

use mcp2ai::logging;
use mcp2ai::server::serve_stdio;
use mcp2ai::weather::{WeatherService, WeatherSettings};

#[tokio::main]
async fn main() {
    logging::init(false);

    let settings = match WeatherSettings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let service = match WeatherService::new(settings) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    info!(base_url = %service.settings().base_url, "starting weather MCP server");

    if let Err(e) = serve_stdio(service).await {
        error!("server stopped: {}", e);
        process::exit(1);
    }
}
