pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod models;
pub mod orchestrator;
pub mod registry;
pub mod retry;
pub mod server;
pub mod ui;
pub mod weather;

pub use error::{Mcp2AiError, Result};
