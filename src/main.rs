use awards_api::{config::AppConfig, init_server, observability::init_tracing};
use std::env;
use std::process;

#[tokio::main]
async fn main() {
    // Get config file path from command line or use default
    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "config/awards.yaml".to_string());

    // Load configuration
    let config = match AppConfig::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from {}: {}", config_path, e);
            eprintln!("Usage: awards-api [config_file]");
            process::exit(1);
        }
    };

    init_tracing(&config.logging);

    // Start the server
    if let Err(e) = init_server(config).await {
        eprintln!("Server error: {}", e);
        process::exit(1);
    }
}
