use std::path::PathBuf;
use std::sync::Arc;

use hello_metrics::config::{load_config, print_schema};
use hello_metrics::startup;
use hello_metrics::utils::init_logging;

const DEFAULT_CONFIG_PATH: &str = "./config.yaml";

#[tokio::main]
async fn main() {
    let arg = std::env::args().nth(1);

    if arg.as_deref() == Some("--schema") {
        if let Err(e) = print_schema() {
            eprintln!("Error printing configuration schema: {}", e);
            std::process::exit(1);
        }
        return;
    }

    let path = arg
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let config = match load_config(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Error initialising logging: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = startup::run(Arc::new(config)).await {
        tracing::error!(error = %e, "server failed");
        std::process::exit(1);
    }
}
