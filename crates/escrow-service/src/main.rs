//! Main entry point for the Micro-Job escrow service.
//!
//! This binary wires together configuration, storage and the escrow state
//! machine, then serves the HTTP API until interrupted.

use clap::Parser;
use escrow_config::Config;
use escrow_core::EscrowService;
use escrow_storage::StorageService;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

mod server;

use escrow_storage::implementations::file::create_storage as create_file_storage;
use escrow_storage::implementations::memory::create_storage as create_memory_storage;

/// Command-line arguments for the escrow service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

/// Main entry point for the escrow service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Builds the storage backend and the escrow state machine
/// 5. Serves the HTTP API until interrupted
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	// Create env filter with default from args
	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started escrow service");

	// Load configuration
	let config_path = args
		.config
		.to_str()
		.ok_or("Configuration path is not valid UTF-8")?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	// Build the storage backend selected in config
	let backend_config = toml::Value::Table(config.storage.config.clone());
	let backend = match config.storage.backend.as_str() {
		"file" => create_file_storage(&backend_config)?,
		"memory" => create_memory_storage(&backend_config)?,
		// Unreachable after config validation, kept for safety
		other => return Err(format!("Unknown storage backend: {}", other).into()),
	};
	let storage = Arc::new(StorageService::new(backend));

	// Build the escrow state machine
	let funding_expiry = config
		.escrow
		.funding_expiry_secs
		.map(Duration::from_secs);
	let escrow = Arc::new(EscrowService::new(storage).with_funding_expiry(funding_expiry));

	// Check if API server should be started
	match config.api {
		Some(api_config) if api_config.enabled => {
			server::start_server(api_config, escrow).await?;
		},
		_ => {
			tracing::warn!("API server disabled in configuration; nothing to serve");
		},
	}

	tracing::info!("Escrow service stopped");
	Ok(())
}
