//! Configuration module for the escrow service.
//!
//! This module provides structures and utilities for managing the service
//! configuration. It supports loading configuration from TOML files and
//! provides validation to ensure all required configuration values are
//! properly set.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files for better organization:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

mod loader;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		let message = err.message().to_string();
		ConfigError::Parse(message)
	}
}

/// Main configuration structure for the escrow service.
///
/// This structure contains all configuration sections required for the
/// service to operate: service identity, storage backend selection, escrow
/// policy knobs and the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Configuration specific to this service instance.
	pub service: ServiceConfig,
	/// Configuration for the storage backend.
	pub storage: StorageConfig,
	/// Escrow policy settings.
	#[serde(default)]
	pub escrow: EscrowSettings,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Configuration specific to the service instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Unique identifier for this service instance.
	pub id: String,
	/// Optional free-form description shown in logs.
	pub description: Option<String>,
}

/// Storage backend names accepted by the service.
pub const STORAGE_BACKENDS: &[&str] = &["file", "memory"];

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which backend to use ("file" or "memory").
	pub backend: String,
	/// Backend-specific configuration table.
	#[serde(default)]
	pub config: toml::Table,
}

/// Escrow policy settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EscrowSettings {
	/// Optional window, in seconds, during which an unfunded order can
	/// still have its funding confirmed. When elapsed, confirm-funding is
	/// rejected and only an admin dispute resolution can close the order.
	pub funding_expiry_secs: Option<u64>,
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default = "default_api_enabled")]
	pub enabled: bool,
	/// Host address to bind to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to listen on.
	pub port: u16,
}

fn default_api_enabled() -> bool {
	true
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	// Limit input size to prevent ReDoS attacks
	const MAX_INPUT_SIZE: usize = 1024 * 1024; // 1MB
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = input.to_string();
	let mut replacements = Vec::new();

	for cap in re.captures_iter(input) {
		let full_match = cap.get(0).unwrap();
		let var_name = cap.get(1).unwrap().as_str();
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name) {
			Ok(v) => v,
			Err(_) => {
				if let Some(default) = default_value {
					default.to_string()
				} else {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name
					)));
				}
			},
		};

		replacements.push((full_match.start(), full_match.end(), value));
	}

	// Apply replacements in reverse order to maintain positions
	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(start..end, value);
	}

	Ok(result)
}

impl Config {
	/// Loads configuration from a file with environment variable resolution.
	///
	/// This method supports modular configuration through include directives:
	/// - `include = ["file1.toml", "file2.toml"]` - Include specific files
	///
	/// Each top-level section must be unique across all configuration files.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Validates the configuration to ensure all required fields are properly set.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.is_empty() {
			return Err(ConfigError::Validation("Service ID cannot be empty".into()));
		}

		if !STORAGE_BACKENDS.contains(&self.storage.backend.as_str()) {
			return Err(ConfigError::Validation(format!(
				"Unknown storage backend '{}'; expected one of {:?}",
				self.storage.backend, STORAGE_BACKENDS
			)));
		}

		if let Some(api) = &self.api {
			if api.enabled && api.port == 0 {
				return Err(ConfigError::Validation(
					"API port must be non-zero when the API is enabled".into(),
				));
			}
		}

		Ok(())
	}
}

impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_env_var_resolution() {
		// Set up test environment variables
		std::env::set_var("ESCROW_TEST_HOST", "localhost");
		std::env::set_var("ESCROW_TEST_PORT", "8080");

		let input = "host = \"${ESCROW_TEST_HOST}:${ESCROW_TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "host = \"localhost:8080\"");

		// Clean up
		std::env::remove_var("ESCROW_TEST_HOST");
		std::env::remove_var("ESCROW_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${MISSING_VAR:-default_value}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "value = \"default_value\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let input = "value = \"${MISSING_VAR}\"";
		let result = resolve_env_vars(input);
		assert!(result.is_err());
		assert!(result.unwrap_err().to_string().contains("MISSING_VAR"));
	}

	#[test]
	fn test_parse_minimal_config() {
		let config: Config = r#"
[service]
id = "escrow-test"

[storage]
backend = "memory"
"#
		.parse()
		.unwrap();

		assert_eq!(config.service.id, "escrow-test");
		assert_eq!(config.storage.backend, "memory");
		assert!(config.escrow.funding_expiry_secs.is_none());
		assert!(config.api.is_none());
	}

	#[test]
	fn test_parse_full_config() {
		let config: Config = r#"
[service]
id = "escrow-prod"
description = "Micro-Job escrow"

[storage]
backend = "file"
[storage.config]
storage_path = "./data/orders"

[escrow]
funding_expiry_secs = 86400

[api]
host = "0.0.0.0"
port = 3001
"#
		.parse()
		.unwrap();

		assert_eq!(config.storage.backend, "file");
		assert_eq!(config.escrow.funding_expiry_secs, Some(86400));
		let api = config.api.unwrap();
		assert!(api.enabled);
		assert_eq!(api.port, 3001);
	}

	#[test]
	fn test_unknown_backend_rejected() {
		let result = r#"
[service]
id = "escrow-test"

[storage]
backend = "mongodb"
"#
		.parse::<Config>();

		assert!(result.is_err());
		assert!(result
			.unwrap_err()
			.to_string()
			.contains("Unknown storage backend"));
	}

	#[test]
	fn test_empty_service_id_rejected() {
		let result = r#"
[service]
id = ""

[storage]
backend = "memory"
"#
		.parse::<Config>();

		assert!(result.is_err());
	}

	#[test]
	fn test_zero_api_port_rejected() {
		let result = r#"
[service]
id = "escrow-test"

[storage]
backend = "memory"

[api]
port = 0
"#
		.parse::<Config>();

		assert!(result.is_err());
	}
}
