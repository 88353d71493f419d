//! Configuration loader module for handling modular configuration files.
//!
//! This module provides functionality to load configuration from multiple
//! files and validate that sections are unique across files to prevent merge
//! conflicts.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Configuration loader that handles multi-file configurations with includes.
pub struct ConfigLoader {
	/// Base path for resolving relative includes
	base_path: PathBuf,
	/// Track loaded files to prevent circular includes
	loaded_files: HashSet<PathBuf>,
	/// Which file first claimed each top-level section
	section_sources: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	/// Creates a new ConfigLoader with the given base path.
	pub fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			loaded_files: HashSet::new(),
			section_sources: HashMap::new(),
		}
	}

	/// Loads a configuration file plus everything its `include` directive
	/// names, merging the fragments into one document.
	///
	/// A top-level section may appear in exactly one file of the set.
	pub async fn load_config(
		&mut self,
		config_path: impl AsRef<Path>,
	) -> Result<Config, ConfigError> {
		let main_path = self.resolve_path(config_path)?;
		let main_content = self.load_file(&main_path).await?;
		let mut combined: toml::Value = toml::from_str(&main_content)?;

		let includes = take_includes(&mut combined)?;
		self.claim_sections(&combined, &main_path)?;

		for include in includes {
			let fragment_path = self.resolve_path(&include)?;
			let fragment_content = self.load_file(&fragment_path).await?;
			let fragment: toml::Value = toml::from_str(&fragment_content)?;
			self.claim_sections(&fragment, &fragment_path)?;

			if let (Some(into), Some(from)) = (combined.as_table_mut(), fragment.as_table()) {
				for (key, value) in from {
					into.insert(key.clone(), value.clone());
				}
			}
		}

		let combined_str = toml::to_string(&combined).map_err(|e| {
			ConfigError::Parse(format!("Failed to serialize combined config: {}", e))
		})?;
		combined_str.parse()
	}

	/// Loads a file and resolves environment variables.
	async fn load_file(&mut self, path: &Path) -> Result<String, ConfigError> {
		// Check for circular includes
		let canonical_path = path.canonicalize().map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Cannot resolve path {}: {}", path.display(), e),
			))
		})?;

		if !self.loaded_files.insert(canonical_path.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include detected: {} was already loaded",
				canonical_path.display()
			)));
		}

		let content = std::fs::read_to_string(path)?;
		resolve_env_vars(&content)
	}

	/// Records `source` as the owner of each top-level section in `toml`,
	/// rejecting sections another file already claimed.
	fn claim_sections(&mut self, toml: &toml::Value, source: &Path) -> Result<(), ConfigError> {
		if let Some(table) = toml.as_table() {
			for key in table.keys() {
				if let Some(existing) = self
					.section_sources
					.insert(key.clone(), source.to_path_buf())
				{
					return Err(ConfigError::Validation(format!(
						"Duplicate section '{}' found in {} and {}. \
						Each top-level section must be unique across all configuration files.",
						key,
						existing.display(),
						source.display()
					)));
				}
			}
		}
		Ok(())
	}

	/// Resolves a path relative to the base path.
	fn resolve_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
		let path = path.as_ref();

		let resolved = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_path.join(path)
		};

		// Verify the file exists
		if !resolved.exists() {
			return Err(ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", resolved.display()),
			)));
		}

		Ok(resolved)
	}
}

/// Removes the `include` directive from the document, returning the
/// referenced paths. Accepts a single string or an array of strings.
fn take_includes(toml: &mut toml::Value) -> Result<Vec<PathBuf>, ConfigError> {
	match toml.as_table_mut().and_then(|t| t.remove("include")) {
		None => Ok(Vec::new()),
		Some(toml::Value::String(path)) => Ok(vec![PathBuf::from(path)]),
		Some(toml::Value::Array(items)) => items
			.into_iter()
			.map(|item| match item {
				toml::Value::String(path) => Ok(PathBuf::from(path)),
				_ => Err(ConfigError::Validation(
					"Include array must contain only strings".into(),
				)),
			})
			.collect(),
		Some(_) => Err(ConfigError::Validation(
			"Include must be a string or array of strings".into(),
		)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	#[tokio::test]
	async fn test_single_file_config() {
		let temp_dir = TempDir::new().unwrap();
		let config_path = temp_dir.path().join("config.toml");

		let config_content = r#"
[service]
id = "escrow-test"

[storage]
backend = "memory"

[api]
host = "127.0.0.1"
port = 3001
"#;

		fs::write(&config_path, config_content).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config(&config_path).await.unwrap();

		assert_eq!(config.service.id, "escrow-test");
	}

	#[tokio::test]
	async fn test_config_with_includes() {
		let temp_dir = TempDir::new().unwrap();

		// Main config
		let main_config = r#"
include = ["storage.toml", "api.toml"]
[service]
id = "escrow-test"
"#;

		// Storage config
		let storage_config = r#"
[storage]
backend = "file"
[storage.config]
storage_path = "./data/orders"
"#;

		// API config
		let api_config = r#"
[api]
host = "127.0.0.1"
port = 3001

[escrow]
funding_expiry_secs = 3600
"#;

		fs::write(temp_dir.path().join("main.toml"), main_config).unwrap();
		fs::write(temp_dir.path().join("storage.toml"), storage_config).unwrap();
		fs::write(temp_dir.path().join("api.toml"), api_config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config("main.toml").await.unwrap();

		assert_eq!(config.service.id, "escrow-test");
		assert_eq!(config.storage.backend, "file");
		assert_eq!(config.escrow.funding_expiry_secs, Some(3600));
	}

	#[tokio::test]
	async fn test_single_string_include() {
		let temp_dir = TempDir::new().unwrap();

		let main_config = r#"
include = "storage.toml"

[service]
id = "escrow-test"

[api]
host = "127.0.0.1"
port = 3001
"#;

		let storage_config = r#"
[storage]
backend = "memory"
"#;

		fs::write(temp_dir.path().join("main.toml"), main_config).unwrap();
		fs::write(temp_dir.path().join("storage.toml"), storage_config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config("main.toml").await.unwrap();

		assert_eq!(config.storage.backend, "memory");
	}

	#[tokio::test]
	async fn test_duplicate_section_error() {
		let temp_dir = TempDir::new().unwrap();

		// Main config with service section
		let main_config = r#"
include = ["duplicate.toml"]

[service]
id = "escrow-test"
"#;

		// Include with duplicate service section (should cause error)
		let duplicate_config = r#"
[service]
id = "another-service"
"#;

		fs::write(temp_dir.path().join("main.toml"), main_config).unwrap();
		fs::write(temp_dir.path().join("duplicate.toml"), duplicate_config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let result = loader.load_config("main.toml").await;

		assert!(result.is_err());
		let error_msg = result.unwrap_err().to_string();
		assert!(error_msg.contains("Duplicate section 'service'"));
	}

	#[tokio::test]
	async fn test_self_include_detection() {
		let temp_dir = TempDir::new().unwrap();

		// Create a config that includes itself
		let config = r#"
include = ["self.toml"]

[service]
id = "escrow-test"
"#;

		fs::write(temp_dir.path().join("self.toml"), config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let result = loader.load_config("self.toml").await;

		assert!(result.is_err());
		let error_msg = result.unwrap_err().to_string();
		assert!(error_msg.contains("already loaded"));
	}
}
