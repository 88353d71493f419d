//! File-based storage backend for the escrow service.
//!
//! This module provides a concrete implementation of the StorageInterface
//! trait that stores each value as a JSON document on the filesystem. Writes
//! go through a temp-file-then-rename step so a crash mid-write never leaves
//! a truncated record behind.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

/// File-based storage implementation.
///
/// Keys are sanitized into filesystem-safe file names under a base
/// directory, one file per record.
pub struct FileStorage {
	/// Base directory path for storing files.
	base_path: PathBuf,
}

impl FileStorage {
	/// Creates a new FileStorage instance with the specified base path.
	pub fn new(base_path: PathBuf) -> Self {
		Self { base_path }
	}

	/// Converts a storage key to a filesystem-safe file path.
	///
	/// Sanitizes the key by replacing problematic characters and
	/// appending a .json extension.
	fn get_file_path(&self, key: &str) -> PathBuf {
		self.base_path.join(format!("{}.json", sanitize_key(key)))
	}
}

/// Replaces path-hostile characters so a key maps to a single flat file.
fn sanitize_key(key: &str) -> String {
	key.replace(['/', ':', '\\'], "_")
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let path = self.get_file_path(key);

		match fs::read(&path).await {
			Ok(data) => Ok(data),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let path = self.get_file_path(key);

		// Create parent directory if it doesn't exist
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}

		// Write atomically by writing to temp file then renaming
		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, value)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let path = self.get_file_path(key);

		match fs::remove_file(&path).await {
			Ok(_) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let path = self.get_file_path(key);
		Ok(path.exists())
	}

	async fn list_bytes(&self, prefix: &str) -> Result<Vec<Vec<u8>>, StorageError> {
		let file_prefix = sanitize_key(prefix);

		let mut entries = match fs::read_dir(&self.base_path).await {
			Ok(entries) => entries,
			// An empty store has no directory yet
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		let mut results = Vec::new();
		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let path = entry.path();
			if path.extension() != Some(std::ffi::OsStr::new("json")) {
				continue;
			}
			let matches_prefix = path
				.file_stem()
				.and_then(|s| s.to_str())
				.is_some_and(|stem| stem.starts_with(&file_prefix));
			if !matches_prefix {
				continue;
			}

			match fs::read(&path).await {
				Ok(data) => results.push(data),
				Err(e) => {
					tracing::warn!("Skipping file {:?}: could not be read: {}", path, e);
				},
			}
		}

		Ok(results)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory for file storage (default: "./data/storage")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/storage")
		.to_string();

	Ok(Box::new(FileStorage::new(PathBuf::from(storage_path))))
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	fn storage() -> (TempDir, FileStorage) {
		let dir = TempDir::new().unwrap();
		let storage = FileStorage::new(dir.path().to_path_buf());
		(dir, storage)
	}

	#[tokio::test]
	async fn test_round_trip_and_delete() {
		let (_dir, storage) = storage();

		storage
			.set_bytes("orders:abc", b"{\"id\":\"abc\"}".to_vec())
			.await
			.unwrap();
		assert!(storage.exists("orders:abc").await.unwrap());

		let data = storage.get_bytes("orders:abc").await.unwrap();
		assert_eq!(data, b"{\"id\":\"abc\"}");

		storage.delete("orders:abc").await.unwrap();
		let result = storage.get_bytes("orders:abc").await;
		assert!(matches!(result, Err(StorageError::NotFound)));
	}

	#[tokio::test]
	async fn test_missing_key_is_not_found() {
		let (_dir, storage) = storage();
		let result = storage.get_bytes("orders:nope").await;
		assert!(matches!(result, Err(StorageError::NotFound)));
	}

	#[tokio::test]
	async fn test_list_by_prefix() {
		let (_dir, storage) = storage();

		storage.set_bytes("orders:1", b"a".to_vec()).await.unwrap();
		storage.set_bytes("orders:2", b"b".to_vec()).await.unwrap();
		storage.set_bytes("users:1", b"c".to_vec()).await.unwrap();

		let listed = storage.list_bytes("orders:").await.unwrap();
		assert_eq!(listed.len(), 2);
	}

	#[tokio::test]
	async fn test_list_on_empty_store() {
		let dir = TempDir::new().unwrap();
		let storage = FileStorage::new(dir.path().join("never_created"));
		let listed = storage.list_bytes("orders:").await.unwrap();
		assert!(listed.is_empty());
	}
}
