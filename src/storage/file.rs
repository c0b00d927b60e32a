use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use crate::types::{LoomError, StorageError};

use super::KeyChestHandler;

/// Directory created inside the platform configuration directory.
const APP_DIR: &str = "mermaid-weaver";
/// Name of the file holding the key.
const CREDENTIALS_FILE: &str = "credentials.json";

/// On-disk layout of the credentials file.
#[derive(Debug, Serialize, Deserialize)]
struct Credentials {
	groq_api_key: String,
	saved_at: String,
}

/// Default implementation of [`KeyChestHandler`].
///
/// Keeps the key in a JSON file, by default `<config dir>/mermaid-weaver/credentials.json`.
#[derive(Debug, Clone)]
pub struct FileKeyChest {
	path: PathBuf,
}

impl FileKeyChest {
	/// Creates a chest backed by the file at `path`.
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// Creates a chest backed by the credentials file in the platform configuration directory.
	pub fn new_default() -> Result<Self, StorageError> {
		let dir = dirs::config_dir().ok_or(StorageError::NoConfigDir)?;
		Ok(Self::new(dir.join(APP_DIR).join(CREDENTIALS_FILE)))
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

#[async_trait]
impl KeyChestHandler for FileKeyChest {
	#[instrument(skip(self, api_key), fields(path = %self.path.display()))]
	async fn save_api_key(&self, api_key: &str) -> crate::Result<()> {
		let api_key = api_key.trim();
		if api_key.is_empty() {
			return Err(LoomError::from(StorageError::EmptyKey).into())
		}

		if let Some(parent) = self.path.parent() {
			tokio::fs::create_dir_all(parent).await.map_err(|e| {
				error!("Failed to create {}: {}", parent.display(), e);
				LoomError::from(StorageError::Io(e))
			})?;
		}

		let credentials = Credentials {
			groq_api_key: api_key.to_string(),
			saved_at: chrono::Utc::now().to_rfc3339(),
		};
		let contents = serde_json::to_vec_pretty(&credentials)
			.map_err(|e| LoomError::from(StorageError::Parsing(e)))?;

		tokio::fs::write(&self.path, contents).await.map_err(|e| {
			error!("Failed to write API key: {}", e);
			LoomError::from(StorageError::Io(e))
		})?;

		#[cfg(unix)]
		{
			use std::os::unix::fs::PermissionsExt;

			tokio::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
				.await
				.map_err(|e| LoomError::from(StorageError::Io(e)))?;
		}

		debug!("Saved API key");

		Ok(())
	}

	#[instrument(skip(self), fields(path = %self.path.display()))]
	async fn get_api_key(&self) -> crate::Result<Option<String>> {
		let contents = match tokio::fs::read(&self.path).await {
			Ok(contents) => contents,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(e) => {
				error!("Failed to read API key: {}", e);
				return Err(LoomError::from(StorageError::Io(e)).into())
			},
		};

		let credentials: Credentials = serde_json::from_slice(&contents).map_err(|e| {
			error!("Failed to parse credentials file: {}", e);
			LoomError::from(StorageError::Parsing(e))
		})?;

		Ok(Some(credentials.groq_api_key).filter(|key| !key.is_empty()))
	}

	#[instrument(skip(self), fields(path = %self.path.display()))]
	async fn delete_api_key(&self) -> crate::Result<()> {
		match tokio::fs::remove_file(&self.path).await {
			Ok(()) => {
				debug!("Deleted API key");
				Ok(())
			},
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(LoomError::from(StorageError::Io(e)).into()),
		}
	}
}
