use async_trait::async_trait;

pub mod file;

/// A storage handler trait for keeping the API key used to authenticate with the LLM provider.
///
/// Exactly one key is kept. Saving a key replaces the previous one.
///
/// # Usage
///
/// Implementations of `KeyChestHandler` should provide the storage and retrieval mechanisms
/// tailored to specific use-cases, such as the file system, an OS keyring or an in-memory store.
///
/// Checkout the out of the box implementation [`file::FileKeyChest`] which stores the key in the
/// platform configuration directory.
#[async_trait]
pub trait KeyChestHandler: Send + Sync {
	/// Saves `api_key`, replacing any previously saved key.
	///
	/// Blank keys are rejected.
	async fn save_api_key(&self, api_key: &str) -> crate::Result<()>;
	/// Retrieves the saved key.
	///
	/// Returns `Ok(None)` when no key was saved.
	async fn get_api_key(&self) -> crate::Result<Option<String>>;
	/// Deletes the saved key. Deleting when nothing is saved is not an error.
	async fn delete_api_key(&self) -> crate::Result<()>;
}

/// Picks the API key to use.
///
/// An `explicit` key wins over the key saved in `chest`, which wins over the `fallback` (usually
/// read from the environment). Blank keys are ignored. Without a `chest` only `explicit` and
/// `fallback` are considered.
pub async fn resolve_api_key<C: KeyChestHandler>(
	chest: Option<&C>,
	explicit: Option<String>,
	fallback: Option<String>,
) -> crate::Result<Option<String>> {
	let not_blank = |key: &String| !key.trim().is_empty();

	if let Some(key) = explicit.filter(not_blank) {
		return Ok(Some(key))
	}

	let saved = match chest {
		Some(chest) => chest.get_api_key().await?,
		None => None,
	};

	match saved {
		Some(key) if not_blank(&key) => Ok(Some(key)),
		_ => Ok(fallback.filter(not_blank)),
	}
}
