use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;

use crate::*;

use crate::types::{LoomError, StorageError, WeaveError};

/// LLM replaying a scripted stream.
#[derive(Debug, Default)]
pub struct MockLlm {
	pub deltas: Vec<std::result::Result<String, StreamError>>,
	pub context_length: Tokens,
	pub fail_prompt: bool,
	/// Messages received by the last [`Llm::prompt_stream`] call.
	pub received: Mutex<Vec<PromptMessage>>,
}

impl MockLlm {
	pub fn new<I, S>(deltas: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self::with_results(deltas.into_iter().map(|d| Ok(d.into())))
	}

	pub fn with_results(
		deltas: impl IntoIterator<Item = std::result::Result<String, StreamError>>,
	) -> Self {
		Self { deltas: deltas.into_iter().collect(), context_length: 8_192, ..Default::default() }
	}
}

#[async_trait]
impl Llm<MockConfig> for MockLlm {
	fn name(&self) -> &'static str {
		"MockLlm"
	}

	fn max_context_length(&self) -> Tokens {
		self.context_length
	}

	/// One token per whitespace separated word.
	fn count_tokens(&self, content: &str) -> Result<Tokens> {
		Ok(content.split_whitespace().count() as Tokens)
	}

	async fn prompt_stream(
		&self,
		msgs: Vec<PromptMessage>,
		_max_tokens: Tokens,
	) -> Result<DeltaStream> {
		*self.received.lock().unwrap() = msgs;

		if self.fail_prompt {
			return Err(LoomError::from(WeaveError::FailedPrompt("HTTP error! status: 401".into()))
				.into())
		}

		Ok(futures::stream::iter(self.deltas.clone()).boxed())
	}
}

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct MockConfig;
impl Config for MockConfig {
	const MAX_TOKENS: Tokens = 100;

	type PromptModel = MockLlm;
}

/// In-memory [`KeyChestHandler`].
#[derive(Debug, Default)]
pub struct MockChest {
	key: Mutex<Option<String>>,
}

#[async_trait]
impl KeyChestHandler for MockChest {
	async fn save_api_key(&self, api_key: &str) -> Result<()> {
		if api_key.trim().is_empty() {
			return Err(LoomError::from(StorageError::EmptyKey).into())
		}
		*self.key.lock().unwrap() = Some(api_key.trim().to_string());
		Ok(())
	}

	async fn get_api_key(&self) -> Result<Option<String>> {
		Ok(self.key.lock().unwrap().clone())
	}

	async fn delete_api_key(&self) -> Result<()> {
		*self.key.lock().unwrap() = None;
		Ok(())
	}
}
