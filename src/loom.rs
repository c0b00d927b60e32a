use std::marker::PhantomData;

use futures::StreamExt;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::{
	extract::{extract_mermaid_code, Extraction},
	types::{LoomError, PromptMessage, StreamError, WeaveError},
	Config, Llm, Result,
};

/// Instructions sent as the system message of every prompt.
pub const SYSTEM_INSTRUCTIONS: &str = "You are a helpful assistant that generates Mermaid diagram code. Generate the Mermaid code directly without any markdown formatting. Use simple node names without spaces or special characters.";

/// Preamble of the user message. The content to diagram is appended to it.
pub const USER_PREAMBLE: &str = "Please analyze and generate a Mermaid diagram code for this content, using the graph LR format. Use simple node names without spaces or special characters: ";

/// Outcome of a single [`Loom::weave`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Weave {
	/// Full text streamed back by the LLM.
	pub response: String,
	/// Diagram code found in `response`.
	pub extraction: Extraction,
	/// Stream chunks which could not be decoded and were skipped.
	pub chunk_errors: Vec<String>,
}

/// The machine that drives a diagram generation, from the user content to the extracted Mermaid
/// code.
///
/// This is implemented over the [`Config`] trait.
#[derive(Debug)]
pub struct Loom<T: Config> {
	pub model: T::PromptModel,
	_phantom: PhantomData<T>,
}

impl<T: Config> Loom<T> {
	/// Creates a new instance of `Loom`.
	pub fn new(model: T::PromptModel) -> Self {
		Self { model, _phantom: PhantomData }
	}

	/// Generates a diagram for `input`, discarding the intermediate fragments.
	///
	/// See [`Loom::weave_with`].
	pub async fn weave(&self, input: &str) -> Result<Weave> {
		self.weave_with(input, |_| {}).await
	}

	/// Prompt the LLM for a Mermaid diagram describing `input`.
	///
	/// Every text fragment is handed to `on_delta` as soon as it arrives, then the diagram code is
	/// extracted from the complete response.
	///
	/// Fragments that cannot be decoded are skipped and reported in [`Weave::chunk_errors`]. If
	/// the stream breaks off, [`WeaveError::Interrupted`] is returned with the text received so
	/// far.
	#[instrument(skip(self, input, on_delta), fields(model = self.model.name()))]
	pub async fn weave_with<F>(&self, input: &str, mut on_delta: F) -> Result<Weave>
	where
		F: FnMut(&str) + Send,
	{
		if input.trim().is_empty() {
			return Err(LoomError::from(WeaveError::EmptyInput).into())
		}

		let msgs = Self::build_messages(input);

		let prompt_tokens = msgs.iter().try_fold(0u32, |acc, msg| {
			self.model.count_tokens(&msg.content).map(|t| acc.saturating_add(t))
		})?;
		let context_length = self.model.max_context_length();

		trace!(prompt_tokens, max_tokens = T::MAX_TOKENS, context_length, "Prompt token budget");

		if prompt_tokens.saturating_add(T::MAX_TOKENS) > context_length {
			return Err(LoomError::from(WeaveError::PromptTooLong {
				prompt_tokens,
				max_tokens: T::MAX_TOKENS,
				context_length,
			})
			.into())
		}

		let mut stream = self.model.prompt_stream(msgs, T::MAX_TOKENS).await.map_err(|e| {
			error!("Failed to prompt LLM: {}", e);
			e
		})?;

		let mut response = String::new();
		let mut chunk_errors = Vec::new();

		while let Some(delta) = stream.next().await {
			match delta {
				Ok(text) => {
					on_delta(&text);
					response.push_str(&text);
				},
				Err(StreamError::MalformedChunk(e)) => {
					error!("Error parsing JSON: {}", e);
					chunk_errors.push(e);
				},
				Err(StreamError::Transport(reason)) => {
					error!("Completion stream interrupted: {}", reason);
					return Err(
						LoomError::from(WeaveError::Interrupted { reason, partial: response }).into()
					)
				},
			}
		}

		debug!(response_len = response.len(), skipped = chunk_errors.len(), "Stream finished");

		let extraction = extract_mermaid_code(&response);

		match extraction.is_found() {
			true => info!(source = ?extraction.source, "Mermaid diagram generated"),
			false => warn!("Response did not contain a Mermaid diagram"),
		}

		Ok(Weave { response, extraction, chunk_errors })
	}

	/// Builds the system and user messages for `input`.
	pub fn build_messages(input: &str) -> Vec<PromptMessage> {
		vec![
			PromptMessage::system(SYSTEM_INSTRUCTIONS),
			PromptMessage::user(format!("{}{}", USER_PREAMBLE, input)),
		]
	}
}
