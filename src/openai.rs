//! [`Llm`] implementation for OpenAI compatible chat completion endpoints.

use std::fmt::{self, Debug};

use async_openai::types::{
	ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
	ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
	CreateChatCompletionRequestArgs, CreateChatCompletionStreamResponse, Role,
};
use async_trait::async_trait;
use clap::{builder::PossibleValue, ValueEnum};
use eventsource_stream::{EventStreamError, Eventsource};
use futures::{future, StreamExt};
use tiktoken_rs::p50k_base;
use tracing::{debug, error, instrument};

use crate::{
	types::{LoomError, PromptMessage, StreamError, Tokens, WeaveError},
	Config, DeltaStream, Llm, Result,
};

/// Base URL of Groq's OpenAI compatible API.
pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";

/// Data of the server sent event that ends a completion stream.
const DONE: &str = "[DONE]";

/// The Groq hosted language models that are available to use.
#[derive(PartialEq, Eq, Clone, Debug, Copy, Default)]
pub enum Models {
	#[default]
	Llama3_8b,
	Llama3_70b,
	Mixtral8x7b,
	Gemma7b,
}

/// Clap value enum implementation for argument parsing.
impl ValueEnum for Models {
	fn value_variants<'a>() -> &'a [Self] {
		&[Self::Llama3_8b, Self::Llama3_70b, Self::Mixtral8x7b, Self::Gemma7b]
	}

	fn to_possible_value(&self) -> Option<PossibleValue> {
		Some(PossibleValue::new(self.name()))
	}
}

impl Models {
	/// Get the model name.
	pub fn name(&self) -> &'static str {
		match self {
			Self::Llama3_8b => "llama3-8b-8192",
			Self::Llama3_70b => "llama3-70b-8192",
			Self::Mixtral8x7b => "mixtral-8x7b-32768",
			Self::Gemma7b => "gemma-7b-it",
		}
	}

	/// Maximum number of tokens that can be processed at once by the model.
	pub fn max_context_tokens(&self) -> Tokens {
		match self {
			Self::Llama3_8b | Self::Llama3_70b | Self::Gemma7b => 8_192,
			Self::Mixtral8x7b => 32_768,
		}
	}
}

/// Streams completions from an OpenAI compatible endpoint.
#[derive(Clone)]
pub struct OpenAiCompatible {
	client: reqwest::Client,
	api_base: String,
	api_key: String,
	model: Models,
}

impl Debug for OpenAiCompatible {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("OpenAiCompatible")
			.field("api_base", &self.api_base)
			.field("model", &self.model)
			.finish_non_exhaustive()
	}
}

impl OpenAiCompatible {
	/// Creates a client for `api_base` authenticated with `api_key`.
	pub fn new(api_base: impl Into<String>, api_key: impl Into<String>, model: Models) -> Self {
		let api_base = api_base.into().trim_end_matches('/').to_string();

		Self { client: reqwest::Client::new(), api_base, api_key: api_key.into(), model }
	}

	/// Creates a client for Groq.
	pub fn groq(api_key: impl Into<String>, model: Models) -> Self {
		Self::new(GROQ_API_BASE, api_key, model)
	}

	pub fn model(&self) -> Models {
		self.model
	}

	fn build_messages(msgs: Vec<PromptMessage>) -> Result<Vec<ChatCompletionRequestMessage>> {
		msgs.into_iter()
			.map(|msg| -> Result<ChatCompletionRequestMessage> {
				let req_msg: ChatCompletionRequestMessage = match Role::from(msg.role.clone()) {
					Role::System => ChatCompletionRequestSystemMessageArgs::default()
						.content(msg.content)
						.build()?
						.into(),
					Role::User => ChatCompletionRequestUserMessageArgs::default()
						.content(msg.content)
						.build()?
						.into(),
					Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
						.content(msg.content)
						.build()?
						.into(),
					_ => return Err(LoomError::from(WeaveError::BadRole(msg.role.to_string())).into()),
				};

				Ok(req_msg)
			})
			.collect()
	}
}

/// Text carried by a stream chunk. Chunks without content count as empty text.
fn delta_content(chunk: CreateChatCompletionStreamResponse) -> String {
	chunk.choices.into_iter().next().and_then(|choice| choice.delta.content).unwrap_or_default()
}

/// Decodes the data of one server sent event into the text it carries.
fn decode_chunk(data: &str) -> std::result::Result<String, StreamError> {
	serde_json::from_str::<CreateChatCompletionStreamResponse>(data)
		.map(delta_content)
		.map_err(|e| StreamError::MalformedChunk(e.to_string()))
}

fn map_event_error(e: EventStreamError<reqwest::Error>) -> StreamError {
	match e {
		EventStreamError::Transport(e) => StreamError::Transport(e.to_string()),
		e => StreamError::MalformedChunk(e.to_string()),
	}
}

#[async_trait]
impl<T: Config> Llm<T> for OpenAiCompatible {
	fn name(&self) -> &'static str {
		self.model.name()
	}

	fn max_context_length(&self) -> Tokens {
		self.model.max_context_tokens()
	}

	fn count_tokens(&self, content: &str) -> Result<Tokens> {
		let bpe = p50k_base()?;
		let tokens = bpe.encode_with_special_tokens(content);

		tokens.len().try_into().map_err(|_| {
			LoomError::from(WeaveError::BadConfig(format!(
				"Number of tokens exceeds max tokens for model: {}",
				tokens.len()
			)))
			.into()
		})
	}

	#[instrument(skip(self, msgs), fields(model = self.model.name()))]
	async fn prompt_stream(
		&self,
		msgs: Vec<PromptMessage>,
		max_tokens: Tokens,
	) -> Result<DeltaStream> {
		let request = CreateChatCompletionRequestArgs::default()
			.model(self.model.name())
			.messages(Self::build_messages(msgs)?)
			.temperature(T::TEMPERATURE)
			.max_tokens(max_tokens)
			.top_p(T::TOP_P)
			.stream(true)
			.build()?;

		let url = format!("{}/chat/completions", self.api_base);
		debug!(url = %url, "Opening completion stream");

		let response =
			self.client.post(&url).bearer_auth(&self.api_key).json(&request).send().await.map_err(
				|e| {
					error!("Failed to prompt LLM: {}", e);
					LoomError::from(WeaveError::FailedPrompt(e.to_string()))
				},
			)?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			error!(status = status.as_u16(), "Failed to prompt LLM: {}", body);
			return Err(LoomError::from(WeaveError::FailedPrompt(format!(
				"HTTP error! status: {}, body: {}",
				status.as_u16(),
				body
			)))
			.into())
		}

		Ok(response
			.bytes_stream()
			.eventsource()
			.take_while(|event| {
				future::ready(!matches!(event, Ok(event) if event.data.trim() == DONE))
			})
			.filter(|event| {
				future::ready(!matches!(event, Ok(event) if event.data.trim().is_empty()))
			})
			.map(|event| match event {
				Ok(event) => decode_chunk(&event.data),
				Err(e) => Err(map_event_error(e)),
			})
			.boxed())
	}
}
