use std::fmt::Display;

use async_openai::types::Role;

/// Number of LLM tokens.
pub type Tokens = u32;

pub const SYSTEM_ROLE: &str = "system";
pub const ASSISTANT_ROLE: &str = "assistant";
pub const USER_ROLE: &str = "user";

/// Wrapped [`Role`] for custom implementations.
#[derive(Debug, Clone, PartialEq)]
pub enum WrapperRole {
	Role(Role),
}

impl Default for WrapperRole {
	fn default() -> Self {
		Self::Role(Role::User)
	}
}

impl From<WrapperRole> for Role {
	fn from(role: WrapperRole) -> Self {
		match role {
			WrapperRole::Role(role) => role,
		}
	}
}

impl TryFrom<&str> for WrapperRole {
	type Error = WeaveError;

	fn try_from(role: &str) -> Result<Self, Self::Error> {
		match role {
			SYSTEM_ROLE => Ok(Self::Role(Role::System)),
			ASSISTANT_ROLE => Ok(Self::Role(Role::Assistant)),
			USER_ROLE => Ok(Self::Role(Role::User)),
			_ => Err(WeaveError::BadRole(role.to_string())),
		}
	}
}

impl Display for WrapperRole {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Role(Role::System) => write!(f, "{}", SYSTEM_ROLE),
			Self::Role(Role::Assistant) => write!(f, "{}", ASSISTANT_ROLE),
			Self::Role(Role::User) => write!(f, "{}", USER_ROLE),
			Self::Role(other) => write!(f, "{:?}", other),
		}
	}
}

/// A single message sent to the [`Llm`](crate::Llm).
#[derive(Debug, Clone, PartialEq)]
pub struct PromptMessage {
	pub role: WrapperRole,
	pub content: String,
}

impl PromptMessage {
	pub fn new(role: WrapperRole, content: String) -> Self {
		Self { role, content }
	}

	pub fn system(content: impl Into<String>) -> Self {
		Self::new(WrapperRole::Role(Role::System), content.into())
	}

	pub fn user(content: impl Into<String>) -> Self {
		Self::new(WrapperRole::Role(Role::User), content.into())
	}
}

/// Failure of a single item of a [`DeltaStream`](crate::DeltaStream).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StreamError {
	/// A server-sent event could not be decoded. The stream carries on after it.
	MalformedChunk(String),
	/// The connection failed or the endpoint answered with an error. Nothing follows it.
	Transport(String),
}

impl Display for StreamError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::MalformedChunk(msg) => write!(f, "Error parsing JSON: {}", msg),
			Self::Transport(msg) => write!(f, "{}", msg),
		}
	}
}

#[derive(Debug, thiserror::Error)]
pub enum LoomError {
	Weave(#[from] WeaveError),
	Storage(#[from] StorageError),
}

impl Display for LoomError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Weave(e) => write!(f, "{}", e),
			Self::Storage(e) => write!(f, "{}", e),
		}
	}
}

#[derive(Debug, thiserror::Error)]
pub enum WeaveError {
	/// Nothing to generate a diagram from.
	EmptyInput,
	/// Prompt and completion budget do not fit in the model context window.
	PromptTooLong { prompt_tokens: Tokens, max_tokens: Tokens, context_length: Tokens },
	/// Failed to open the completion stream.
	FailedPrompt(String),
	/// The completion stream broke off. Holds whatever was received before.
	Interrupted { reason: String, partial: String },
	/// A role the LLM does not accept.
	BadRole(String),
	/// Bad configuration
	BadConfig(String),
}

impl Display for WeaveError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::EmptyInput => write!(f, "Input is empty"),
			Self::PromptTooLong { prompt_tokens, max_tokens, context_length } => write!(
				f,
				"Prompt is too long: {} prompt tokens + {} completion tokens exceed the context length of {}",
				prompt_tokens, max_tokens, context_length
			),
			Self::FailedPrompt(msg) => write!(f, "Failed to prompt LLM: {}", msg),
			Self::Interrupted { reason, .. } => write!(f, "Stream interrupted: {}", reason),
			Self::BadRole(role) => write!(f, "Bad role: {}", role),
			Self::BadConfig(msg) => write!(f, "Bad configuration: {}", msg),
		}
	}
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
	Io(#[from] std::io::Error),
	Parsing(#[from] serde_json::Error),
	/// An API key made only of whitespace.
	EmptyKey,
	/// No platform configuration directory to keep the key in.
	NoConfigDir,
}

impl Display for StorageError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			StorageError::Io(e) => write!(f, "IO error: {}", e),
			StorageError::Parsing(e) => write!(f, "Parsing error: {}", e),
			StorageError::EmptyKey => write!(f, "API key cannot be empty"),
			StorageError::NoConfigDir => write!(f, "Could not determine a configuration directory"),
		}
	}
}
