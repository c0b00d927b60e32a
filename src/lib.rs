//! Turn free-form text into [Mermaid](https://mermaid.js.org/) diagrams using a streaming LLM.
//!
//! Mermaid Weaver sends the supplied content to an OpenAI compatible chat completion endpoint
//! (by default [Groq](https://console.groq.com/)), streams the answer back fragment by fragment,
//! locates the diagram code inside the generated text and cleans it up so that mermaid.js can
//! render it.
//!
//! Central to Mermaid Weaver is the [`Loom`], which drives a single generation from prompt to
//! [`Extraction`]. The [`Config`] trait supplies the request parameters and the [`Llm`] used to
//! answer. [`OpenAiCompatible`] is the out of the box [`Llm`] implementation.
//!
//! API keys are kept by a [`KeyChestHandler`]. [`FileKeyChest`] stores the key in a single file
//! inside the platform configuration directory.
//!
//! # Example
//!
//! ```ignore
//! use mermaid_weaver::{Config, Loom, Models, OpenAiCompatible};
//!
//! #[derive(Debug)]
//! struct App;
//!
//! impl Config for App {
//! 	type PromptModel = OpenAiCompatible;
//! }
//!
//! #[tokio::main]
//! async fn main() -> mermaid_weaver::Result<()> {
//! 	let llm = OpenAiCompatible::groq(std::env::var("GROQ_API_KEY")?, Models::Llama3_8b);
//! 	let loom = Loom::<App>::new(llm);
//!
//! 	let weave = loom
//! 		.weave_with("Users log in, browse the catalog and check out", |delta| print!("{delta}"))
//! 		.await?;
//!
//! 	println!("\n{}", weave.extraction.code);
//! 	Ok(())
//! }
//! ```

use std::{fmt::Debug, pin::Pin};

use async_trait::async_trait;
use futures::Stream;

pub mod architecture;
pub mod extract;
pub mod loom;
pub mod openai;
pub mod render;
pub mod storage;
pub mod types;

#[cfg(test)]
mod mock;
#[cfg(test)]
mod tests;

pub use extract::{clean_mermaid_code, extract_mermaid_code, Extraction, ExtractionSource};
pub use loom::{Loom, Weave};
pub use openai::{Models, OpenAiCompatible};
pub use storage::{file::FileKeyChest, KeyChestHandler};
pub use types::{PromptMessage, StreamError, Tokens};

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Incremental text fragments of a streamed completion.
pub type DeltaStream = Pin<Box<dyn Stream<Item = std::result::Result<String, StreamError>> + Send>>;

/// A trait consisting of the main configuration parameters for [`Loom`].
pub trait Config: Debug + Sized + Send + Sync + 'static {
	/// The sampling temperature, between 0 and 2. Higher values like 0.8 will make the output more
	/// random, while lower values like 0.2 will make it more focused and deterministic.
	///
	/// Defaults to `0.7`
	const TEMPERATURE: f32 = 0.7;
	/// Nucleus sampling. Only the tokens comprising the top `TOP_P` probability mass are
	/// considered.
	///
	/// Defaults to `1.0`
	const TOP_P: f32 = 1.0;
	/// Maximum number of tokens the LLM may generate for a single diagram.
	///
	/// Defaults to `1024`
	const MAX_TOKENS: Tokens = 1024;

	/// The LLM used to generate diagrams.
	type PromptModel: Llm<Self>;
}

/// An LLM able to stream a chat completion.
///
/// Implementations translate [`PromptMessage`]s into the request format of their provider and
/// expose the answer as a [`DeltaStream`].
#[async_trait]
pub trait Llm<T: Config>: Debug + Send + Sync {
	/// Model name sent to the provider.
	fn name(&self) -> &'static str;

	/// Maximum number of tokens, prompt and completion combined, the model can process at once.
	fn max_context_length(&self) -> Tokens;

	/// Approximate number of tokens in `content`.
	fn count_tokens(&self, content: &str) -> Result<Tokens>;

	/// Open a streaming completion for `msgs`.
	///
	/// The returned stream ends once the provider signals the end of the completion.
	/// Implementations read [`Config::TEMPERATURE`] and [`Config::TOP_P`] from `T`.
	async fn prompt_stream(&self, msgs: Vec<PromptMessage>, max_tokens: Tokens)
		-> Result<DeltaStream>;
}
