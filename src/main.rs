use std::{
	error::Error,
	io::Write,
	path::{Path, PathBuf},
};

use clap::{Parser, Subcommand};
use mermaid_weaver::{
	extract::NO_DIAGRAM_FOUND,
	render,
	storage::resolve_api_key,
	types::{LoomError, WeaveError},
	Config, FileKeyChest, KeyChestHandler, Loom, Models, OpenAiCompatible,
};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tracing::{info, warn, Level};
use tracing_subscriber::fmt;

/// Environment variable consulted when no API key is passed or stored.
const API_KEY_ENV: &str = "GROQ_API_KEY";

#[derive(Parser, Debug)]
#[command(version, about = "Generate Mermaid diagrams from free-form text with Groq")]
struct Args {
	/// Log level
	#[arg(long, default_value = "info", global = true)]
	log_level: Level,
	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Manage the locally stored Groq API key.
	Key {
		#[command(subcommand)]
		action: KeyAction,
	},
	/// Generate a diagram from text read from `--input` or stdin.
	///
	/// The response is streamed to stderr while it arrives and the cleaned Mermaid code is
	/// printed to stdout.
	Generate {
		/// File holding the content to diagram. Reads stdin when omitted.
		#[arg(long)]
		input: Option<PathBuf>,
		/// Model to prompt.
		#[arg(long, value_enum, default_value_t = Models::default())]
		model: Models,
		/// API key to use instead of the stored one.
		#[arg(long)]
		api_key: Option<String>,
		/// Write the Mermaid code to this file.
		#[arg(long)]
		output: Option<PathBuf>,
		/// Write an HTML page rendering the diagram to this file.
		#[arg(long)]
		html: Option<PathBuf>,
		/// Write the raw streamed response to this file.
		#[arg(long)]
		transcript: Option<PathBuf>,
	},
	/// Render a Mermaid file, for instance after editing generated code by hand.
	Render {
		/// Mermaid code to render.
		file: PathBuf,
		/// HTML page to write.
		#[arg(long)]
		html: PathBuf,
		/// Page title.
		#[arg(long, default_value = "Mermaid Diagram")]
		title: String,
	},
}

#[derive(Subcommand, Debug)]
enum KeyAction {
	/// Store an API key. Prompts for it when omitted.
	Set { key: Option<String> },
	/// Remove the stored API key.
	Clear,
	/// Tell whether an API key is stored.
	Status,
}

/// Configuration of the diagram generator.
#[derive(Debug)]
struct DiagramApp;

impl Config for DiagramApp {
	type PromptModel = OpenAiCompatible;
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
	let args = Args::parse();

	let subscriber = fmt::Subscriber::builder()
		.with_max_level(args.log_level)
		.with_writer(std::io::stderr)
		.finish();
	tracing::subscriber::set_global_default(subscriber)?;

	info!(task = "tracing_setup", result = "success", "tracing successfully set up");

	dotenv::dotenv().ok();

	info!(task = "dotenv_setup", result = "success", "dotenv loaded successfully");

	match args.command {
		Command::Key { action } => run_key(&FileKeyChest::new_default()?, action).await,
		Command::Generate { input, model, api_key, output, html, transcript } =>
			run_generate(input, model, api_key, output, html, transcript).await,
		Command::Render { file, html, title } => {
			let code = tokio::fs::read_to_string(&file).await?;
			write_file(&html, render::html_document(&code, &title)).await
		},
	}
}

async fn run_key(
	chest: &FileKeyChest,
	action: KeyAction,
) -> Result<(), Box<dyn Error + Send + Sync>> {
	match action {
		KeyAction::Set { key } => {
			let key = match key {
				Some(key) => key,
				None => {
					eprint!("Enter your GROQ API Key: ");
					std::io::stderr().flush()?;
					let mut line = String::new();
					BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
					line
				},
			};
			chest.save_api_key(&key).await?;
			println!("API Key is set and stored locally.");
		},
		KeyAction::Clear => {
			chest.delete_api_key().await?;
			println!("API Key cleared.");
		},
		KeyAction::Status => match chest.get_api_key().await? {
			Some(_) => println!("API Key is set and stored locally ({}).", chest.path().display()),
			None => println!("No API Key stored."),
		},
	}

	Ok(())
}

async fn run_generate(
	input: Option<PathBuf>,
	model: Models,
	api_key: Option<String>,
	output: Option<PathBuf>,
	html: Option<PathBuf>,
	transcript: Option<PathBuf>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
	let chest = match api_key.as_deref().map(str::trim) {
		Some(key) if !key.is_empty() => None,
		_ => FileKeyChest::new_default()
			.map_err(|e| warn!("Ignoring the stored API key: {}", e))
			.ok(),
	};

	let api_key = resolve_api_key(chest.as_ref(), api_key, std::env::var(API_KEY_ENV).ok())
		.await?
		.ok_or_else(|| {
			format!("No API key found. Run `mermaid-weaver key set` or set {}", API_KEY_ENV)
		})?;

	let content = match input {
		Some(path) => tokio::fs::read_to_string(path).await?,
		None => read_stdin().await?,
	};

	let loom = Loom::<DiagramApp>::new(OpenAiCompatible::groq(api_key, model));

	let mut stderr = std::io::stderr();
	let weave = match loom
		.weave_with(&content, |delta| {
			let _ = write!(stderr, "{}", delta);
			let _ = stderr.flush();
		})
		.await
	{
		Ok(weave) => weave,
		Err(e) => {
			eprintln!();
			if let Some(path) = &transcript {
				save_partial_response(path, &*e).await?;
			}
			return Err(format!("Failed to generate Mermaid diagram: {}", e).into())
		},
	};
	eprintln!();

	for chunk_error in &weave.chunk_errors {
		warn!("Error parsing JSON: {}", chunk_error);
	}

	if let Some(path) = transcript {
		write_file(&path, weave.response.clone()).await?;
	}
	if let Some(path) = output {
		write_file(&path, format!("{}\n", weave.extraction.code)).await?;
	}
	if let Some(path) = html {
		write_file(&path, render::html_document(&weave.extraction.code, "Mermaid Diagram")).await?;
	}

	println!("{}", weave.extraction.code);

	match weave.extraction.is_found() {
		true => Ok(()),
		false => Err(NO_DIAGRAM_FOUND.into()),
	}
}

/// Writes the response received before the stream broke off to `path`.
///
/// Returns whether `err` carried a partial response.
async fn save_partial_response(
	path: &Path,
	err: &(dyn Error + Send + Sync + 'static),
) -> Result<bool, Box<dyn Error + Send + Sync>> {
	match err.downcast_ref::<LoomError>() {
		Some(LoomError::Weave(WeaveError::Interrupted { partial, .. })) => {
			write_file(path, partial.clone()).await?;
			Ok(true)
		},
		_ => Ok(false),
	}
}

async fn read_stdin() -> Result<String, Box<dyn Error + Send + Sync>> {
	let mut buf = String::new();
	tokio::io::stdin().read_to_string(&mut buf).await?;
	Ok(buf)
}

async fn write_file(path: &Path, contents: String) -> Result<(), Box<dyn Error + Send + Sync>> {
	tokio::fs::write(path, contents).await?;
	info!("Wrote {}", path.display());
	Ok(())
}
