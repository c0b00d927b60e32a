/// The following diagram shows how a diagram generation flows through the library and how the
/// command line application drives it.
///
/// Only the traits [`Llm`](crate::Llm), [`Config`](crate::Config) and
/// [`KeyChestHandler`](crate::KeyChestHandler) are expanded.
#[cfg_attr(doc, aquamarine::aquamarine)]
/// ```mermaid
/// graph TB
///     subgraph CLI
///         cli_key[key set / clear / status]
///         cli_generate[generate]
///         cli_render[render]
///     end
///     cli_key --> chest_handler
///     cli_generate -- resolve api key --> chest_handler
///     cli_generate --> weave
///     cli_render --> html
///     subgraph Mermaid Weaver
///         chest_handler>KeyChestHandler]
///         file_chest[FileKeyChest]-. default impl .- chest_handler
///         file_chest --> credentials[(credentials.json)]
///         subgraph Config
///             prompt_model[PromptModel]
///         end
///         subgraph Loom
///             weave-- prompt_stream --> prompt_model
///             weave-- complete response --> extract
///         end
///         llm>Llm]
///         openai[OpenAiCompatible]-. impl .- llm
///         prompt_model --> openai
///         extract[extract_mermaid_code]
///         html[render::html_document]
///     end
///     openai -- SSE --> groq[Groq API]
///     html --> mermaidjs[mermaid.js]
/// ```
///
/// The application implements [`Config`](crate::Config) to pick the [`Llm`](crate::Llm) and the
/// request parameters, then hands the model to a [`Loom`](crate::Loom). The
/// [`Loom`](crate::Loom) streams the completion, forwards every fragment to the caller and
/// extracts the diagram once the stream ends.
pub struct Diagram;
