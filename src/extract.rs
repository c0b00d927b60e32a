//! Locating and cleaning Mermaid code inside free-form LLM output.
//!
//! LLMs seldom answer with the diagram alone. The code is looked up with a series of patterns,
//! from the most to the least specific, and the first hit wins:
//!
//! 1. a fenced block holding a `graph LR` diagram
//! 2. a fenced block holding any other diagram
//! 3. a bare `graph LR` span
//! 4. a bare span starting at any diagram keyword
//!
//! Bare spans stop at the first blank line, at a trailing newline or at the end of the text.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, trace, warn};

/// Reported when no pattern matched the response.
pub const NO_DIAGRAM_FOUND: &str =
	"No valid Mermaid code found in the response. The API might not have generated a valid diagram.";

lazy_static! {
	static ref FENCED_GRAPH_LR: Regex =
		Regex::new(r"```(?:mermaid)?\s*(graph LR(?s:.*?))```").expect("valid regex");
	static ref FENCED_DIAGRAM: Regex = Regex::new(
		r"```(?:mermaid)?\s*((?:graph|flowchart|sequenceDiagram|classDiagram|stateDiagram)(?s:.*?))```"
	)
	.expect("valid regex");
	static ref BARE_GRAPH_LR: Regex =
		Regex::new(r"(graph LR(?s:.*?))(?:\n\n|\n\z|\z)").expect("valid regex");
	static ref BARE_DIAGRAM: Regex = Regex::new(
		r"((?:graph|flowchart|sequenceDiagram|classDiagram|stateDiagram)(?s:.*?))(?:\n\n|\n\z|\z)"
	)
	.expect("valid regex");
	static ref QUOTED_LABEL: Regex = Regex::new(r#"\[label "([^"]+)"\]"#).expect("valid regex");
	static ref NODE_BEFORE_SHAPE: Regex =
		Regex::new(r"((?-u:\w)+)\s*(\[|\()").expect("valid regex");
	static ref ARROW: Regex = Regex::new(r"\s*-->\s*").expect("valid regex");
	static ref MESSAGE_ARROW: Regex = Regex::new(r"\s*->>\s*").expect("valid regex");
}

/// Which pattern produced an [`Extraction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionSource {
	FencedGraphLr,
	FencedDiagram,
	BareGraphLr,
	BareDiagram,
	/// Nothing looked like Mermaid. The code is the raw response.
	Unmatched,
}

/// Diagram code found in an LLM response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
	pub code: String,
	pub source: ExtractionSource,
}

impl Extraction {
	/// Whether some pattern matched.
	pub fn is_found(&self) -> bool {
		self.source != ExtractionSource::Unmatched
	}
}

/// Finds the Mermaid code in `response` and cleans it with [`clean_mermaid_code`].
///
/// When no pattern matches, the whole response is returned untouched with
/// [`ExtractionSource::Unmatched`].
pub fn extract_mermaid_code(response: &str) -> Extraction {
	let passes: [(&Regex, ExtractionSource); 4] = [
		(&*FENCED_GRAPH_LR, ExtractionSource::FencedGraphLr),
		(&*FENCED_DIAGRAM, ExtractionSource::FencedDiagram),
		(&*BARE_GRAPH_LR, ExtractionSource::BareGraphLr),
		(&*BARE_DIAGRAM, ExtractionSource::BareDiagram),
	];

	for (pattern, source) in passes {
		if let Some(code) = pattern.captures(response).and_then(|c| c.get(1)) {
			debug!(?source, "Found Mermaid code");
			return Extraction { code: clean_mermaid_code(code.as_str()), source }
		}
		trace!(?source, "Pattern did not match");
	}

	warn!("{}", NO_DIAGRAM_FOUND);

	Extraction { code: response.to_string(), source: ExtractionSource::Unmatched }
}

/// Massages LLM generated Mermaid code into something mermaid.js accepts.
///
/// - surrounding whitespace is trimmed
/// - `[label "Text"]` attributes become `[Text]`
/// - a node name is glued to the `[` or `(` opening its shape
/// - arrows get exactly one space on each side
pub fn clean_mermaid_code(code: &str) -> String {
	let cleaned = code.trim();
	let cleaned = QUOTED_LABEL.replace_all(cleaned, "[$1]");
	let cleaned = NODE_BEFORE_SHAPE.replace_all(&cleaned, "${1}${2}");
	let cleaned = ARROW.replace_all(&cleaned, " --> ");
	let cleaned = MESSAGE_ARROW.replace_all(&cleaned, " ->> ");

	cleaned.into_owned()
}
