//! Rendering Mermaid code into a page drawn client-side by mermaid.js.

/// ES module build of mermaid.js loaded by rendered pages.
pub const MERMAID_MODULE_URL: &str =
	"https://cdn.jsdelivr.net/npm/mermaid@10/dist/mermaid.esm.min.mjs";

/// Builds a standalone HTML document drawing `code` with the dark mermaid.js theme.
///
/// Syntax errors in `code` are reported by mermaid.js in place of the diagram.
pub fn html_document(code: &str, title: &str) -> String {
	format!(
		r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ background: #111827; color: #f9fafb; font-family: sans-serif; margin: 2rem; }}
pre.mermaid {{ background: #1f2937; padding: 1rem; border-radius: 0.25rem; }}
</style>
</head>
<body>
<h1>{title}</h1>
<pre class="mermaid">
{code}
</pre>
<script type="module">
import mermaid from "{module}";
mermaid.initialize({{ startOnLoad: true, theme: "dark" }});
</script>
</body>
</html>
"#,
		title = escape_html(title),
		code = escape_html(code),
		module = MERMAID_MODULE_URL,
	)
}

/// Escapes the characters with a meaning in HTML text and attributes.
fn escape_html(text: &str) -> String {
	let mut escaped = String::with_capacity(text.len());
	for c in text.chars() {
		match c {
			'&' => escaped.push_str("&amp;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			'"' => escaped.push_str("&quot;"),
			'\'' => escaped.push_str("&#39;"),
			c => escaped.push(c),
		}
	}
	escaped
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn embeds_escaped_code() {
		let page = html_document("graph LR\nA[x > y] --> B", "Diagram");

		assert!(page.contains("<pre class=\"mermaid\">\ngraph LR\nA[x &gt; y] --&gt; B\n</pre>"));
		assert!(page.contains("<title>Diagram</title>"));
	}

	#[test]
	fn initializes_dark_theme() {
		let page = html_document("graph LR", "t");

		assert!(page.contains(r#"mermaid.initialize({ startOnLoad: true, theme: "dark" });"#));
		assert!(page.contains(MERMAID_MODULE_URL));
	}

	#[test]
	fn title_cannot_inject_markup() {
		let page = html_document("graph LR", "<script>alert('x')</script>");

		assert!(!page.contains("<script>alert"));
		assert!(page.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"));
	}
}
