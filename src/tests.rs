use crate::{
	extract::{ExtractionSource, NO_DIAGRAM_FOUND},
	loom::{SYSTEM_INSTRUCTIONS, USER_PREAMBLE},
	mock::{MockChest, MockConfig, MockLlm},
	storage::resolve_api_key,
	types::{LoomError, WeaveError, WrapperRole},
};

use super::*;

fn loom(llm: MockLlm) -> Loom<MockConfig> {
	Loom::<MockConfig>::new(llm)
}

fn weave_error<'a>(err: &'a (dyn std::error::Error + Send + Sync + 'static)) -> &'a WeaveError {
	match err.downcast_ref::<LoomError>() {
		Some(LoomError::Weave(e)) => e,
		other => panic!("expected a weave error, got {:?}", other),
	}
}

#[tokio::test]
async fn weave_accumulates_fragments_and_extracts_diagram() {
	let llm = MockLlm::new(["Here you go:\n```mer", "maid\ngraph LR\n", "A-->B\n", "```\nEnjoy!"]);

	let mut seen = Vec::new();
	let weave = loom(llm).weave_with("a to b", |delta| seen.push(delta.to_string())).await.unwrap();

	assert_eq!(seen.len(), 4);
	assert_eq!(seen.concat(), weave.response);
	assert_eq!(weave.extraction.source, ExtractionSource::FencedGraphLr);
	assert_eq!(weave.extraction.code, "graph LR\nA --> B");
	assert!(weave.chunk_errors.is_empty());
}

#[tokio::test]
async fn weave_sends_instructions_and_content() {
	let loom = loom(MockLlm::new(["graph LR\nA-->B"]));

	loom.weave("Users sign up then log in").await.unwrap();

	let received = loom.model.received.lock().unwrap().clone();
	assert_eq!(received.len(), 2);
	assert_eq!(received[0].role, WrapperRole::try_from("system").unwrap());
	assert_eq!(received[0].content, SYSTEM_INSTRUCTIONS);
	assert_eq!(received[1].role, WrapperRole::try_from("user").unwrap());
	assert_eq!(received[1].content, format!("{}Users sign up then log in", USER_PREAMBLE));
}

#[tokio::test]
async fn malformed_chunks_are_skipped() {
	let llm = MockLlm::with_results([
		Ok("graph LR\n".to_string()),
		Err(StreamError::MalformedChunk("expected value at line 1 column 1".into())),
		Ok("A-->B".to_string()),
	]);

	let weave = loom(llm).weave("anything").await.unwrap();

	assert_eq!(weave.response, "graph LR\nA-->B");
	assert_eq!(weave.extraction.code, "graph LR\nA --> B");
	assert_eq!(weave.chunk_errors, vec!["expected value at line 1 column 1".to_string()]);
}

#[tokio::test]
async fn transport_failure_keeps_partial_response() {
	let llm = MockLlm::with_results([
		Ok("graph LR\nA-->".to_string()),
		Err(StreamError::Transport("connection reset".into())),
		Ok("B".to_string()),
	]);

	let err = loom(llm).weave("anything").await.unwrap_err();

	match weave_error(&*err) {
		WeaveError::Interrupted { reason, partial } => {
			assert_eq!(reason, "connection reset");
			assert_eq!(partial, "graph LR\nA-->");
		},
		other => panic!("unexpected error {:?}", other),
	}
}

#[tokio::test]
async fn response_without_diagram_is_unmatched() {
	let weave = loom(MockLlm::new(["I am not sure what ", "you mean."])).weave("?!").await.unwrap();

	assert!(!weave.extraction.is_found());
	assert_eq!(weave.extraction.code, "I am not sure what you mean.");
	assert!(NO_DIAGRAM_FOUND.starts_with("No valid Mermaid code found"));
}

#[tokio::test]
async fn empty_stream_is_unmatched() {
	let weave = loom(MockLlm::new(Vec::<String>::new())).weave("content").await.unwrap();

	assert_eq!(weave.response, "");
	assert_eq!(weave.extraction.source, ExtractionSource::Unmatched);
}

#[tokio::test]
async fn blank_input_is_rejected() {
	let err = loom(MockLlm::new(["graph LR"])).weave(" \n\t").await.unwrap_err();

	assert!(matches!(weave_error(&*err), WeaveError::EmptyInput));
}

#[tokio::test]
async fn prompt_exceeding_context_is_rejected() {
	let mut llm = MockLlm::new(["graph LR"]);
	// instructions alone are well over 10 words, MAX_TOKENS is 100
	llm.context_length = 110;

	let err = loom(llm).weave("short").await.unwrap_err();

	match weave_error(&*err) {
		WeaveError::PromptTooLong { max_tokens, context_length, .. } => {
			assert_eq!(*max_tokens, 100);
			assert_eq!(*context_length, 110);
		},
		other => panic!("unexpected error {:?}", other),
	}
}

#[tokio::test]
async fn failed_prompt_is_propagated() {
	let mut llm = MockLlm::new(["graph LR"]);
	llm.fail_prompt = true;

	let err = loom(llm).weave("content").await.unwrap_err();

	assert!(matches!(weave_error(&*err), WeaveError::FailedPrompt(_)));
	assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn explicit_key_wins() {
	let chest = MockChest::default();
	chest.save_api_key("saved").await.unwrap();

	let key =
		resolve_api_key(Some(&chest), Some("explicit".into()), Some("env".into())).await.unwrap();

	assert_eq!(key.as_deref(), Some("explicit"));
}

#[tokio::test]
async fn saved_key_wins_over_fallback() {
	let chest = MockChest::default();
	chest.save_api_key("saved").await.unwrap();

	let key = resolve_api_key(Some(&chest), Some("  ".into()), Some("env".into())).await.unwrap();

	assert_eq!(key.as_deref(), Some("saved"));
}

#[tokio::test]
async fn fallback_used_after_key_is_cleared() {
	let chest = MockChest::default();
	chest.save_api_key("saved").await.unwrap();
	chest.delete_api_key().await.unwrap();

	let key = resolve_api_key(Some(&chest), None, Some("env".into())).await.unwrap();
	assert_eq!(key.as_deref(), Some("env"));
	assert_eq!(resolve_api_key(Some(&chest), None, None).await.unwrap(), None);
}

#[tokio::test]
async fn missing_chest_uses_explicit_then_fallback() {
	let key = resolve_api_key::<MockChest>(None, Some("explicit".into()), Some("env".into()))
		.await
		.unwrap();
	assert_eq!(key.as_deref(), Some("explicit"));

	let key = resolve_api_key::<MockChest>(None, None, Some("env".into())).await.unwrap();
	assert_eq!(key.as_deref(), Some("env"));
}
