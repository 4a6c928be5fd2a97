use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

static JSON_OBJECT: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").ok());
static SENTENCE_END: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[.!?]\s+").ok());

const MIN_SENTENCE_CHARS: usize = 20;

/// Parses the outermost `{...}` span of a model reply. Non-object JSON yields `None`.
pub fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
	let re = JSON_OBJECT.as_ref()?;
	let span = re.find(text)?;

	match serde_json::from_str::<Value>(span.as_str()) {
		Ok(Value::Object(map)) => Some(map),
		_ => None,
	}
}

pub fn split_sentences(text: &str) -> Vec<&str> {
	let text = text.trim();

	if text.is_empty() {
		return Vec::new();
	}

	let Some(re) = SENTENCE_END.as_ref() else { return vec![text] };
	let mut out = Vec::new();
	let mut start = 0;

	for boundary in re.find_iter(text) {
		// Keep the terminator, drop the whitespace.
		let end = boundary.start() + 1;

		out.push(text[start..end].trim());

		start = boundary.end();
	}

	if start < text.len() {
		out.push(text[start..].trim());
	}

	out
}

/// Sentences long enough to stand alone that start with an uppercase letter.
pub fn extract_sentences(text: &str, max_sentences: usize) -> Vec<String> {
	split_sentences(text)
		.into_iter()
		.filter(|sentence| sentence.chars().count() >= MIN_SENTENCE_CHARS)
		.filter(|sentence| sentence.chars().next().is_some_and(char::is_uppercase))
		.take(max_sentences)
		.map(str::to_string)
		.collect()
}

/// Cuts at a char boundary, never mid-codepoint.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
	match text.char_indices().nth(max_chars) {
		Some((index, _)) => &text[..index],
		None => text,
	}
}
