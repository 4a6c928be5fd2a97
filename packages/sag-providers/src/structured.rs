use sag_config::StructuredAgent;
use sag_domain::{
	evidence::{AgentKind, EvidenceItem},
	text,
};

/// Query tokens longer than two characters, lowercased.
pub fn line_tokens(query: &str) -> Vec<String> {
	query
		.split_whitespace()
		.map(str::to_lowercase)
		.filter(|token| token.chars().count() > 2)
		.collect()
}

/// Key-value and table-like lines mentioning a query token. Rows with several separators are
/// preferred over single `key: value` lines.
pub fn extract_lines(
	text: &str,
	tokens: &[String],
	max_lines: usize,
	max_chars: usize,
) -> Vec<String> {
	let mut rows = Vec::new();
	let mut pairs = Vec::new();

	for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
		if !line.contains([':', '|', '\t', ',']) {
			continue;
		}

		let lowered = line.to_lowercase();

		if !tokens.is_empty() && !tokens.iter().any(|token| lowered.contains(token.as_str())) {
			continue;
		}

		let clipped = text::truncate_chars(line, max_chars).to_string();
		let tabular = line.matches(',').count() >= 2
			|| line.matches('|').count() >= 2
			|| line.contains('\t');

		if tabular { rows.push(clipped) } else { pairs.push(clipped) }
	}

	rows.into_iter().chain(pairs).take(max_lines).collect()
}

/// Turns lexical hits into one item per extracted line, keyed `<chunk_id>::line::<n>`.
pub fn derive_items(
	hits: Vec<EvidenceItem>,
	query: &str,
	cfg: &StructuredAgent,
) -> Vec<EvidenceItem> {
	let tokens = line_tokens(query);
	let limit = cfg.top_k as usize;
	let max_lines = cfg.max_lines_per_hit as usize;
	let max_chars = cfg.max_line_chars as usize;
	let mut out = Vec::new();

	for hit in hits {
		let lines = extract_lines(&hit.text, &tokens, max_lines, max_chars);

		for (index, line) in lines.into_iter().enumerate() {
			if out.len() >= limit {
				return out;
			}

			out.push(EvidenceItem {
				source_id: hit.source_id.clone(),
				chunk_id: format!("{}::line::{index}", hit.chunk_id),
				text: line,
				raw_score: hit.raw_score,
				method: AgentKind::Structured,
				metadata: hit.metadata.clone(),
			});
		}
	}

	out
}
