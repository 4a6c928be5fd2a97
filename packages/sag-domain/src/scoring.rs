use std::{cmp::Ordering, collections::HashSet};

use unicode_segmentation::UnicodeSegmentation;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NormalizationMode {
	MinMax,
	Rank,
}
impl NormalizationMode {
	/// Unknown values are rejected by config validation; fall back to min-max here.
	pub fn from_config(raw: &str) -> Self {
		match raw {
			"rank" => Self::Rank,
			_ => Self::MinMax,
		}
	}
}

/// Single-value and constant inputs normalize to 1.0.
pub fn min_max_normalize(scores: &[f32]) -> Vec<f32> {
	let finite = scores.iter().copied().filter(|score| score.is_finite());
	let (min, max) = finite.fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), score| {
		(min.min(score), max.max(score))
	});

	if !min.is_finite() || (max - min).abs() <= f32::EPSILON {
		return vec![1.0; scores.len()];
	}

	scores
		.iter()
		.map(|score| if score.is_finite() { (score - min) / (max - min) } else { 0.0 })
		.collect()
}

/// Normalizes by descending-score rank, keeping input order on ties.
pub fn rank_normalize_scores(scores: &[f32]) -> Vec<f32> {
	let mut order: Vec<usize> = (0..scores.len()).collect();

	order.sort_by(|a, b| cmp_f32_desc(scores[*a], scores[*b]).then_with(|| a.cmp(b)));

	let total = scores.len() as u32;
	let mut out = vec![0.0; scores.len()];

	for (position, index) in order.into_iter().enumerate() {
		out[index] = rank_normalize(position as u32 + 1, total);
	}

	out
}

pub fn normalize(scores: &[f32], mode: NormalizationMode) -> Vec<f32> {
	match mode {
		NormalizationMode::MinMax => min_max_normalize(scores),
		NormalizationMode::Rank => rank_normalize_scores(scores),
	}
}

/// `rank` is 1-based.
pub fn rank_normalize(rank: u32, total: u32) -> f32 {
	if total <= 1 {
		return 1.0;
	}
	if rank == 0 {
		return 0.0;
	}

	let denom = (total - 1) as f32;
	let pos = rank.saturating_sub(1) as f32;

	(1.0 - pos / denom).clamp(0.0, 1.0)
}

/// Descending order with NaN sorted last.
pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

/// Lowercased, deduplicated words of at least two characters, in first-seen order.
pub fn tokenize_query(query: &str, max_terms: usize) -> Vec<String> {
	let mut out = Vec::new();
	let mut seen = HashSet::new();

	for word in query.unicode_words() {
		let token = word.to_lowercase();

		if token.chars().count() < 2 {
			continue;
		}
		if seen.insert(token.clone()) {
			out.push(token);
		}
		if out.len() >= max_terms {
			break;
		}
	}

	out
}

/// Share of query tokens present in `text`.
pub fn lexical_overlap_ratio(query_tokens: &[String], text: &str) -> f32 {
	if query_tokens.is_empty() {
		return 0.0;
	}

	let text_terms: HashSet<String> = text.unicode_words().map(str::to_lowercase).collect();

	if text_terms.is_empty() {
		return 0.0;
	}

	let matched = query_tokens.iter().filter(|token| text_terms.contains(token.as_str())).count();

	matched as f32 / query_tokens.len() as f32
}
