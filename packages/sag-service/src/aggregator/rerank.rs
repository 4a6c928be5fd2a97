use super::{AggregatedEvidence, AuthorBias};
use crate::RerankProvider;
use sag_domain::scoring;

const MAX_QUERY_TERMS: usize = 32;

/// Scores every item against the query and orders by `final_score`, with author items first in
/// strong mode. Returns `true` when lexical overlap stood in for the cross-encoder.
pub(super) async fn rerank_evidence(
	reranker: &dyn RerankProvider,
	query: &str,
	mut evidence: Vec<AggregatedEvidence>,
	bias: AuthorBias,
	author_boost: f32,
) -> (Vec<AggregatedEvidence>, bool) {
	if evidence.is_empty() {
		return (evidence, false);
	}

	let docs: Vec<String> = evidence.iter().map(|entry| entry.item.text.clone()).collect();
	let (scores, fallback) = match reranker.rerank(query, &docs).await {
		Ok(scores) if scores.len() == docs.len() => (scores, false),
		Ok(scores) => {
			tracing::warn!(
				expected = docs.len(),
				actual = scores.len(),
				"Rerank provider returned mismatched score count. Using lexical overlap."
			);

			(lexical_scores(query, &docs), true)
		},
		Err(err) => {
			tracing::warn!(error = %err, "Rerank provider failed. Using lexical overlap.");

			(lexical_scores(query, &docs), true)
		},
	};
	let normalized = scoring::min_max_normalize(&scores);

	for ((entry, score), norm) in evidence.iter_mut().zip(scores).zip(normalized) {
		entry.rerank_score = score;
		entry.rerank_normalized = norm;
		entry.final_score = match (bias, entry.author_match) {
			(AuthorBias::Soft, true) => norm * author_boost,
			_ => norm,
		};
	}

	// Stable sort keeps insertion order on ties.
	evidence.sort_by(|a, b| {
		let author_first = match bias {
			AuthorBias::Strong => b.author_match.cmp(&a.author_match),
			_ => std::cmp::Ordering::Equal,
		};

		author_first.then_with(|| scoring::cmp_f32_desc(a.final_score, b.final_score))
	});

	(evidence, fallback)
}

fn lexical_scores(query: &str, docs: &[String]) -> Vec<f32> {
	let tokens = scoring::tokenize_query(query, MAX_QUERY_TERMS);

	docs.iter().map(|doc| scoring::lexical_overlap_ratio(&tokens, doc)).collect()
}
