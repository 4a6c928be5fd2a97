mod rerank;

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use time::OffsetDateTime;

use crate::RerankProvider;
use sag_config::{Aggregator, Policy};
use sag_domain::{
	evidence::{AgentKind, EvidenceItem, PolicyOverrides, RetrievalEnvelope},
	fingerprint,
	policy::{self, BlockReason, PolicyVerdict},
	resolver::{self, AuthorHint},
	scoring::{self, NormalizationMode},
	tags::{FailureTag, TagSet},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorBias {
	Off,
	Soft,
	Strong,
}
impl AuthorBias {
	pub fn from_config(raw: &str) -> Self {
		match raw {
			"soft" => Self::Soft,
			"strong" => Self::Strong,
			_ => Self::Off,
		}
	}
}

/// An evidence item with the scores assigned while aggregating. `item` is never modified.
#[derive(Clone, Debug, Serialize)]
pub struct AggregatedEvidence {
	pub item: EvidenceItem,
	pub agent_id: AgentKind,
	pub sub_query_id: String,
	pub envelope_index: usize,
	pub normalized_score: f32,
	pub bias_score: f32,
	/// Raw cross-encoder score, or lexical overlap when the reranker was unavailable.
	pub rerank_score: f32,
	/// `rerank_score` min-max normalized over the ranked set.
	pub rerank_normalized: f32,
	/// Ordering key: `rerank_normalized` with the soft author boost applied.
	pub final_score: f32,
	pub dedup_group_size: usize,
	pub author_match: bool,
}
impl AggregatedEvidence {
	pub fn chunk_id(&self) -> &str {
		&self.item.chunk_id
	}
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct AggregationStats {
	pub flattened: usize,
	pub policy_blocked: usize,
	pub stale: usize,
	pub duplicates_removed: usize,
	pub author_items: usize,
	pub rerank_fallback: bool,
}

pub struct Aggregation {
	pub evidence: Vec<AggregatedEvidence>,
	pub tags: TagSet,
	pub stats: AggregationStats,
}

pub struct AggregateInput<'a> {
	pub query_text: &'a str,
	pub envelopes: &'a [RetrievalEnvelope],
	pub author: Option<&'a AuthorHint>,
	pub topic_terms: &'a BTreeSet<String>,
	pub freshness_days: Option<u32>,
	pub policy_overrides: &'a PolicyOverrides,
	pub now: OffsetDateTime,
}

/// Flatten and normalize, filter by policy, deduplicate, apply author bias, then re-rank.
pub async fn aggregate(
	cfg: &Aggregator,
	policy_cfg: &Policy,
	reranker: &dyn RerankProvider,
	input: AggregateInput<'_>,
) -> Aggregation {
	let mut tags = TagSet::new();
	let mut stats = AggregationStats::default();
	let flat = flatten(input.envelopes, NormalizationMode::from_config(&cfg.normalization));

	stats.flattened = flat.len();

	let freshness_days = input.freshness_days.or(cfg.default_freshness_days);
	let allowed = filter_policy(
		flat,
		policy_cfg,
		input.policy_overrides,
		freshness_days,
		input.now,
		&mut stats,
	);

	if stats.policy_blocked + stats.stale > 0 {
		tags.insert(FailureTag::PolicyBlocked);
	}

	let before_dedup = allowed.len();
	let deduped = dedup(allowed, cfg.dedup_similarity);

	stats.duplicates_removed = before_dedup - deduped.len();

	let bias = AuthorBias::from_config(&cfg.author_bias);
	let outcome = apply_author_bias(deduped, bias, input.author, input.topic_terms, cfg);

	stats.author_items = outcome.author_items;

	if outcome.gap {
		tags.insert(FailureTag::AuthorGap);
	}

	let (mut evidence, fallback) = rerank::rerank_evidence(
		reranker,
		input.query_text,
		outcome.evidence,
		bias,
		cfg.author_boost,
	)
	.await;

	stats.rerank_fallback = fallback;

	evidence.truncate(cfg.top_k as usize);

	if evidence.len() < cfg.min_results_count as usize {
		tags.insert(FailureTag::LowResultCount);
	}

	let top_score = evidence.iter().map(|e| e.rerank_score).fold(f32::NEG_INFINITY, f32::max);

	if !evidence.is_empty() && top_score < cfg.min_top_score {
		tags.insert(FailureTag::LowTopScore);
	}

	tracing::debug!(
		flattened = stats.flattened,
		policy_blocked = stats.policy_blocked,
		stale = stats.stale,
		duplicates_removed = stats.duplicates_removed,
		kept = evidence.len(),
		rerank_fallback = stats.rerank_fallback,
		"Evidence aggregated."
	);

	Aggregation { evidence, tags, stats }
}

/// Envelope order is preserved. Scores are normalized per retrieval method across all envelopes.
pub fn flatten(
	envelopes: &[RetrievalEnvelope],
	mode: NormalizationMode,
) -> Vec<AggregatedEvidence> {
	let mut out = Vec::new();

	for (envelope_index, envelope) in envelopes.iter().enumerate() {
		for item in &envelope.items {
			out.push(AggregatedEvidence {
				item: item.clone(),
				agent_id: envelope.agent_id,
				sub_query_id: envelope.sub_query_id.clone(),
				envelope_index,
				normalized_score: 0.0,
				bias_score: 0.0,
				rerank_score: 0.0,
				rerank_normalized: 0.0,
				final_score: 0.0,
				dedup_group_size: 1,
				author_match: false,
			});
		}
	}

	let mut by_method: BTreeMap<AgentKind, Vec<usize>> = BTreeMap::new();

	for (index, evidence) in out.iter().enumerate() {
		by_method.entry(evidence.item.method).or_default().push(index);
	}

	for indices in by_method.values() {
		let raw: Vec<f32> = indices.iter().map(|index| out[*index].item.raw_score).collect();

		for (index, score) in indices.iter().zip(scoring::normalize(&raw, mode)) {
			out[*index].normalized_score = score;
		}
	}

	out
}

/// Applies the configured policy extended by the request overrides, then the freshness window.
pub fn filter_policy(
	evidence: Vec<AggregatedEvidence>,
	policy_cfg: &Policy,
	overrides: &PolicyOverrides,
	freshness_days: Option<u32>,
	now: OffsetDateTime,
	stats: &mut AggregationStats,
) -> Vec<AggregatedEvidence> {
	let policy_cfg = policy::with_overrides(policy_cfg, overrides);
	let mut kept = Vec::with_capacity(evidence.len());

	for entry in evidence {
		let verdict = if policy::is_fresh(&entry.item, freshness_days, now) {
			policy::evaluate(&entry.item, &policy_cfg)
		} else {
			PolicyVerdict::Block(BlockReason::Stale)
		};

		match verdict {
			PolicyVerdict::Allow => kept.push(entry),
			PolicyVerdict::Block(BlockReason::Stale) => stats.stale += 1,
			PolicyVerdict::Block(reason) => {
				tracing::debug!(
					chunk_id = %entry.item.chunk_id,
					?reason,
					"Evidence blocked by policy."
				);

				stats.policy_blocked += 1;
			},
		}
	}

	kept
}

/// Near-duplicates collapse onto the highest normalized score.
pub fn dedup(evidence: Vec<AggregatedEvidence>, threshold: f32) -> Vec<AggregatedEvidence> {
	fingerprint::dedup(evidence, |e| e.item.text.as_str(), |e| e.normalized_score, threshold)
		.into_iter()
		.map(|group| {
			let mut representative = group.representative;

			representative.dedup_group_size = group.size;

			representative
		})
		.collect()
}

pub struct BiasOutcome {
	pub evidence: Vec<AggregatedEvidence>,
	pub gap: bool,
	pub author_items: usize,
}

/// Marks author evidence and applies the configured bias. With an author hint, the gap is set
/// when no on-topic author item reaches `author_score_floor`; non-author evidence is then ranked
/// alone unless there is none.
pub fn apply_author_bias(
	mut evidence: Vec<AggregatedEvidence>,
	bias: AuthorBias,
	author: Option<&AuthorHint>,
	topic_terms: &BTreeSet<String>,
	cfg: &Aggregator,
) -> BiasOutcome {
	let Some(hint) = author else {
		for entry in &mut evidence {
			entry.bias_score = entry.normalized_score;
		}

		return BiasOutcome { evidence, gap: false, author_items: 0 };
	};
	let mut supported = false;
	let mut author_items = 0;

	for entry in &mut evidence {
		entry.author_match = is_author_item(&entry.item, hint);
		entry.bias_score = match (bias, entry.author_match) {
			(AuthorBias::Soft, true) => entry.normalized_score * cfg.author_boost,
			_ => entry.normalized_score,
		};

		if entry.author_match {
			author_items += 1;

			let on_topic = topic_terms.is_empty()
				|| resolver::mentions_any(&entry.item.text, topic_terms);

			if on_topic && entry.bias_score >= cfg.author_score_floor {
				supported = true;
			}
		}
	}

	if supported {
		return BiasOutcome { evidence, gap: false, author_items };
	}
	if evidence.iter().any(|entry| !entry.author_match) {
		evidence.retain(|entry| !entry.author_match);
	}

	BiasOutcome { evidence, gap: true, author_items }
}

pub fn is_author_item(item: &EvidenceItem, hint: &AuthorHint) -> bool {
	item.method == AgentKind::LexicalAuthor
		|| item.metadata.author.as_deref().is_some_and(|author| hint.matches(author))
		|| hint.matches(&item.source_id)
		|| hint.matches(&item.text)
}
