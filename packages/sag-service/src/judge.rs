use std::{collections::BTreeSet, time::Duration};

use serde::Serialize;
use serde_json::Value;

use crate::{GenerateOptions, GenerationProvider, aggregator::AggregatedEvidence};
use sag_config::Judge;
use sag_domain::{
	graph::GraphEvidence,
	tags::{FailureTag, TagSet},
	text,
};

const SNIPPET_CHARS: usize = 400;
const RELATION_CONFLICT_PENALTY_MAX: f32 = 0.5;
const CORROBORATING_PATHS: u32 = 2;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ContradictionFlag {
	pub claim_id: String,
	pub contradiction_count: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct JudgeVerdict {
	pub confidence: f32,
	pub trustworthy_chunk_ids: Vec<String>,
	pub contradiction_flags: Vec<ContradictionFlag>,
	pub failure_tags: TagSet,
	pub notes: Vec<String>,
}

pub struct JudgeInput<'a> {
	pub query_text: &'a str,
	pub hypotheses: &'a [String],
	pub evidence: &'a [AggregatedEvidence],
	pub graph: &'a GraphEvidence,
}

pub async fn judge(
	cfg: &Judge,
	generator: &dyn GenerationProvider,
	input: JudgeInput<'_>,
) -> JudgeVerdict {
	let mut tags = TagSet::new();
	let mut notes = Vec::new();

	if input.evidence.is_empty() {
		tags.insert(FailureTag::NoResults);

		return JudgeVerdict {
			confidence: 0.0,
			trustworthy_chunk_ids: Vec::new(),
			contradiction_flags: Vec::new(),
			failure_tags: tags,
			notes,
		};
	}

	let mut confidence = base_confidence(input.evidence, cfg.top_n as usize);
	let mut trusted_hint = None;

	if cfg.use_llm {
		match llm_verdict(cfg, generator, &input).await {
			Ok(verdict) => {
				confidence = confidence.min(verdict.confidence);
				trusted_hint = verdict.trusted_ids;

				notes.extend(verdict.notes);
			},
			Err(note) => notes.push(note.to_string()),
		}
	}

	let unresolved = input.graph.unresolved_contradictions();

	confidence = apply_graph_adjustments(cfg, confidence, input.graph);

	if let Some(pair) = cross_domain_conflict(&cfg.exclusive_domains, input.evidence) {
		tags.insert(FailureTag::CrossDomainConflict);
		notes.push(format!("cross_domain_conflict:{}+{}", pair.0, pair.1));

		confidence *= 1.0 - cfg.cross_domain_penalty;
	}

	let confidence = if confidence.is_finite() { confidence.clamp(0.0, 1.0) } else { 0.0 };
	let trustworthy_chunk_ids = trustworthy_chunks(
		input.evidence,
		input.graph,
		cfg.contradiction_severity,
		trusted_hint.as_ref(),
	);
	let contradiction_flags = input
		.graph
		.contradicted_claims()
		.into_iter()
		.map(|(claim_id, contradiction_count)| ContradictionFlag {
			claim_id: claim_id.to_string(),
			contradiction_count,
		})
		.collect();

	tracing::debug!(
		confidence,
		unresolved_contradictions = unresolved,
		trusted = trustworthy_chunk_ids.len(),
		"Judge verdict ready."
	);

	JudgeVerdict {
		confidence,
		trustworthy_chunk_ids,
		contradiction_flags,
		failure_tags: tags,
		notes,
	}
}

/// Mean of the top-N normalized rerank scores, scaled down when fewer than N items exist.
pub fn base_confidence(evidence: &[AggregatedEvidence], top_n: usize) -> f32 {
	let top_n = top_n.max(1);
	let top: Vec<f32> = evidence.iter().take(top_n).map(|entry| entry.rerank_normalized).collect();

	if top.is_empty() {
		return 0.0;
	}

	let mean = top.iter().sum::<f32>() / top.len() as f32;
	let mass = (top.len() as f32 / top_n as f32).min(1.0);

	(mean * mass).clamp(0.0, 1.0)
}

/// Contradiction penalty and cap, then relation-conflict penalty, then the relation and support
/// boost when no claim is contradicted. Non-increasing in the number of contradicted claims.
pub fn apply_graph_adjustments(cfg: &Judge, confidence: f32, graph: &GraphEvidence) -> f32 {
	let mut confidence = confidence;
	let unresolved = graph.unresolved_contradictions();

	if unresolved > 0 {
		let penalty = (cfg.contradiction_penalty_per_claim * unresolved as f32)
			.min(cfg.contradiction_penalty_max);

		confidence *= 1.0 - penalty;
		confidence = confidence.min(cfg.contradiction_confidence_cap);
	}

	let conflicts = graph.relation_conflicts.len();

	if conflicts > 0 {
		let penalty =
			(cfg.relation_conflict_penalty * conflicts as f32).min(RELATION_CONFLICT_PENALTY_MAX);

		confidence *= 1.0 - penalty;
	}

	if unresolved == 0 {
		let relations = cfg.relation_boost_per_relation * graph.strong_relations.len() as f32;
		let support = cfg.support_boost_per_unit * graph.corroboration(CORROBORATING_PATHS);
		let boost = (relations + support).min(cfg.relation_boost_max);

		if boost > 0.0 {
			confidence = (confidence + boost).min(1.0);
		}
	}

	confidence
}

/// The first configured exclusive pair with evidence from both domains.
pub fn cross_domain_conflict<'a>(
	exclusive: &'a [[String; 2]],
	evidence: &[AggregatedEvidence],
) -> Option<(&'a str, &'a str)> {
	let domains: BTreeSet<String> = evidence
		.iter()
		.filter_map(|entry| entry.item.metadata.domain.as_deref())
		.map(str::to_lowercase)
		.collect();

	exclusive
		.iter()
		.find(|[left, right]| left != right && domains.contains(left) && domains.contains(right))
		.map(|[left, right]| (left.as_str(), right.as_str()))
}

/// Evidence order is kept. A trusted-id hint narrows the set but never re-admits a chunk whose
/// backing claims are contradicted at or above `severity`.
pub fn trustworthy_chunks(
	evidence: &[AggregatedEvidence],
	graph: &GraphEvidence,
	severity: u32,
	hint: Option<&BTreeSet<String>>,
) -> Vec<String> {
	evidence
		.iter()
		.map(AggregatedEvidence::chunk_id)
		.filter(|chunk_id| graph.chunk_contradiction_severity(chunk_id) < severity)
		.filter(|chunk_id| hint.is_none_or(|ids| ids.contains(*chunk_id)))
		.map(str::to_string)
		.collect()
}

struct LlmVerdict {
	confidence: f32,
	trusted_ids: Option<BTreeSet<String>>,
	notes: Vec<String>,
}

async fn llm_verdict(
	cfg: &Judge,
	generator: &dyn GenerationProvider,
	input: &JudgeInput<'_>,
) -> Result<LlmVerdict, &'static str> {
	let timeout = Duration::from_millis(cfg.timeout_ms);
	let opts = GenerateOptions { max_tokens: cfg.max_tokens, timeout };
	let prompt = judge_prompt(input, cfg.max_evidence_snippets as usize);
	let reply = match tokio::time::timeout(timeout, generator.generate(&prompt, opts)).await {
		Ok(Ok(reply)) => reply,
		Ok(Err(err)) => {
			tracing::warn!(
				error = %err,
				"Judge generation failed. Using deterministic confidence."
			);

			return Err("judge_error");
		},
		Err(_) => {
			tracing::warn!(
				timeout_ms = cfg.timeout_ms,
				"Judge timed out. Using deterministic confidence."
			);

			return Err("judge_error");
		},
	};

	parse_verdict(&reply, input.evidence).ok_or("judge_non_json")
}

fn parse_verdict(reply: &str, evidence: &[AggregatedEvidence]) -> Option<LlmVerdict> {
	let map = text::extract_json_object(reply)?;
	let confidence = map.get("confidence").and_then(Value::as_f64)? as f32;

	if !confidence.is_finite() {
		return None;
	}

	let known: BTreeSet<&str> = evidence.iter().map(AggregatedEvidence::chunk_id).collect();
	let trusted_ids = map.get("trusted_ids").and_then(Value::as_array).map(|ids| {
		ids.iter()
			.filter_map(Value::as_str)
			.filter(|id| known.contains(id))
			.map(str::to_string)
			.collect::<BTreeSet<_>>()
	});
	let notes = match map.get("notes") {
		Some(Value::String(note)) if !note.trim().is_empty() => vec![note.trim().to_string()],
		Some(Value::Array(items)) =>
			items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
		_ => Vec::new(),
	};

	Some(LlmVerdict { confidence: confidence.clamp(0.0, 1.0), trusted_ids, notes })
}

fn judge_prompt(input: &JudgeInput<'_>, max_snippets: usize) -> String {
	let hypotheses = if input.hypotheses.is_empty() {
		"none".to_string()
	} else {
		input.hypotheses.join("; ")
	};
	let snippets = input
		.evidence
		.iter()
		.take(max_snippets.max(1))
		.map(|entry| {
			let snippet = text::truncate_chars(&entry.item.text, SNIPPET_CHARS);

			format!("[{}] {snippet}", entry.chunk_id())
		})
		.collect::<Vec<_>>()
		.join("\n");

	format!(
		"Judge how well the evidence answers the query. Return JSON only:\n\
		{{\"confidence\": 0.0, \"trusted_ids\": [\"chunk id\"], \"notes\": \"...\"}}\n\n\
		Query:\n{}\n\nHypotheses: {hypotheses}\n\nEvidence:\n{snippets}\n",
		input.query_text
	)
}
