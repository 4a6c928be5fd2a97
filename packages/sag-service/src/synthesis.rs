use std::{collections::BTreeSet, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
	GenerateOptions, GenerationProvider, aggregator::AggregatedEvidence, judge::JudgeVerdict,
};
use sag_config::Synthesis;
use sag_domain::{
	tags::{FailureTag, TagSet},
	text,
};

pub const NO_ANSWER: &str = "I could not answer this question from the available evidence.";
const FALLBACK_NOTE: &str =
	"(Drawn directly from the top evidence; model synthesis was unavailable.)";
const SNIPPET_CHARS: usize = 500;
const FALLBACK_TEXT_CHARS: usize = 300;
const DEFAULT_PICKS: usize = 3;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
	pub offset_start: Option<u32>,
	pub offset_end: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
	pub source: String,
	pub chunk_id: String,
	pub cursor: Cursor,
}
impl Provenance {
	fn of(entry: &AggregatedEvidence) -> Self {
		Self {
			source: entry.item.source_id.clone(),
			chunk_id: entry.item.chunk_id.clone(),
			cursor: Cursor {
				offset_start: entry.item.metadata.offset_start,
				offset_end: entry.item.metadata.offset_end,
			},
		}
	}
}

#[derive(Clone, Debug, Serialize)]
pub struct SynthesisResult {
	pub answer: String,
	pub provenance: Vec<Provenance>,
	pub confidence: f32,
	pub explain_trace: String,
	#[serde(skip)]
	pub failure_tags: TagSet,
}

pub struct SynthesisInput<'a> {
	pub query_text: &'a str,
	pub evidence: &'a [AggregatedEvidence],
	pub verdict: &'a JudgeVerdict,
	/// Set when the query named an author but no on-topic author passage survived.
	pub author_gap: Option<&'a str>,
}

pub async fn synthesize(
	cfg: &Synthesis,
	generator: &dyn GenerationProvider,
	input: SynthesisInput<'_>,
) -> SynthesisResult {
	let confidence = input.verdict.confidence;

	if input.evidence.is_empty() {
		return SynthesisResult {
			answer: NO_ANSWER.to_string(),
			provenance: Vec::new(),
			confidence: 0.0,
			explain_trace: "synthesis_no_evidence".to_string(),
			failure_tags: TagSet::new(),
		};
	}

	let picks = pick_evidence(&input);
	let max_sentences = cfg.fallback_sentences as usize;

	if !cfg.enabled {
		return SynthesisResult {
			answer: fallback_answer(&picks, input.author_gap, max_sentences, false),
			provenance: picks.iter().map(|entry| Provenance::of(entry)).collect(),
			confidence,
			explain_trace: "synthesis_disabled".to_string(),
			failure_tags: TagSet::new(),
		};
	}

	let timeout = Duration::from_millis(cfg.timeout_ms);
	let opts = GenerateOptions { max_tokens: cfg.max_tokens, timeout };
	let prompt = synthesis_prompt(&input, cfg.max_evidence_snippets as usize);
	let failure = match tokio::time::timeout(timeout, generator.generate(&prompt, opts)).await {
		Ok(Ok(reply)) if !reply.trim().is_empty() => {
			return from_reply(&reply, &input, &picks, confidence);
		},
		Ok(Ok(_)) => {
			tracing::warn!("Synthesis returned an empty reply. Using fallback answer.");

			FailureTag::SynthesisError
		},
		Ok(Err(err)) => {
			tracing::warn!(error = %err, "Synthesis generation failed. Using fallback answer.");

			FailureTag::SynthesisError
		},
		Err(_) => {
			tracing::warn!(
				timeout_ms = cfg.timeout_ms,
				"Synthesis timed out. Using fallback answer."
			);

			FailureTag::SynthesisTimeout
		},
	};
	let mut failure_tags = TagSet::new();

	failure_tags.insert(failure);

	SynthesisResult {
		answer: fallback_answer(&picks, input.author_gap, max_sentences, true),
		provenance: picks.iter().map(|entry| Provenance::of(entry)).collect(),
		confidence: degrade(confidence, cfg.fallback_confidence_factor),
		explain_trace: format!("synthesis_fallback:{failure}"),
		failure_tags,
	}
}

/// Never raises confidence.
pub fn degrade(confidence: f32, factor: f32) -> f32 {
	(confidence * factor.clamp(0.0, 1.0)).min(confidence).max(0.0)
}

pub fn author_gap_note(author: &str) -> String {
	format!(
		"No direct passages from {author} mention the query keywords in the current dataset. \
		Showing other sources instead. "
	)
}

/// Trusted items first; otherwise the top evidence. With an author gap, author items are left
/// out whenever anything else remains.
fn pick_evidence<'a>(input: &SynthesisInput<'a>) -> Vec<&'a AggregatedEvidence> {
	let trusted: BTreeSet<&str> =
		input.verdict.trustworthy_chunk_ids.iter().map(String::as_str).collect();
	let mut picks: Vec<&AggregatedEvidence> =
		input.evidence.iter().filter(|entry| trusted.contains(entry.chunk_id())).collect();

	if picks.is_empty() {
		picks = input.evidence.iter().take(DEFAULT_PICKS).collect();
	}
	if input.author_gap.is_some() {
		let others: Vec<&AggregatedEvidence> =
			picks.iter().copied().filter(|entry| !entry.author_match).collect();

		if !others.is_empty() {
			picks = others;
		}
	}

	picks
}

fn from_reply(
	reply: &str,
	input: &SynthesisInput<'_>,
	picks: &[&AggregatedEvidence],
	confidence: f32,
) -> SynthesisResult {
	let parsed = text::extract_json_object(reply).filter(|map| {
		map.get("answer").and_then(Value::as_str).is_some_and(|answer| !answer.trim().is_empty())
	});
	let Some(map) = parsed else {
		tracing::warn!("Synthesis reply is not JSON. Using raw text.");

		return SynthesisResult {
			answer: with_gap_note(reply.trim(), input.author_gap),
			provenance: picks.iter().map(|entry| Provenance::of(entry)).collect(),
			confidence,
			explain_trace: "synthesis_non_json".to_string(),
			failure_tags: TagSet::new(),
		};
	};
	let answer = map.get("answer").and_then(Value::as_str).unwrap_or_default().trim();
	let mut provenance = clean_provenance(&map, input);

	if provenance.is_empty() {
		provenance = picks.iter().map(|entry| Provenance::of(entry)).collect();
	}

	let explain_trace = map
		.get("explain_trace")
		.and_then(Value::as_str)
		.map(str::trim)
		.filter(|trace| !trace.is_empty())
		.unwrap_or("synthesis_llm")
		.to_string();

	SynthesisResult {
		answer: with_gap_note(answer, input.author_gap),
		provenance,
		confidence,
		explain_trace,
		failure_tags: TagSet::new(),
	}
}

/// Keeps only chunk ids present in the judged evidence, each once. Entries may be ids or
/// objects carrying `chunk_id` or `id`. With an author gap, author items are dropped.
fn clean_provenance(map: &Map<String, Value>, input: &SynthesisInput<'_>) -> Vec<Provenance> {
	let Some(entries) = map.get("provenance").and_then(Value::as_array) else { return Vec::new() };
	let mut seen = BTreeSet::new();
	let mut out = Vec::new();

	for entry in entries {
		let id = match entry {
			Value::String(id) => Some(id.as_str()),
			Value::Object(obj) =>
				obj.get("chunk_id").or_else(|| obj.get("id")).and_then(Value::as_str),
			_ => None,
		};
		let evidence = id.and_then(|id| input.evidence.iter().find(|e| e.chunk_id() == id));
		let Some(evidence) = evidence else {
			continue;
		};

		if input.author_gap.is_some() && evidence.author_match {
			continue;
		}
		if seen.insert(evidence.chunk_id()) {
			out.push(Provenance::of(evidence));
		}
	}

	out
}

fn fallback_answer(
	picks: &[&AggregatedEvidence],
	author_gap: Option<&str>,
	max_sentences: usize,
	note: bool,
) -> String {
	let max_sentences = max_sentences.max(1);
	let mut sentences = Vec::new();

	for entry in picks {
		sentences.extend(text::extract_sentences(&entry.item.text, max_sentences));

		if sentences.len() >= max_sentences {
			break;
		}
	}

	sentences.truncate(max_sentences);

	let body = if sentences.is_empty() {
		picks
			.first()
			.map(|entry| {
				text::truncate_chars(entry.item.text.trim(), FALLBACK_TEXT_CHARS).to_string()
			})
			.unwrap_or_default()
	} else {
		sentences.join(" ")
	};

	if body.is_empty() {
		return NO_ANSWER.to_string();
	}

	let body = if note { format!("{body} {FALLBACK_NOTE}") } else { body };

	with_gap_note(&body, author_gap)
}

fn with_gap_note(answer: &str, author_gap: Option<&str>) -> String {
	match author_gap {
		Some(author) => format!("{}{answer}", author_gap_note(author)),
		None => answer.to_string(),
	}
}

fn synthesis_prompt(input: &SynthesisInput<'_>, max_snippets: usize) -> String {
	let snippets = input
		.evidence
		.iter()
		.take(max_snippets.max(1))
		.map(|entry| {
			serde_json::json!({
				"chunk_id": entry.chunk_id(),
				"source": entry.item.source_id,
				"text": text::truncate_chars(&entry.item.text, SNIPPET_CHARS),
			})
		})
		.collect::<Vec<_>>();
	let snippets = serde_json::to_string_pretty(&snippets).unwrap_or_default();
	let author_note = match input.author_gap {
		Some(author) => format!(
			"\nNo passage from {author} mentions the query keywords. \
			Answer from other sources and say so briefly.\n"
		),
		None => String::new(),
	};

	format!(
		"Answer the user query from the evidence. Return JSON only:\n\
		{{\"answer\": \"...\", \"provenance\": [\"chunk_id\"]}}\n\
		Cite only chunk ids listed in the evidence. Answer in 2-4 sentences.\n\n\
		User query:\n{}\n{author_note}\nJudge confidence: {:.2}\n\nEvidence:\n{snippets}\n",
		input.query_text, input.verdict.confidence
	)
}
