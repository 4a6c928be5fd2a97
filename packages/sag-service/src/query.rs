use std::{sync::Mutex, time::Duration};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Error, Result, SagService,
	aggregator::{self, AggregateInput, AggregationStats},
	controller, graph,
	judge::{self, ContradictionFlag, JudgeInput},
	planner::{self, Plan},
	synthesis::{self, Provenance, SynthesisInput},
};
use sag_domain::{
	evidence::{AgentKind, Preferences, Query, RetrievalEnvelope, RetrievalStatus},
	resolver::{self, ResolvedContext},
	tags::{FailureTag, TagSet},
};

pub const DEADLINE_ANSWER: &str = "The request deadline passed before an answer was ready.";

#[derive(Clone, Debug, Deserialize)]
pub struct QueryRequest {
	#[serde(default)]
	pub query_id: Option<String>,
	#[serde(default = "default_user_id")]
	pub user_id: String,
	pub query: String,
	#[serde(default)]
	pub preferences: Preferences,
}

#[derive(Clone, Debug, Serialize)]
pub struct QueryResponse {
	pub query_id: String,
	pub answer: String,
	pub provenance: Vec<Provenance>,
	pub confidence: f32,
	pub explain_trace: ExplainTrace,
	pub failure_tags: TagSet,
}

/// Per-stage record of how the answer was produced. Stages that never ran stay empty.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ExplainTrace {
	pub resolved: Option<ResolvedContext>,
	pub plan: Option<Plan>,
	pub retrieval: Vec<EnvelopeTrace>,
	pub aggregation: Option<AggregationStats>,
	pub evidence: Vec<EvidenceTrace>,
	pub graph: Option<GraphTrace>,
	pub contradiction_flags: Vec<ContradictionFlag>,
	pub judge_notes: Vec<String>,
	pub synthesis: Option<String>,
	pub deadline_exceeded: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct EnvelopeTrace {
	pub agent: AgentKind,
	pub sub_query_id: String,
	pub status: RetrievalStatus,
	pub items: usize,
	pub elapsed_ms: u64,
}
impl From<&RetrievalEnvelope> for EnvelopeTrace {
	fn from(envelope: &RetrievalEnvelope) -> Self {
		Self {
			agent: envelope.agent_id,
			sub_query_id: envelope.sub_query_id.clone(),
			status: envelope.status,
			items: envelope.items.len(),
			elapsed_ms: envelope.elapsed_ms,
		}
	}
}

#[derive(Clone, Debug, Serialize)]
pub struct EvidenceTrace {
	pub chunk_id: String,
	pub agent: AgentKind,
	pub sub_query_id: String,
	pub normalized_score: f32,
	pub rerank_score: f32,
	pub final_score: f32,
	pub dedup_group_size: usize,
	pub author_match: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct GraphTrace {
	pub claims: usize,
	pub unresolved_contradictions: usize,
	pub strong_relations: usize,
	pub relation_conflicts: usize,
}

/// Request-scoped state that survives a deadline cut.
#[derive(Default)]
struct Progress {
	tags: TagSet,
	trace: ExplainTrace,
}

struct Answer {
	answer: String,
	provenance: Vec<Provenance>,
	confidence: f32,
}

impl SagService {
	/// Runs the full pipeline under `pipeline.request_timeout_ms`. The only error is an invalid
	/// request; every downstream failure degrades into tags.
	pub async fn query(&self, req: QueryRequest) -> Result<QueryResponse> {
		let raw_text = req.query.trim();

		if raw_text.is_empty() {
			return Err(Error::InvalidRequest { message: "query must be non-empty.".to_string() });
		}
		if req.user_id.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "user_id must be non-empty.".to_string() });
		}

		let query = Query {
			id: req
				.query_id
				.filter(|id| !id.trim().is_empty())
				.unwrap_or_else(|| Uuid::new_v4().to_string()),
			raw_text: raw_text.to_string(),
			user_id: req.user_id,
			preferences: req.preferences,
		};
		let progress = Mutex::new(Progress::default());
		let deadline = Duration::from_millis(self.cfg.pipeline.request_timeout_ms);
		let outcome = tokio::time::timeout(deadline, self.run_pipeline(&query, &progress)).await;
		let Progress { mut tags, mut trace } =
			progress.into_inner().unwrap_or_else(|err| err.into_inner());
		let answer = match outcome {
			Ok(answer) => answer,
			Err(_) => {
				tracing::warn!(
					query_id = %query.id,
					timeout_ms = self.cfg.pipeline.request_timeout_ms,
					"Request deadline exceeded."
				);

				tags.insert(FailureTag::SynthesisTimeout);

				trace.deadline_exceeded = true;

				Answer {
					answer: DEADLINE_ANSWER.to_string(),
					provenance: Vec::new(),
					confidence: 0.0,
				}
			},
		};

		tracing::info!(
			query_id = %query.id,
			confidence = answer.confidence,
			provenance = answer.provenance.len(),
			failure_tags = ?tags.to_strings(),
			"Query answered."
		);

		Ok(QueryResponse {
			query_id: query.id,
			answer: answer.answer,
			provenance: answer.provenance,
			confidence: answer.confidence,
			explain_trace: trace,
			failure_tags: tags,
		})
	}

	async fn run_pipeline(&self, query: &Query, progress: &Mutex<Progress>) -> Answer {
		let cfg = &self.cfg;
		let providers = &self.providers;
		let ctx = resolver::resolve(&query.raw_text, &query.preferences, &cfg.resolver);

		record(progress, |p| {
			if ctx.domains.is_empty() {
				p.tags.insert(FailureTag::NoDomain);
			}

			p.trace.resolved = Some(ctx.clone());
		});

		let generator = providers.generation.as_ref();
		let plan = planner::plan(&cfg.planner, &cfg.resolver, generator, query, &ctx).await;

		record(progress, |p| p.trace.plan = Some(plan.clone()));

		let author = ctx.author_hint.as_ref();
		let fan_out =
			controller::fan_out(&cfg.controller, providers, &plan.sub_queries, author).await;

		record(progress, |p| {
			p.tags.extend(fan_out.tags.clone());
			p.trace.retrieval = fan_out.envelopes.iter().map(EnvelopeTrace::from).collect();
		});

		let policy_overrides = plan.policy.merged(&query.preferences.policy);
		let aggregation = aggregator::aggregate(
			&cfg.aggregator,
			&cfg.policy,
			providers.rerank.as_ref(),
			AggregateInput {
				query_text: &query.raw_text,
				envelopes: &fan_out.envelopes,
				author,
				topic_terms: &ctx.topic_terms,
				freshness_days: query.preferences.freshness_days,
				policy_overrides: &policy_overrides,
				now: OffsetDateTime::now_utc(),
			},
		)
		.await;
		let evidence = aggregation.evidence;
		let author_gap = aggregation.tags.contains(FailureTag::AuthorGap);

		record(progress, |p| {
			p.tags.extend(aggregation.tags.clone());
			p.trace.aggregation = Some(aggregation.stats.clone());
			p.trace.evidence = evidence
				.iter()
				.map(|entry| EvidenceTrace {
					chunk_id: entry.item.chunk_id.clone(),
					agent: entry.agent_id,
					sub_query_id: entry.sub_query_id.clone(),
					normalized_score: entry.normalized_score,
					rerank_score: entry.rerank_score,
					final_score: entry.final_score,
					dedup_group_size: entry.dedup_group_size,
					author_match: entry.author_match,
				})
				.collect();
		});

		let graph_evidence = graph::gather(&cfg.graph, providers.graph.as_deref(), &evidence).await;

		if cfg.graph.enabled {
			record(progress, |p| {
				p.trace.graph = Some(GraphTrace {
					claims: graph_evidence.claims.len(),
					unresolved_contradictions: graph_evidence.unresolved_contradictions(),
					strong_relations: graph_evidence.strong_relations.len(),
					relation_conflicts: graph_evidence.relation_conflicts.len(),
				});
			});
		}

		let verdict = judge::judge(
			&cfg.judge,
			providers.generation.as_ref(),
			JudgeInput {
				query_text: &query.raw_text,
				hypotheses: &plan.hypotheses,
				evidence: &evidence,
				graph: &graph_evidence,
			},
		)
		.await;

		record(progress, |p| {
			p.tags.extend(verdict.failure_tags.clone());
			p.trace.contradiction_flags = verdict.contradiction_flags.clone();
			p.trace.judge_notes = verdict.notes.clone();
		});

		let gap_author = author.filter(|_| author_gap).map(|hint| hint.name.as_str());
		let result = synthesis::synthesize(
			&cfg.synthesis,
			providers.generation.as_ref(),
			SynthesisInput {
				query_text: &query.raw_text,
				evidence: &evidence,
				verdict: &verdict,
				author_gap: gap_author,
			},
		)
		.await;

		record(progress, |p| {
			p.tags.extend(result.failure_tags.clone());
			p.trace.synthesis = Some(result.explain_trace.clone());
		});

		Answer {
			answer: result.answer,
			provenance: result.provenance,
			confidence: result.confidence,
		}
	}
}

fn record<F>(progress: &Mutex<Progress>, f: F)
where
	F: FnOnce(&mut Progress),
{
	let mut guard = progress.lock().unwrap_or_else(|err| err.into_inner());

	f(&mut *guard);
}

fn default_user_id() -> String {
	"anonymous".to_string()
}
