use crate::{GraphStore, aggregator::AggregatedEvidence};
use sag_config::Graph;
use sag_domain::graph::{self, GraphEvidence, ReasonerLimits};

/// Graph signals for the aggregated evidence. Disabled graphs, missing stores, and store failures
/// all yield empty evidence so the judge scores without graph adjustments.
pub async fn gather(
	cfg: &Graph,
	store: Option<&dyn GraphStore>,
	evidence: &[AggregatedEvidence],
) -> GraphEvidence {
	if !cfg.enabled || evidence.is_empty() {
		return GraphEvidence::default();
	}

	let Some(store) = store else { return GraphEvidence::default() };
	let seeds: Vec<String> = evidence.iter().map(|entry| entry.item.chunk_id.clone()).collect();
	let subgraph = match store.subgraph(&seeds, cfg.max_depth).await {
		Ok(subgraph) => subgraph,
		Err(err) => {
			tracing::warn!(
				error = %err,
				seeds = seeds.len(),
				"Graph store failed. Skipping graph reasoning."
			);

			return GraphEvidence::default();
		},
	};
	let projected = graph::project(&subgraph, &seeds, cfg.max_depth, cfg.max_nodes as usize);
	let limits = ReasonerLimits {
		min_contradiction_confidence: cfg.min_contradiction_confidence,
		strong_relation_min_count: cfg.strong_relation_min_count,
	};
	let out = graph::reason(&projected, &seeds, limits);

	tracing::debug!(
		nodes = projected.nodes.len(),
		edges = projected.edges.len(),
		claims = out.claims.len(),
		unresolved_contradictions = out.unresolved_contradictions(),
		"Graph reasoning finished."
	);

	out
}
