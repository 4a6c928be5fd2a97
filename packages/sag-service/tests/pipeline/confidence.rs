use super::*;
use sag_domain::graph::{EdgeKind, NodeKind};
use sag_testkit::{edge, evidence, node};

const QUERY: &str = "How do stoic thinkers handle fear?";

fn graph_config() -> Config {
	sag_testkit::sample_config_with(&[("enabled = false\nmax_depth", "enabled = true\nmax_depth")])
		.expect("Config should load.")
}

fn vector_agent() -> Arc<FakeAgent> {
	Arc::new(FakeAgent::new(AgentKind::Vector).always(Reply::Ok(vec![
		evidence("v1", "Stoic thinkers hold that fear comes from judgment, not events.", 0.9),
		evidence("v2", "Rehearsing hardship ahead of time makes fear smaller for the stoic.", 0.8),
		evidence("v3", "Fear of loss fades once we stop treating possessions as our own.", 0.7),
	])))
}

/// One claim per contradiction, each backed by an evidence chunk and opposed by a rival claim.
fn contradicted_graph(contradictions: usize) -> Subgraph {
	let chunks = ["v1", "v2", "v3"];
	let mut subgraph = Subgraph {
		nodes: chunks.iter().map(|id| node(id, NodeKind::Chunk, 1.0)).collect(),
		edges: Vec::new(),
	};

	subgraph.nodes.push(node("claim-base", NodeKind::Claim, 0.9));
	subgraph.edges.push(edge("v1", "claim-base", EdgeKind::Supports));

	for index in 0..contradictions {
		let claim = format!("claim-{index}");
		let rival = format!("rival-{index}");

		subgraph.nodes.push(node(&claim, NodeKind::Claim, 0.9));
		subgraph.nodes.push(node(&rival, NodeKind::Claim, 0.9));
		subgraph.edges.push(edge(chunks[index % chunks.len()], &claim, EdgeKind::Supports));
		subgraph.edges.push(edge(&rival, &claim, EdgeKind::Contradicts));
	}

	subgraph
}

fn synthesis_reply() -> FakeGenerator {
	FakeGenerator {
		synthesis: Some(Reply::Ok(
			"{\"answer\": \"Fear follows judgment.\", \"provenance\": [\"v1\"], \
			\"confidence\": 1.0}"
				.to_string(),
		)),
		..Default::default()
	}
}

#[tokio::test]
async fn empty_evidence_has_zero_confidence() {
	let agents = Agents::empty();
	let response = service(config(), providers(&agents, FakeGenerator::default(), None))
		.query(request(QUERY))
		.await
		.expect("Query should succeed.");

	assert_eq!(response.confidence, 0.0);
	assert!(tags(&response).contains(&"no_results".to_string()));
	assert!(response.provenance.is_empty());
}

#[tokio::test]
async fn confidence_never_rises_with_more_contradictions() {
	let mut previous = f32::INFINITY;

	for contradictions in 0..5 {
		let agents = Agents { vector: vector_agent(), ..Agents::empty() };
		let response = service(
			graph_config(),
			providers(&agents, synthesis_reply(), Some(contradicted_graph(contradictions))),
		)
		.query(request(QUERY))
		.await
		.expect("Query should succeed.");
		let confidence = response.confidence;

		assert!((0.0..=1.0).contains(&confidence), "confidence {confidence} out of bounds");
		assert!(
			confidence <= previous,
			"{contradictions} contradictions raised confidence from {previous} to {confidence}"
		);
		assert_eq!(response.explain_trace.contradiction_flags.len(), contradictions);

		if contradictions > 0 {
			assert!(confidence <= 0.6);
		}

		previous = confidence;
	}
}

#[tokio::test]
async fn graph_store_failure_degrades_to_no_graph_evidence() {
	let agents = Agents { vector: vector_agent(), ..Agents::empty() };
	let with_failure = service(graph_config(), providers(&agents, synthesis_reply(), None))
		.query(request(QUERY))
		.await
		.expect("Query should succeed.");
	let without_graph = service(config(), providers(&agents, synthesis_reply(), None))
		.query(request(QUERY))
		.await
		.expect("Query should succeed.");
	let graph = with_failure.explain_trace.graph.as_ref().expect("Graph stage should be traced.");

	assert_eq!(graph.claims, 0);
	assert!((with_failure.confidence - without_graph.confidence).abs() < 1e-6);
	assert!(without_graph.explain_trace.graph.is_none());
}
