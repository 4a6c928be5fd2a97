//! Read-only knowledge-graph model and the pure scoring derived from a projected subgraph.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Depth beyond this is never requested from a store.
pub const MAX_PROJECTION_DEPTH: u32 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
	Claim,
	Entity,
	Chunk,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
	Cites,
	Supports,
	Contradicts,
	Mentions,
	UpdatedBy,
	/// Entity-to-entity relation carrying a predicate.
	Relates,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
	pub id: String,
	pub kind: NodeKind,
	#[serde(default)]
	pub label: String,
	#[serde(default = "default_confidence")]
	pub confidence_score: f32,
	#[serde(default, with = "crate::time_serde::option")]
	pub last_verified: Option<OffsetDateTime>,
	#[serde(default)]
	pub extracted_by: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
	pub src: String,
	pub dst: String,
	pub kind: EdgeKind,
	#[serde(default)]
	pub predicate: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Subgraph {
	#[serde(default)]
	pub nodes: Vec<GraphNode>,
	#[serde(default)]
	pub edges: Vec<GraphEdge>,
}
impl Subgraph {
	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ClaimSignal {
	/// SUPPORTS edges from evidence chunks, each weighted by the chunk's confidence.
	pub support_count: f32,
	/// Contradicting claims at or above the confidence threshold.
	pub contradiction_count: u32,
	/// Paths of length one or two from evidence chunks to this claim.
	pub path_signal: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RelationStrength {
	pub src: String,
	pub predicate: String,
	pub dst: String,
	pub count: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RelationConflict {
	pub src: String,
	pub dst: String,
	pub predicates: Vec<String>,
}

#[derive(Clone, Copy, Debug)]
pub struct ReasonerLimits {
	pub min_contradiction_confidence: f32,
	pub strong_relation_min_count: u32,
}

/// Everything the judge needs from the graph. Empty means no graph evidence.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GraphEvidence {
	pub claims: BTreeMap<String, ClaimSignal>,
	/// Evidence chunk id -> claims it backs.
	pub chunk_claims: BTreeMap<String, BTreeSet<String>>,
	pub strong_relations: Vec<RelationStrength>,
	pub relation_conflicts: Vec<RelationConflict>,
}
impl GraphEvidence {
	/// Claims with at least one contradiction.
	pub fn unresolved_contradictions(&self) -> usize {
		self.claims.values().filter(|signal| signal.contradiction_count > 0).count()
	}

	pub fn contradicted_claims(&self) -> Vec<(&str, u32)> {
		self.claims
			.iter()
			.filter(|(_, signal)| signal.contradiction_count > 0)
			.map(|(id, signal)| (id.as_str(), signal.contradiction_count))
			.collect()
	}

	/// Support weight of uncontradicted claims reached by at least `min_paths` short paths from
	/// the evidence.
	pub fn corroboration(&self, min_paths: u32) -> f32 {
		self.claims
			.values()
			.filter(|signal| signal.contradiction_count == 0 && signal.path_signal >= min_paths)
			.map(|signal| signal.support_count)
			.sum()
	}

	/// Highest contradiction count among the claims a chunk backs.
	pub fn chunk_contradiction_severity(&self, chunk_id: &str) -> u32 {
		let Some(claims) = self.chunk_claims.get(chunk_id) else { return 0 };

		claims
			.iter()
			.filter_map(|claim| self.claims.get(claim))
			.map(|signal| signal.contradiction_count)
			.max()
			.unwrap_or(0)
	}
}

/// Breadth-first projection around `seeds`, treating edges as undirected. Nodes are admitted in
/// discovery order until `max_nodes`; only edges between admitted nodes are kept.
pub fn project(graph: &Subgraph, seeds: &[String], max_depth: u32, max_nodes: usize) -> Subgraph {
	let depth_limit = max_depth.min(MAX_PROJECTION_DEPTH);
	let adjacency = adjacency(graph);
	let known: HashMap<&str, &GraphNode> =
		graph.nodes.iter().map(|node| (node.id.as_str(), node)).collect();
	let mut admitted: Vec<&str> = Vec::new();
	let mut seen: BTreeSet<&str> = BTreeSet::new();
	let mut queue: VecDeque<(&str, u32)> = VecDeque::new();

	for seed in seeds {
		if known.contains_key(seed.as_str()) && seen.insert(seed.as_str()) {
			queue.push_back((seed.as_str(), 0));
		}
	}

	while let Some((id, depth)) = queue.pop_front() {
		if admitted.len() >= max_nodes {
			break;
		}

		admitted.push(id);

		if depth >= depth_limit {
			continue;
		}

		for &neighbor in adjacency.get(id).into_iter().flatten() {
			if known.contains_key(neighbor) && seen.insert(neighbor) {
				queue.push_back((neighbor, depth + 1));
			}
		}
	}

	let admitted_set: BTreeSet<&str> = admitted.iter().copied().collect();
	let nodes =
		admitted.iter().filter_map(|id| known.get(id)).map(|node| (*node).clone()).collect();
	let edges = graph
		.edges
		.iter()
		.filter(|edge| {
			admitted_set.contains(edge.src.as_str()) && admitted_set.contains(edge.dst.as_str())
		})
		.cloned()
		.collect();

	Subgraph { nodes, edges }
}

/// Derives claim signals and relation statistics for the evidence chunks in `seeds`.
pub fn reason(subgraph: &Subgraph, seeds: &[String], limits: ReasonerLimits) -> GraphEvidence {
	let seed_set: BTreeSet<&str> = seeds.iter().map(String::as_str).collect();
	let kinds: HashMap<&str, &GraphNode> =
		subgraph.nodes.iter().map(|node| (node.id.as_str(), node)).collect();
	let is_kind = |id: &str, kind: NodeKind| kinds.get(id).is_some_and(|node| node.kind == kind);
	let confidence = |id: &str| kinds.get(id).map(|node| node.confidence_score).unwrap_or(1.0);
	let mut out = GraphEvidence::default();

	for edge in &subgraph.edges {
		let backing = matches!(edge.kind, EdgeKind::Supports | EdgeKind::Cites);
		let (src, dst) = (edge.src.as_str(), edge.dst.as_str());
		let pair = if seed_set.contains(src) && is_kind(dst, NodeKind::Claim) {
			Some((src, dst))
		} else if seed_set.contains(dst) && is_kind(src, NodeKind::Claim) {
			Some((dst, src))
		} else {
			None
		};
		let Some((chunk, claim)) = pair else { continue };

		if !backing {
			continue;
		}

		out.chunk_claims.entry(chunk.to_string()).or_default().insert(claim.to_string());

		let signal = out.claims.entry(claim.to_string()).or_default();

		if edge.kind == EdgeKind::Supports {
			signal.support_count += confidence(chunk);
		}
	}

	let adjacency = adjacency(subgraph);

	for (claim, signal) in out.claims.iter_mut() {
		signal.contradiction_count = contradiction_count(subgraph, claim, limits, &confidence);
		signal.path_signal = path_count(&adjacency, &seed_set, claim);
	}

	let (strong, conflicts) = relation_statistics(subgraph, limits.strong_relation_min_count);

	out.strong_relations = strong;
	out.relation_conflicts = conflicts;

	out
}

fn contradiction_count<F>(
	subgraph: &Subgraph,
	claim: &str,
	limits: ReasonerLimits,
	confidence: &F,
) -> u32
where
	F: Fn(&str) -> f32,
{
	let others: BTreeSet<&str> = subgraph
		.edges
		.iter()
		.filter(|edge| edge.kind == EdgeKind::Contradicts)
		.filter_map(|edge| {
			if edge.src == claim {
				Some(edge.dst.as_str())
			} else if edge.dst == claim {
				Some(edge.src.as_str())
			} else {
				None
			}
		})
		.filter(|other| *other != claim)
		.filter(|other| confidence(other) >= limits.min_contradiction_confidence)
		.collect();

	others.len() as u32
}

fn path_count(adjacency: &HashMap<&str, Vec<&str>>, seeds: &BTreeSet<&str>, claim: &str) -> u32 {
	let mut paths = 0;

	for seed in seeds {
		let Some(first_hops) = adjacency.get(seed) else { continue };

		for hop in first_hops {
			if *hop == claim {
				paths += 1;

				continue;
			}
			if *hop == *seed {
				continue;
			}

			paths += adjacency
				.get(hop)
				.into_iter()
				.flatten()
				.filter(|next| **next == claim && **next != *seed)
				.count() as u32;
		}
	}

	paths
}

fn relation_statistics(
	subgraph: &Subgraph,
	strong_min_count: u32,
) -> (Vec<RelationStrength>, Vec<RelationConflict>) {
	let mut counts: BTreeMap<(&str, &str, &str), u32> = BTreeMap::new();
	let mut predicates: BTreeMap<(&str, &str), BTreeSet<&str>> = BTreeMap::new();

	for edge in subgraph.edges.iter().filter(|edge| edge.kind == EdgeKind::Relates) {
		let predicate = edge.predicate.as_deref().unwrap_or("related_to");

		*counts.entry((edge.src.as_str(), predicate, edge.dst.as_str())).or_default() += 1;

		predicates.entry((edge.src.as_str(), edge.dst.as_str())).or_default().insert(predicate);
	}

	let mut strong: Vec<RelationStrength> = counts
		.into_iter()
		.filter(|(_, count)| *count >= strong_min_count)
		.map(|((src, predicate, dst), count)| RelationStrength {
			src: src.to_string(),
			predicate: predicate.to_string(),
			dst: dst.to_string(),
			count,
		})
		.collect();

	strong.sort_by(|a, b| b.count.cmp(&a.count));

	let conflicts = predicates
		.into_iter()
		.filter(|(_, predicates)| predicates.len() > 1)
		.map(|((src, dst), predicates)| RelationConflict {
			src: src.to_string(),
			dst: dst.to_string(),
			predicates: predicates.into_iter().map(str::to_string).collect(),
		})
		.collect();

	(strong, conflicts)
}

fn adjacency(graph: &Subgraph) -> HashMap<&str, Vec<&str>> {
	let mut out: HashMap<&str, Vec<&str>> = HashMap::new();

	for edge in &graph.edges {
		out.entry(edge.src.as_str()).or_default().push(edge.dst.as_str());
		out.entry(edge.dst.as_str()).or_default().push(edge.src.as_str());
	}

	out
}

fn default_confidence() -> f32 {
	1.0
}

#[cfg(test)]
mod tests {
	use super::*;

	fn node(id: &str, kind: NodeKind, confidence_score: f32) -> GraphNode {
		GraphNode {
			id: id.to_string(),
			kind,
			label: String::new(),
			confidence_score,
			last_verified: None,
			extracted_by: "test".to_string(),
		}
	}

	fn edge(src: &str, dst: &str, kind: EdgeKind) -> GraphEdge {
		GraphEdge { src: src.to_string(), dst: dst.to_string(), kind, predicate: None }
	}

	fn relates(src: &str, predicate: &str, dst: &str) -> GraphEdge {
		GraphEdge {
			src: src.to_string(),
			dst: dst.to_string(),
			kind: EdgeKind::Relates,
			predicate: Some(predicate.to_string()),
		}
	}

	fn limits() -> ReasonerLimits {
		ReasonerLimits { min_contradiction_confidence: 0.5, strong_relation_min_count: 2 }
	}

	fn sample() -> Subgraph {
		Subgraph {
			nodes: vec![
				node("c1", NodeKind::Chunk, 0.8),
				node("c2", NodeKind::Chunk, 1.0),
				node("claim-a", NodeKind::Claim, 0.9),
				node("claim-b", NodeKind::Claim, 0.7),
				node("claim-weak", NodeKind::Claim, 0.2),
				node("seneca", NodeKind::Entity, 1.0),
				node("nero", NodeKind::Entity, 1.0),
			],
			edges: vec![
				edge("c1", "claim-a", EdgeKind::Supports),
				edge("c2", "claim-a", EdgeKind::Supports),
				edge("claim-b", "c2", EdgeKind::Cites),
				edge("claim-a", "claim-b", EdgeKind::Contradicts),
				edge("claim-a", "claim-weak", EdgeKind::Contradicts),
				edge("c1", "seneca", EdgeKind::Mentions),
				relates("seneca", "advised", "nero"),
				relates("seneca", "advised", "nero"),
				relates("seneca", "opposed", "nero"),
			],
		}
	}

	#[test]
	fn claim_signals_weight_support_and_filter_weak_contradictions() {
		let seeds = vec!["c1".to_string(), "c2".to_string()];
		let evidence = reason(&sample(), &seeds, limits());
		let claim_a = &evidence.claims["claim-a"];

		assert!((claim_a.support_count - 1.8).abs() < 1e-6);
		assert_eq!(claim_a.contradiction_count, 1);
		assert_eq!(evidence.claims["claim-b"].contradiction_count, 1);
		assert_eq!(evidence.unresolved_contradictions(), 2);
		assert_eq!(evidence.chunk_contradiction_severity("c2"), 1);
		assert_eq!(evidence.corroboration(2), 0.0);
	}

	#[test]
	fn corroboration_counts_uncontradicted_multi_path_support() {
		let graph = Subgraph {
			nodes: vec![
				node("c1", NodeKind::Chunk, 0.8),
				node("c2", NodeKind::Chunk, 1.0),
				node("c3", NodeKind::Chunk, 1.0),
				node("shared", NodeKind::Claim, 0.9),
				node("lonely", NodeKind::Claim, 0.9),
			],
			edges: vec![
				edge("c1", "shared", EdgeKind::Supports),
				edge("c2", "shared", EdgeKind::Supports),
				edge("c3", "lonely", EdgeKind::Supports),
			],
		};
		let seeds = vec!["c1".to_string(), "c2".to_string(), "c3".to_string()];
		let evidence = reason(&graph, &seeds, limits());

		assert_eq!(evidence.claims["shared"].path_signal, 2);
		assert!((evidence.corroboration(2) - 1.8).abs() < 1e-6);
		assert!((evidence.corroboration(1) - 2.8).abs() < 1e-6);
	}

	#[test]
	fn path_signal_counts_short_paths() {
		let seeds = vec!["c1".to_string(), "c2".to_string()];
		let evidence = reason(&sample(), &seeds, limits());

		// c1 -> claim-a, c2 -> claim-a, c2 -> claim-b -> claim-a.
		assert_eq!(evidence.claims["claim-a"].path_signal, 3);
	}

	#[test]
	fn relation_strength_and_conflicts() {
		let evidence = reason(&sample(), &["c1".to_string()], limits());

		assert_eq!(evidence.strong_relations.len(), 1);
		assert_eq!(evidence.strong_relations[0].predicate, "advised");
		assert_eq!(evidence.relation_conflicts.len(), 1);
		assert_eq!(evidence.relation_conflicts[0].predicates, vec!["advised", "opposed"]);
	}

	#[test]
	fn projection_respects_depth_and_node_cap() {
		let graph = sample();
		let shallow = project(&graph, &["c1".to_string()], 1, 100);
		let capped = project(&graph, &["c1".to_string()], 2, 2);
		let ids: BTreeSet<&str> = shallow.nodes.iter().map(|node| node.id.as_str()).collect();

		assert_eq!(ids, BTreeSet::from(["c1", "claim-a", "seneca"]));
		assert!(shallow.edges.iter().all(|edge| ids.contains(edge.src.as_str())));
		assert_eq!(capped.nodes.len(), 2);
		assert!(project(&graph, &["missing".to_string()], 2, 10).is_empty());
	}
}
