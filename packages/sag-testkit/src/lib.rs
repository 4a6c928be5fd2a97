//! Fixtures shared by SAG integration tests: a valid sample configuration and builders for
//! evidence and graph data.

mod error;

pub use error::{Error, Result};

use std::path::Path;

use time::OffsetDateTime;

use sag_config::Config;
use sag_domain::{
	evidence::{AgentKind, EvidenceItem, EvidenceMetadata},
	graph::{EdgeKind, GraphEdge, GraphNode, NodeKind, Subgraph},
};

pub const SAMPLE_CONFIG: &str = include_str!("../fixtures/sample_config.toml");

/// Short timeouts, soft author bias, graph and LLM judge disabled.
pub fn sample_config() -> Result<Config> {
	Ok(sag_config::parse(SAMPLE_CONFIG, Path::new("sample_config.toml"))?)
}

/// Parses the sample configuration after applying textual `(from, to)` replacements.
pub fn sample_config_with(replacements: &[(&str, &str)]) -> Result<Config> {
	let mut raw = SAMPLE_CONFIG.to_string();

	for (from, to) in replacements {
		if !raw.contains(from) {
			return Err(Error::Message(format!("Sample config does not contain {from:?}.")));
		}

		raw = raw.replacen(from, to, 1);
	}

	Ok(sag_config::parse(&raw, Path::new("sample_config.toml"))?)
}

#[derive(Clone, Debug)]
pub struct EvidenceBuilder {
	item: EvidenceItem,
}
impl EvidenceBuilder {
	pub fn new(chunk_id: &str, text: &str, raw_score: f32) -> Self {
		Self {
			item: EvidenceItem {
				source_id: format!("{chunk_id}.md"),
				chunk_id: chunk_id.to_string(),
				text: text.to_string(),
				raw_score,
				method: AgentKind::Vector,
				metadata: EvidenceMetadata {
					offset_start: Some(0),
					offset_end: Some(text.len() as u32),
					..Default::default()
				},
			},
		}
	}

	pub fn source(mut self, source_id: &str) -> Self {
		self.item.source_id = source_id.to_string();

		self
	}

	pub fn domain(mut self, domain: &str) -> Self {
		self.item.metadata.domain = Some(domain.to_string());

		self
	}

	pub fn author(mut self, author: &str) -> Self {
		self.item.metadata.author = Some(author.to_string());

		self
	}

	pub fn source_type(mut self, source_type: &str) -> Self {
		self.item.metadata.source_type = Some(source_type.to_string());

		self
	}

	pub fn timestamp(mut self, timestamp: OffsetDateTime) -> Self {
		self.item.metadata.timestamp = Some(timestamp);

		self
	}

	pub fn build(self) -> EvidenceItem {
		self.item
	}
}

pub fn evidence(chunk_id: &str, text: &str, raw_score: f32) -> EvidenceItem {
	EvidenceBuilder::new(chunk_id, text, raw_score).build()
}

pub fn node(id: &str, kind: NodeKind, confidence_score: f32) -> GraphNode {
	GraphNode {
		id: id.to_string(),
		kind,
		label: id.to_string(),
		confidence_score,
		last_verified: None,
		extracted_by: "testkit".to_string(),
	}
}

pub fn edge(src: &str, dst: &str, kind: EdgeKind) -> GraphEdge {
	GraphEdge { src: src.to_string(), dst: dst.to_string(), kind, predicate: None }
}

pub fn relation(src: &str, dst: &str, predicate: &str) -> GraphEdge {
	GraphEdge {
		src: src.to_string(),
		dst: dst.to_string(),
		kind: EdgeKind::Relates,
		predicate: Some(predicate.to_string()),
	}
}

/// `chunks` support `claim`, and each of `rivals` contradicts it.
pub fn contradiction_graph(chunks: &[&str], claim: &str, rivals: &[&str]) -> Subgraph {
	let mut nodes: Vec<GraphNode> =
		chunks.iter().map(|id| node(id, NodeKind::Chunk, 1.0)).collect();
	let mut edges: Vec<GraphEdge> =
		chunks.iter().map(|id| edge(id, claim, EdgeKind::Supports)).collect();

	nodes.push(node(claim, NodeKind::Claim, 0.9));

	for rival in rivals {
		nodes.push(node(rival, NodeKind::Claim, 0.9));
		edges.push(edge(rival, claim, EdgeKind::Contradicts));
	}

	Subgraph { nodes, edges }
}
