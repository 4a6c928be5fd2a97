use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preferences {
	pub freshness_days: Option<u32>,
	/// Forces routing to a single domain, bypassing keyword classification.
	pub domain: Option<String>,
	#[serde(default)]
	pub source_types: Vec<String>,
	#[serde(flatten)]
	pub policy: PolicyOverrides,
}

/// Request-scoped entries appended to the configured policy lists. Overrides can only add
/// restrictions; they never remove a configured entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyOverrides {
	#[serde(default)]
	pub allowlist: Vec<String>,
	#[serde(default)]
	pub blocklist: Vec<String>,
	#[serde(default)]
	pub source_types_allow: Vec<String>,
	#[serde(default)]
	pub source_types_block: Vec<String>,
	#[serde(default)]
	pub domains_allow: Vec<String>,
	#[serde(default)]
	pub domains_block: Vec<String>,
}
impl PolicyOverrides {
	pub fn is_empty(&self) -> bool {
		self.allowlist.is_empty()
			&& self.blocklist.is_empty()
			&& self.source_types_allow.is_empty()
			&& self.source_types_block.is_empty()
			&& self.domains_allow.is_empty()
			&& self.domains_block.is_empty()
	}

	/// `self` followed by `other`, list by list.
	pub fn merged(&self, other: &Self) -> Self {
		let join =
			|a: &[String], b: &[String]| -> Vec<String> { a.iter().chain(b).cloned().collect() };

		Self {
			allowlist: join(&self.allowlist, &other.allowlist),
			blocklist: join(&self.blocklist, &other.blocklist),
			source_types_allow: join(&self.source_types_allow, &other.source_types_allow),
			source_types_block: join(&self.source_types_block, &other.source_types_block),
			domains_allow: join(&self.domains_allow, &other.domains_allow),
			domains_block: join(&self.domains_block, &other.domains_block),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
	pub id: String,
	pub raw_text: String,
	pub user_id: String,
	#[serde(default)]
	pub preferences: Preferences,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubQueryConstraints {
	pub domain: Option<String>,
	pub freshness_days: Option<u32>,
	#[serde(default)]
	pub source_types: Vec<String>,
	/// Restricts lexical matching to one author. Set only on author-scoped calls.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub author: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubQuery {
	pub id: String,
	pub text: String,
	pub constraints: SubQueryConstraints,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
	Vector,
	Lexical,
	Structured,
	LexicalAuthor,
}
impl AgentKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Vector => "vector",
			Self::Lexical => "lexical",
			Self::Structured => "structured",
			Self::LexicalAuthor => "lexical_author",
		}
	}
}
impl fmt::Display for AgentKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceMetadata {
	#[serde(default)]
	pub domain: Option<String>,
	#[serde(default)]
	pub author: Option<String>,
	#[serde(default, with = "crate::time_serde::option")]
	pub timestamp: Option<OffsetDateTime>,
	#[serde(default)]
	pub source_type: Option<String>,
	#[serde(default)]
	pub offset_start: Option<u32>,
	#[serde(default)]
	pub offset_end: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
	pub source_id: String,
	pub chunk_id: String,
	pub text: String,
	pub raw_score: f32,
	pub method: AgentKind,
	#[serde(default)]
	pub metadata: EvidenceMetadata,
}
impl EvidenceItem {
	pub fn domain(&self) -> &str {
		self.metadata.domain.as_deref().unwrap_or("")
	}

	pub fn source_type(&self) -> &str {
		self.metadata.source_type.as_deref().unwrap_or("")
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStatus {
	Ok,
	Timeout,
	Error,
	ZeroHits,
}
impl RetrievalStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Ok => "ok",
			Self::Timeout => "timeout",
			Self::Error => "error",
			Self::ZeroHits => "zero_hits",
		}
	}
}

/// The result of one agent call for one sub-query. Built once and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalEnvelope {
	pub agent_id: AgentKind,
	pub sub_query_id: String,
	pub status: RetrievalStatus,
	pub items: Vec<EvidenceItem>,
	pub elapsed_ms: u64,
}
impl RetrievalEnvelope {
	pub fn from_items(
		agent_id: AgentKind,
		sub_query_id: &str,
		items: Vec<EvidenceItem>,
		elapsed_ms: u64,
	) -> Self {
		let status = if items.is_empty() { RetrievalStatus::ZeroHits } else { RetrievalStatus::Ok };

		Self { agent_id, sub_query_id: sub_query_id.to_string(), status, items, elapsed_ms }
	}

	pub fn failed(
		agent_id: AgentKind,
		sub_query_id: &str,
		status: RetrievalStatus,
		elapsed_ms: u64,
	) -> Self {
		Self {
			agent_id,
			sub_query_id: sub_query_id.to_string(),
			status,
			items: Vec::new(),
			elapsed_ms,
		}
	}
}
