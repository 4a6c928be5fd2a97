use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub providers: Providers,
	pub agents: Agents,
	pub resolver: Resolver,
	pub planner: Planner,
	pub controller: Controller,
	#[serde(default)]
	pub policy: Policy,
	pub aggregator: Aggregator,
	#[serde(default)]
	pub graph: Graph,
	pub judge: Judge,
	pub synthesis: Synthesis,
	pub pipeline: Pipeline,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub generation: LlmProviderConfig,
	pub rerank: ProviderConfig,
	/// Optional. Required only when `graph.enabled` is true.
	pub graph: Option<ProviderConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	/// Process-wide cap on in-flight generation calls.
	#[serde(default = "default_llm_max_concurrent")]
	pub max_concurrent: u32,
	#[serde(default = "default_llm_max_retries")]
	pub max_retries: u32,
	#[serde(default = "default_llm_retry_base_ms")]
	pub retry_base_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct Agents {
	pub vector: AgentEndpoint,
	pub lexical: AgentEndpoint,
	#[serde(default)]
	pub structured: StructuredAgent,
	#[serde(default = "default_true")]
	pub author_lexical_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentEndpoint {
	pub api_base: String,
	pub path: String,
	#[serde(default)]
	pub api_key: String,
	#[serde(default = "default_agent_top_k")]
	pub top_k: u32,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

/// The structured agent reads lexical hits and keeps table-like or key-value lines.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StructuredAgent {
	pub enabled: bool,
	pub top_k: u32,
	pub max_lines_per_hit: u32,
	pub max_line_chars: u32,
}
impl Default for StructuredAgent {
	fn default() -> Self {
		Self { enabled: true, top_k: 6, max_lines_per_hit: 3, max_line_chars: 400 }
	}
}

#[derive(Debug, Deserialize)]
pub struct Resolver {
	#[serde(default = "default_min_keyword_hits")]
	pub min_keyword_hits: u32,
	#[serde(default)]
	pub domains: BTreeMap<String, DomainConfig>,
	/// Term -> synonyms. Keys and values are matched case-insensitively.
	#[serde(default)]
	pub synonyms: BTreeMap<String, Vec<String>>,
	#[serde(default)]
	pub authors: Vec<AuthorConfig>,
	/// Domains searched in addition to the unrestricted index when no domain is active.
	#[serde(default)]
	pub fallback_domains: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DomainConfig {
	pub keywords: Vec<String>,
	pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorConfig {
	pub name: String,
	#[serde(default)]
	pub aliases: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct Planner {
	pub use_llm: bool,
	pub timeout_ms: u64,
	pub max_sub_queries: u32,
	#[serde(default = "default_planner_max_tokens")]
	pub max_tokens: u32,
}

#[derive(Debug, Deserialize)]
pub struct Controller {
	pub agent_timeout_ms: u64,
	pub max_in_flight: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Policy {
	/// Case-insensitive substrings; any match blocks the item.
	pub blocklist: Vec<String>,
	/// Case-insensitive substrings; when non-empty, items must match one.
	pub allowlist: Vec<String>,
	pub source_types_allow: Vec<String>,
	pub source_types_block: Vec<String>,
	pub domains_allow: Vec<String>,
	pub domains_block: Vec<String>,
	/// Evaluated in order; the first matching rule decides.
	pub rules: Vec<PolicyRule>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyRule {
	pub action: String,
	#[serde(default)]
	pub domains: Vec<String>,
	#[serde(default)]
	pub source_types: Vec<String>,
	#[serde(default)]
	pub sources: Vec<String>,
	#[serde(default)]
	pub contains: Vec<String>,
	#[serde(default)]
	pub not_contains: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct Aggregator {
	/// One of "min_max" or "rank".
	pub normalization: String,
	pub dedup_similarity: f32,
	pub top_k: u32,
	/// One of "off", "soft", or "strong".
	pub author_bias: String,
	pub author_boost: f32,
	pub author_score_floor: f32,
	pub min_results_count: u32,
	pub min_top_score: f32,
	pub default_freshness_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Graph {
	pub enabled: bool,
	pub max_depth: u32,
	pub max_nodes: u32,
	pub min_contradiction_confidence: f32,
	pub strong_relation_min_count: u32,
}
impl Default for Graph {
	fn default() -> Self {
		Self {
			enabled: false,
			max_depth: 2,
			max_nodes: 200,
			min_contradiction_confidence: 0.5,
			strong_relation_min_count: 2,
		}
	}
}

#[derive(Debug, Deserialize)]
pub struct Judge {
	pub use_llm: bool,
	pub timeout_ms: u64,
	#[serde(default = "default_judge_max_tokens")]
	pub max_tokens: u32,
	pub top_n: u32,
	pub contradiction_penalty_per_claim: f32,
	pub contradiction_penalty_max: f32,
	pub contradiction_confidence_cap: f32,
	/// Minimum contradiction count on a claim that makes its backing chunks untrusted.
	pub contradiction_severity: u32,
	pub relation_boost_per_relation: f32,
	/// Cap shared by the relation and support boosts.
	pub relation_boost_max: f32,
	/// Boost per unit of corroborating claim support.
	#[serde(default = "default_support_boost_per_unit")]
	pub support_boost_per_unit: f32,
	pub relation_conflict_penalty: f32,
	pub cross_domain_penalty: f32,
	/// Pairs of domains whose evidence must not be combined without a penalty.
	#[serde(default)]
	pub exclusive_domains: Vec<[String; 2]>,
	#[serde(default = "default_max_evidence_snippets")]
	pub max_evidence_snippets: u32,
}

#[derive(Debug, Deserialize)]
pub struct Synthesis {
	pub enabled: bool,
	pub timeout_ms: u64,
	#[serde(default = "default_synthesis_max_tokens")]
	pub max_tokens: u32,
	#[serde(default = "default_max_evidence_snippets")]
	pub max_evidence_snippets: u32,
	pub fallback_confidence_factor: f32,
	#[serde(default = "default_fallback_sentences")]
	pub fallback_sentences: u32,
}

#[derive(Debug, Deserialize)]
pub struct Pipeline {
	pub request_timeout_ms: u64,
}

fn default_true() -> bool {
	true
}

fn default_llm_max_concurrent() -> u32 {
	2
}

fn default_llm_max_retries() -> u32 {
	3
}

fn default_llm_retry_base_ms() -> u64 {
	500
}

fn default_agent_top_k() -> u32 {
	6
}

fn default_min_keyword_hits() -> u32 {
	2
}

fn default_planner_max_tokens() -> u32 {
	300
}

fn default_judge_max_tokens() -> u32 {
	150
}

fn default_synthesis_max_tokens() -> u32 {
	250
}

fn default_support_boost_per_unit() -> f32 {
	0.05
}

fn default_max_evidence_snippets() -> u32 {
	8
}

fn default_fallback_sentences() -> u32 {
	2
}
