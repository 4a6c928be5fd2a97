use std::{collections::BTreeSet, time::Duration};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{GenerateOptions, GenerationProvider};
use sag_config::{Planner, Resolver};
use sag_domain::{
	evidence::{PolicyOverrides, Query, SubQuery, SubQueryConstraints},
	resolver::{self, ResolvedContext},
	text,
};

/// A sub-query entry's own fields, or the plan-wide ones.
type Fields<'a> = Option<&'a Map<String, Value>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
	Llm,
	Fallback,
}

#[derive(Clone, Debug, Serialize)]
pub struct Plan {
	pub intent: Option<String>,
	pub hypotheses: Vec<String>,
	pub sub_queries: Vec<SubQuery>,
	pub source: PlanSource,
	/// Policy entries the plan adds for this request.
	#[serde(skip_serializing_if = "PolicyOverrides::is_empty")]
	pub policy: PolicyOverrides,
}

/// Asks the generation provider for a plan and falls back to the rule-based plan on any error,
/// timeout, or unusable reply.
pub async fn plan(
	cfg: &Planner,
	resolver_cfg: &Resolver,
	generator: &dyn GenerationProvider,
	query: &Query,
	ctx: &ResolvedContext,
) -> Plan {
	let max = cfg.max_sub_queries as usize;

	if !cfg.use_llm {
		return fallback_plan(query, ctx, resolver_cfg, max);
	}

	let timeout = Duration::from_millis(cfg.timeout_ms);
	let opts = GenerateOptions { max_tokens: cfg.max_tokens, timeout };
	let prompt = plan_prompt(query, ctx, max);
	let reply = match tokio::time::timeout(timeout, generator.generate(&prompt, opts)).await {
		Ok(Ok(reply)) => reply,
		Ok(Err(err)) => {
			tracing::warn!(
				error = %err,
				query_id = %query.id,
				"Planner generation failed. Using fallback plan."
			);

			return fallback_plan(query, ctx, resolver_cfg, max);
		},
		Err(_) => {
			tracing::warn!(
				query_id = %query.id,
				timeout_ms = cfg.timeout_ms,
				"Planner timed out. Using fallback plan."
			);

			return fallback_plan(query, ctx, resolver_cfg, max);
		},
	};

	match parse_plan(&reply, query, ctx, max) {
		Some(plan) => plan,
		None => {
			tracing::warn!(
				query_id = %query.id,
				"Planner reply is not a usable plan. Using fallback plan."
			);

			fallback_plan(query, ctx, resolver_cfg, max)
		},
	}
}

/// One sub-query per active domain, or one unrestricted sub-query plus one per fallback domain.
pub fn fallback_plan(
	query: &Query,
	ctx: &ResolvedContext,
	resolver_cfg: &Resolver,
	max: usize,
) -> Plan {
	let text = expanded_text(&query.raw_text, ctx);
	let domains: Vec<Option<String>> = if ctx.domains.is_empty() {
		std::iter::once(None)
			.chain(resolver_cfg.fallback_domains.iter().cloned().map(Some))
			.collect()
	} else {
		ctx.domains.iter().cloned().map(Some).collect()
	};
	let sub_queries = domains
		.into_iter()
		.take(max.max(1))
		.enumerate()
		.map(|(index, domain)| SubQuery {
			id: sub_query_id(index),
			text: text.clone(),
			constraints: SubQueryConstraints {
				domain,
				freshness_days: query.preferences.freshness_days,
				source_types: query.preferences.source_types.clone(),
				author: None,
			},
		})
		.collect();

	Plan {
		intent: None,
		hypotheses: Vec::new(),
		sub_queries,
		source: PlanSource::Fallback,
		policy: PolicyOverrides::default(),
	}
}

/// Accepts `sub_queries` or `queries` holding strings or `{text, domain?, freshness_days?,
/// source_types?}` objects. Returns `None` when no usable sub-query remains.
pub fn parse_plan(reply: &str, query: &Query, ctx: &ResolvedContext, max: usize) -> Option<Plan> {
	let map = text::extract_json_object(reply)?;
	let entries = map.get("sub_queries").or_else(|| map.get("queries"))?.as_array()?;
	let shared = map.get("constraints").and_then(Value::as_object);
	let default_domain = query
		.preferences
		.domain
		.clone()
		.or_else(|| (ctx.domains.len() == 1).then(|| ctx.domains.iter().next().cloned()).flatten());
	let mut seen = BTreeSet::new();
	let mut sub_queries = Vec::new();

	for entry in entries {
		if sub_queries.len() >= max {
			break;
		}

		let (text, own) = match entry {
			Value::String(text) => (text.trim().to_string(), None),
			Value::Object(obj) => {
				let text = obj.get("text").or_else(|| obj.get("query"));
				let Some(text) = text.and_then(Value::as_str) else {
					continue;
				};

				(text.trim().to_string(), Some(obj))
			},
			_ => continue,
		};

		if text.is_empty() || !seen.insert(text.to_lowercase()) {
			continue;
		}

		let constraints = SubQueryConstraints {
			domain: string_field(own, shared, "domain")
				.map(|domain| domain.to_lowercase())
				.or_else(|| default_domain.clone()),
			freshness_days: u32_field(own, shared, "freshness_days")
				.or(query.preferences.freshness_days),
			source_types: query.preferences.source_types.clone(),
			author: None,
		};

		sub_queries.push(SubQuery { id: sub_query_id(sub_queries.len()), text, constraints });
	}

	if sub_queries.is_empty() {
		return None;
	}

	let intent = map.get("intent").and_then(Value::as_str).map(str::to_string);
	let hypotheses = map
		.get("hypotheses")
		.and_then(Value::as_array)
		.map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
		.unwrap_or_default();

	let policy = policy_overrides(shared);

	Some(Plan { intent, hypotheses, sub_queries, source: PlanSource::Llm, policy })
}

/// The query text followed by expanded terms it does not already contain.
pub fn expanded_text(raw: &str, ctx: &ResolvedContext) -> String {
	let present: BTreeSet<String> = resolver::tokenize(raw).into_iter().collect();
	let extra: Vec<&str> = ctx
		.expanded_terms
		.iter()
		.filter(|term| !present.contains(*term))
		.map(String::as_str)
		.collect();

	if extra.is_empty() {
		return raw.trim().to_string();
	}

	format!("{} {}", raw.trim(), extra.join(" "))
}

fn plan_prompt(query: &Query, ctx: &ResolvedContext, max: usize) -> String {
	let domains = ctx.domains.iter().cloned().collect::<Vec<_>>().join(", ");
	let terms = ctx.expanded_terms.iter().cloned().collect::<Vec<_>>().join(", ");

	format!(
		"Plan retrieval for the user query. Return JSON only:\n\
		{{\"intent\": \"...\", \"hypotheses\": [\"...\"], \
		\"sub_queries\": [{{\"text\": \"...\", \"domain\": null}}], \"constraints\": {{}}}}\n\
		Use at most {max} sub-queries.\n\n\
		User query:\n{}\n\nActive domains: {domains}\nExpanded terms: {terms}\n",
		query.raw_text
	)
}

fn sub_query_id(index: usize) -> String {
	format!("sq{}", index + 1)
}

fn string_field(own: Fields<'_>, shared: Fields<'_>, key: &str) -> Option<String> {
	[own, shared]
		.into_iter()
		.flatten()
		.find_map(|obj| obj.get(key).and_then(Value::as_str))
		.map(str::trim)
		.filter(|value| !value.is_empty())
		.map(str::to_string)
}

fn u32_field(own: Fields<'_>, shared: Fields<'_>, key: &str) -> Option<u32> {
	[own, shared]
		.into_iter()
		.flatten()
		.find_map(|obj| obj.get(key).and_then(Value::as_u64))
		.and_then(|value| u32::try_from(value).ok())
}

/// Each list is an array of strings or one comma-separated string.
fn policy_overrides(shared: Fields<'_>) -> PolicyOverrides {
	let list = |key: &str| -> Vec<String> {
		match shared.and_then(|obj| obj.get(key)) {
			Some(Value::String(value)) => value
				.split(',')
				.map(str::trim)
				.filter(|value| !value.is_empty())
				.map(str::to_string)
				.collect(),
			Some(Value::Array(items)) =>
				items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
			_ => Vec::new(),
		}
	};

	PolicyOverrides {
		allowlist: list("allowlist"),
		blocklist: list("blocklist"),
		source_types_allow: list("source_types_allow"),
		source_types_block: list("source_types_block"),
		domains_allow: list("domains_allow"),
		domains_block: list("domains_block"),
	}
}
