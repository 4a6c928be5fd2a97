mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Agents, AgentEndpoint, Aggregator, AuthorConfig, Config, Controller, DomainConfig, Graph,
	Judge, LlmProviderConfig, Pipeline, Planner, Policy, PolicyRule, ProviderConfig, Providers,
	Resolver, Service, StructuredAgent, Synthesis,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::Read { path: path.to_path_buf(), source: err })?;

	parse(&raw, path)
}

/// Parses, normalizes, and validates raw TOML. `origin` labels parse errors.
pub fn parse(raw: &str, origin: &Path) -> Result<Config> {
	let mut cfg: Config = toml::from_str(raw)
		.map_err(|err| Error::Parse { path: origin.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}

	validate_timeouts(cfg)?;

	if cfg.providers.generation.max_concurrent == 0 {
		return Err(Error::Validation {
			message: "providers.generation.max_concurrent must be greater than zero.".to_string(),
		});
	}
	if cfg.planner.max_sub_queries == 0 {
		return Err(Error::Validation {
			message: "planner.max_sub_queries must be greater than zero.".to_string(),
		});
	}
	if cfg.controller.max_in_flight == 0 {
		return Err(Error::Validation {
			message: "controller.max_in_flight must be greater than zero.".to_string(),
		});
	}
	if cfg.resolver.min_keyword_hits == 0 {
		return Err(Error::Validation {
			message: "resolver.min_keyword_hits must be greater than zero.".to_string(),
		});
	}

	for author in &cfg.resolver.authors {
		if author.name.trim().is_empty() {
			return Err(Error::Validation {
				message: "resolver.authors.name must be non-empty.".to_string(),
			});
		}
	}
	for domain in &cfg.resolver.fallback_domains {
		if !cfg.resolver.domains.contains_key(domain) {
			return Err(Error::Validation {
				message: format!(
					"resolver.fallback_domains references unknown domain {domain:?}."
				),
			});
		}
	}
	for rule in &cfg.policy.rules {
		if !matches!(rule.action.as_str(), "allow" | "block") {
			return Err(Error::Validation {
				message: "policy.rules.action must be one of allow or block.".to_string(),
			});
		}
	}

	validate_aggregator(cfg)?;
	validate_graph(cfg)?;
	validate_judge(cfg)?;

	if !(0.0..=1.0).contains(&cfg.synthesis.fallback_confidence_factor) {
		return Err(Error::Validation {
			message: "synthesis.fallback_confidence_factor must be in the range 0.0-1.0."
				.to_string(),
		});
	}

	for (label, key) in [
		("generation", &cfg.providers.generation.api_key),
		("rerank", &cfg.providers.rerank.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	Ok(())
}

fn validate_timeouts(cfg: &Config) -> Result<()> {
	let request = cfg.pipeline.request_timeout_ms;

	for (label, value) in [
		("pipeline.request_timeout_ms", request),
		("controller.agent_timeout_ms", cfg.controller.agent_timeout_ms),
		("planner.timeout_ms", cfg.planner.timeout_ms),
		("judge.timeout_ms", cfg.judge.timeout_ms),
		("synthesis.timeout_ms", cfg.synthesis.timeout_ms),
		("providers.generation.timeout_ms", cfg.providers.generation.timeout_ms),
		("providers.rerank.timeout_ms", cfg.providers.rerank.timeout_ms),
	] {
		if value == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	for (label, value) in [
		("controller.agent_timeout_ms", cfg.controller.agent_timeout_ms),
		("planner.timeout_ms", cfg.planner.timeout_ms),
		("judge.timeout_ms", cfg.judge.timeout_ms),
		("synthesis.timeout_ms", cfg.synthesis.timeout_ms),
	] {
		if value >= request {
			return Err(Error::Validation {
				message: format!("{label} must be less than pipeline.request_timeout_ms."),
			});
		}
	}

	Ok(())
}

fn validate_aggregator(cfg: &Config) -> Result<()> {
	let agg = &cfg.aggregator;

	if !matches!(agg.normalization.as_str(), "min_max" | "rank") {
		return Err(Error::Validation {
			message: "aggregator.normalization must be one of min_max or rank.".to_string(),
		});
	}
	if !agg.dedup_similarity.is_finite() || !(0.0..=1.0).contains(&agg.dedup_similarity) {
		return Err(Error::Validation {
			message: "aggregator.dedup_similarity must be in the range 0.0-1.0.".to_string(),
		});
	}
	if agg.top_k == 0 {
		return Err(Error::Validation {
			message: "aggregator.top_k must be greater than zero.".to_string(),
		});
	}
	if !matches!(agg.author_bias.as_str(), "off" | "soft" | "strong") {
		return Err(Error::Validation {
			message: "aggregator.author_bias must be one of off, soft, or strong.".to_string(),
		});
	}
	if !agg.author_boost.is_finite() || agg.author_boost < 1.0 {
		return Err(Error::Validation {
			message: "aggregator.author_boost must be a finite number of at least 1.0.".to_string(),
		});
	}
	if !agg.author_score_floor.is_finite() || agg.author_score_floor < 0.0 {
		return Err(Error::Validation {
			message: "aggregator.author_score_floor must be zero or greater.".to_string(),
		});
	}
	if !agg.min_top_score.is_finite() {
		return Err(Error::Validation {
			message: "aggregator.min_top_score must be a finite number.".to_string(),
		});
	}

	Ok(())
}

fn validate_graph(cfg: &Config) -> Result<()> {
	if !cfg.graph.enabled {
		return Ok(());
	}
	if cfg.graph.max_depth == 0 || cfg.graph.max_depth > 2 {
		return Err(Error::Validation {
			message: "graph.max_depth must be in the range 1-2.".to_string(),
		});
	}
	if cfg.graph.max_nodes == 0 {
		return Err(Error::Validation {
			message: "graph.max_nodes must be greater than zero.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.graph.min_contradiction_confidence) {
		return Err(Error::Validation {
			message: "graph.min_contradiction_confidence must be in the range 0.0-1.0."
				.to_string(),
		});
	}
	if cfg.providers.graph.is_none() {
		return Err(Error::Validation {
			message: "providers.graph must be configured when graph.enabled is true.".to_string(),
		});
	}

	Ok(())
}

fn validate_judge(cfg: &Config) -> Result<()> {
	let judge = &cfg.judge;

	if judge.top_n == 0 {
		return Err(Error::Validation {
			message: "judge.top_n must be greater than zero.".to_string(),
		});
	}
	if judge.contradiction_severity == 0 {
		return Err(Error::Validation {
			message: "judge.contradiction_severity must be greater than zero.".to_string(),
		});
	}

	for (label, value) in [
		("judge.contradiction_penalty_per_claim", judge.contradiction_penalty_per_claim),
		("judge.contradiction_penalty_max", judge.contradiction_penalty_max),
		("judge.contradiction_confidence_cap", judge.contradiction_confidence_cap),
		("judge.relation_boost_per_relation", judge.relation_boost_per_relation),
		("judge.relation_boost_max", judge.relation_boost_max),
		("judge.support_boost_per_unit", judge.support_boost_per_unit),
		("judge.relation_conflict_penalty", judge.relation_conflict_penalty),
		("judge.cross_domain_penalty", judge.cross_domain_penalty),
	] {
		if !value.is_finite() || !(0.0..=1.0).contains(&value) {
			return Err(Error::Validation {
				message: format!("{label} must be in the range 0.0-1.0."),
			});
		}
	}

	for [left, right] in &judge.exclusive_domains {
		for domain in [left, right] {
			if !cfg.resolver.domains.contains_key(domain) {
				return Err(Error::Validation {
					message: format!(
						"judge.exclusive_domains references unknown domain {domain:?}."
					),
				});
			}
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	for values in [
		&mut cfg.policy.blocklist,
		&mut cfg.policy.allowlist,
		&mut cfg.policy.source_types_allow,
		&mut cfg.policy.source_types_block,
		&mut cfg.policy.domains_allow,
		&mut cfg.policy.domains_block,
		&mut cfg.resolver.fallback_domains,
	] {
		normalize_list(values);
	}

	for rule in &mut cfg.policy.rules {
		rule.action = rule.action.trim().to_lowercase();

		for values in [
			&mut rule.domains,
			&mut rule.source_types,
			&mut rule.sources,
			&mut rule.contains,
			&mut rule.not_contains,
		] {
			normalize_list(values);
		}
	}

	let domains = std::mem::take(&mut cfg.resolver.domains);

	cfg.resolver.domains = domains
		.into_iter()
		.map(|(name, mut domain)| {
			normalize_list(&mut domain.keywords);
			normalize_list(&mut domain.aliases);

			(name.trim().to_lowercase(), domain)
		})
		.collect();

	let synonyms = std::mem::take(&mut cfg.resolver.synonyms);

	cfg.resolver.synonyms = synonyms
		.into_iter()
		.map(|(term, mut values)| {
			normalize_list(&mut values);

			(term.trim().to_lowercase(), values)
		})
		.collect();

	for author in &mut cfg.resolver.authors {
		author.name = author.name.trim().to_string();

		normalize_list(&mut author.aliases);
	}
	for pair in &mut cfg.judge.exclusive_domains {
		for domain in pair.iter_mut() {
			*domain = domain.trim().to_lowercase();
		}
	}
}

fn normalize_list(values: &mut Vec<String>) {
	let raw = std::mem::take(values);

	for value in raw {
		let trimmed = value.trim().to_lowercase();

		if !trimmed.is_empty() && !values.contains(&trimmed) {
			values.push(trimmed);
		}
	}
}
