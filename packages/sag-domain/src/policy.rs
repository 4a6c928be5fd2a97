use std::borrow::Cow;

use serde::Serialize;
use time::{Duration, OffsetDateTime};

use sag_config::{Policy, PolicyRule};

use crate::evidence::{EvidenceItem, PolicyOverrides};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyAction {
	Allow,
	Block,
}
impl PolicyAction {
	/// Config validation guarantees `allow` or `block`; anything else blocks.
	pub fn from_config(raw: &str) -> Self {
		match raw {
			"allow" => Self::Allow,
			_ => Self::Block,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
	TextBlocklist,
	TextAllowlist,
	SourceTypeBlocked,
	SourceTypeNotAllowed,
	DomainBlocked,
	DomainNotAllowed,
	Rule { index: usize },
	Stale,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyVerdict {
	Allow,
	Block(BlockReason),
}

/// The configured policy with request overrides appended, lowercased like configured entries.
pub fn with_overrides<'a>(policy: &'a Policy, overrides: &PolicyOverrides) -> Cow<'a, Policy> {
	if overrides.is_empty() {
		return Cow::Borrowed(policy);
	}

	let mut merged = policy.clone();

	append(&mut merged.allowlist, &overrides.allowlist);
	append(&mut merged.blocklist, &overrides.blocklist);
	append(&mut merged.source_types_allow, &overrides.source_types_allow);
	append(&mut merged.source_types_block, &overrides.source_types_block);
	append(&mut merged.domains_allow, &overrides.domains_allow);
	append(&mut merged.domains_block, &overrides.domains_block);

	Cow::Owned(merged)
}

/// Lists are checked first, then rules in configured order. The first matching rule decides
/// and the default is allow.
pub fn evaluate(item: &EvidenceItem, policy: &Policy) -> PolicyVerdict {
	let text = item.text.to_lowercase();
	let source_type = item.source_type().to_lowercase();
	let domain = item.domain().to_lowercase();
	let source = item.source_id.to_lowercase();

	if policy.blocklist.iter().any(|term| text.contains(term.as_str())) {
		return PolicyVerdict::Block(BlockReason::TextBlocklist);
	}
	if !policy.allowlist.is_empty()
		&& !policy.allowlist.iter().any(|term| text.contains(term.as_str()))
	{
		return PolicyVerdict::Block(BlockReason::TextAllowlist);
	}
	if policy.source_types_block.contains(&source_type) {
		return PolicyVerdict::Block(BlockReason::SourceTypeBlocked);
	}
	if !policy.source_types_allow.is_empty() && !policy.source_types_allow.contains(&source_type) {
		return PolicyVerdict::Block(BlockReason::SourceTypeNotAllowed);
	}
	if policy.domains_block.contains(&domain) {
		return PolicyVerdict::Block(BlockReason::DomainBlocked);
	}
	if !policy.domains_allow.is_empty() && !policy.domains_allow.contains(&domain) {
		return PolicyVerdict::Block(BlockReason::DomainNotAllowed);
	}

	for (index, rule) in policy.rules.iter().enumerate() {
		if !rule_matches(rule, &text, &source_type, &domain, &source) {
			continue;
		}

		return match PolicyAction::from_config(&rule.action) {
			PolicyAction::Allow => PolicyVerdict::Allow,
			PolicyAction::Block => PolicyVerdict::Block(BlockReason::Rule { index }),
		};
	}

	PolicyVerdict::Allow
}

/// Every populated condition must hold. `contains` needs any term, `not_contains` needs none.
pub fn rule_matches(
	rule: &PolicyRule,
	text: &str,
	source_type: &str,
	domain: &str,
	source: &str,
) -> bool {
	if !rule.domains.is_empty() && !rule.domains.iter().any(|value| value == domain) {
		return false;
	}
	if !rule.source_types.is_empty() && !rule.source_types.iter().any(|value| value == source_type)
	{
		return false;
	}
	if !rule.sources.is_empty() && !rule.sources.iter().any(|value| source.contains(value.as_str()))
	{
		return false;
	}
	if !rule.contains.is_empty() && !rule.contains.iter().any(|term| text.contains(term.as_str())) {
		return false;
	}
	if rule.not_contains.iter().any(|term| text.contains(term.as_str())) {
		return false;
	}

	true
}

fn append(target: &mut Vec<String>, extra: &[String]) {
	for value in extra {
		let value = value.trim().to_lowercase();

		if !value.is_empty() && !target.contains(&value) {
			target.push(value);
		}
	}
}

/// Items without a timestamp are kept, as is everything when the window reaches past the
/// earliest representable date.
pub fn is_fresh(item: &EvidenceItem, freshness_days: Option<u32>, now: OffsetDateTime) -> bool {
	let (Some(days), Some(timestamp)) = (freshness_days, item.metadata.timestamp) else {
		return true;
	};
	let Some(cutoff) = now.checked_sub(Duration::days(i64::from(days))) else {
		return true;
	};

	timestamp >= cutoff
}
