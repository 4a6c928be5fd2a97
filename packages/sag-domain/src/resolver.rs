use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use sag_config::Resolver;

use crate::evidence::Preferences;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorHint {
	pub name: String,
	/// Lowercased name plus configured aliases.
	pub terms: Vec<String>,
}
impl AuthorHint {
	/// Whole-word, case-insensitive match of any hint term inside `text`.
	pub fn matches(&self, text: &str) -> bool {
		mentions_any(text, &self.terms)
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedContext {
	pub expanded_terms: BTreeSet<String>,
	pub domains: BTreeSet<String>,
	pub author_hint: Option<AuthorHint>,
	/// Subject terms of the query, excluding author names. Author passages must mention one of
	/// these to count as on-topic.
	pub topic_terms: BTreeSet<String>,
}

pub fn resolve(query: &str, preferences: &Preferences, cfg: &Resolver) -> ResolvedContext {
	let tokens = tokenize(query);
	let expanded_terms = expand_terms(&tokens, cfg);
	let domains = match preferences.domain.as_deref().map(str::trim) {
		Some(domain) if !domain.is_empty() => BTreeSet::from([domain.to_lowercase()]),
		_ => classify_domains(query, &expanded_terms, cfg),
	};
	let author_hint = detect_author(query, cfg);
	let topic_terms = topic_terms(&tokens, &expanded_terms, author_hint.as_ref(), cfg);

	ResolvedContext { expanded_terms, domains, author_hint, topic_terms }
}

pub fn tokenize(text: &str) -> Vec<String> {
	text.unicode_words().map(str::to_lowercase).collect()
}

/// Adds configured synonyms for every token, in both directions.
pub fn expand_terms(tokens: &[String], cfg: &Resolver) -> BTreeSet<String> {
	let mut out: BTreeSet<String> = tokens.iter().cloned().collect();

	for token in tokens {
		if let Some(synonyms) = cfg.synonyms.get(token) {
			out.extend(synonyms.iter().cloned());
		}

		for (term, synonyms) in &cfg.synonyms {
			if synonyms.iter().any(|synonym| synonym == token) {
				out.insert(term.clone());
			}
		}
	}

	out
}

pub fn domain_hits(
	name: &str,
	domain: &sag_config::DomainConfig,
	padded_query: &str,
	expanded_terms: &BTreeSet<String>,
) -> u32 {
	let mut hits = 0;

	for keyword in &domain.keywords {
		if term_present(keyword, padded_query, expanded_terms) {
			hits += 1;
		}
	}
	for alias in &domain.aliases {
		if term_present(alias, padded_query, expanded_terms) {
			hits += 2;
		}
	}

	if term_present(name, padded_query, expanded_terms) {
		hits += 2;
	}

	hits
}

/// An empty result means unrestricted routing, not a failure.
pub fn classify_domains(
	query: &str,
	expanded_terms: &BTreeSet<String>,
	cfg: &Resolver,
) -> BTreeSet<String> {
	let padded = padded_words(query);

	cfg.domains
		.iter()
		.filter(|(name, domain)| {
			domain_hits(name, domain, &padded, expanded_terms) >= cfg.min_keyword_hits
		})
		.map(|(name, _)| name.clone())
		.collect()
}

pub fn detect_author(query: &str, cfg: &Resolver) -> Option<AuthorHint> {
	let padded = padded_words(query);

	cfg.authors.iter().find_map(|author| {
		let mut terms = vec![author.name.to_lowercase()];

		terms.extend(author.aliases.iter().cloned());

		terms
			.iter()
			.any(|term| contains_phrase(&padded, term))
			.then(|| AuthorHint { name: author.name.clone(), terms })
	})
}

/// Expanded terms known to the resolver vocabulary (domain keywords, aliases, synonyms). When the
/// query has none, every token longer than three characters that is not part of an author name.
pub fn topic_terms(
	tokens: &[String],
	expanded_terms: &BTreeSet<String>,
	author_hint: Option<&AuthorHint>,
	cfg: &Resolver,
) -> BTreeSet<String> {
	let author_words: BTreeSet<String> = author_hint
		.map(|hint| hint.terms.iter().flat_map(|term| tokenize(term)).collect())
		.unwrap_or_default();
	let known = |term: &String| {
		cfg.synonyms.contains_key(term)
			|| cfg.synonyms.values().any(|synonyms| synonyms.contains(term))
			|| cfg
				.domains
				.values()
				.any(|domain| domain.keywords.contains(term) || domain.aliases.contains(term))
	};
	let vocabulary: BTreeSet<String> = expanded_terms
		.iter()
		.filter(|term| known(*term) && !author_words.contains(*term))
		.cloned()
		.collect();

	if !vocabulary.is_empty() {
		return vocabulary;
	}

	tokens
		.iter()
		.filter(|token| token.chars().count() > 3 && !author_words.contains(*token))
		.cloned()
		.collect()
}

/// Whole-word, case-insensitive check for any of `terms` in `text`. Multi-word terms match as
/// phrases.
pub fn mentions_any<'a, I>(text: &str, terms: I) -> bool
where
	I: IntoIterator<Item = &'a String>,
{
	let haystack = padded_words(text);

	terms.into_iter().any(|term| contains_phrase(&haystack, term))
}

fn term_present(term: &str, padded_query: &str, expanded_terms: &BTreeSet<String>) -> bool {
	if expanded_terms.contains(term) {
		return true;
	}

	term.contains(' ') && contains_phrase(padded_query, term)
}

fn padded_words(text: &str) -> String {
	let words = tokenize(text);

	format!(" {} ", words.join(" "))
}

fn contains_phrase(padded: &str, phrase: &str) -> bool {
	let words = tokenize(phrase);

	if words.is_empty() {
		return false;
	}

	padded.contains(&format!(" {} ", words.join(" ")))
}
