use std::collections::BTreeSet;

use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
	/// blake3 hex digest of the normalized text.
	pub hash: String,
	pub tokens: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DedupGroup<T> {
	pub representative: T,
	pub size: usize,
}

/// NFKC, lowercase, punctuation stripped, whitespace collapsed.
pub fn normalize_text(text: &str) -> String {
	let folded: String = text
		.nfkc()
		.flat_map(char::to_lowercase)
		.filter(|ch| ch.is_alphanumeric() || ch.is_whitespace())
		.collect();

	folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn fingerprint(text: &str) -> Fingerprint {
	let normalized = normalize_text(text);
	let hash = blake3::hash(normalized.as_bytes()).to_hex().to_string();
	let tokens =
		normalized.split(' ').filter(|token| !token.is_empty()).map(str::to_string).collect();

	Fingerprint { hash, tokens }
}

pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f32 {
	let union = a.union(b).count();

	if union == 0 {
		return 0.0;
	}

	a.intersection(b).count() as f32 / union as f32
}

pub fn is_near_duplicate(a: &Fingerprint, b: &Fingerprint, threshold: f32) -> bool {
	a.hash == b.hash || jaccard(&a.tokens, &b.tokens) >= threshold
}

/// Groups near-duplicates and keeps the highest-scoring member of each group, the earliest on
/// ties. Groups keep the position of their first member. Merging repeats until no two
/// representatives are near-duplicates, so running the result through again changes nothing.
pub fn dedup<T, F, S>(items: Vec<T>, text_of: F, score_of: S, threshold: f32) -> Vec<DedupGroup<T>>
where
	F: Fn(&T) -> &str,
	S: Fn(&T) -> f32,
{
	let mut groups = Vec::with_capacity(items.len());

	for item in items {
		let fp = fingerprint(text_of(&item));

		let group = DedupGroup { representative: item, size: 1 };

		merge_into(&mut groups, fp, group, &score_of, threshold);
	}

	loop {
		let previous = std::mem::take(&mut groups);
		let before = previous.len();

		for (fp, group) in previous {
			merge_into(&mut groups, fp, group, &score_of, threshold);
		}

		if groups.len() == before {
			break;
		}
	}

	groups.into_iter().map(|(_, group)| group).collect()
}

fn merge_into<T, S>(
	groups: &mut Vec<(Fingerprint, DedupGroup<T>)>,
	fp: Fingerprint,
	group: DedupGroup<T>,
	score_of: &S,
	threshold: f32,
) where
	S: Fn(&T) -> f32,
{
	let Some((existing_fp, existing)) =
		groups.iter_mut().find(|(existing_fp, _)| is_near_duplicate(existing_fp, &fp, threshold))
	else {
		groups.push((fp, group));

		return;
	};

	existing.size += group.size;

	if score_of(&group.representative) > score_of(&existing.representative) {
		existing.representative = group.representative;
		*existing_fp = fp;
	}
}
