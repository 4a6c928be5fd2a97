use std::fmt;

use serde::{Serialize, Serializer};

use crate::evidence::{AgentKind, RetrievalStatus};

/// Observability tags carried from every stage into the final response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureTag {
	NoDomain,
	PolicyBlocked,
	Agent { kind: AgentKind, status: RetrievalStatus },
	CrossDomainConflict,
	NoResults,
	AuthorGap,
	SynthesisTimeout,
	SynthesisError,
	LowResultCount,
	LowTopScore,
}
impl FailureTag {
	/// Returns `None` for [`RetrievalStatus::Ok`], which never produces a tag.
	pub fn for_agent(kind: AgentKind, status: RetrievalStatus) -> Option<Self> {
		match status {
			RetrievalStatus::Ok => None,
			status => Some(Self::Agent { kind, status }),
		}
	}
}
impl fmt::Display for FailureTag {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::NoDomain => f.write_str("no_domain"),
			Self::PolicyBlocked => f.write_str("policy_blocked"),
			Self::Agent { kind, status } => write!(f, "{}_{}", kind.as_str(), status.as_str()),
			Self::CrossDomainConflict => f.write_str("cross_domain_conflict"),
			Self::NoResults => f.write_str("no_results"),
			Self::AuthorGap => f.write_str("author_gap"),
			Self::SynthesisTimeout => f.write_str("synthesis_timeout"),
			Self::SynthesisError => f.write_str("synthesis_error"),
			Self::LowResultCount => f.write_str("low_result_count"),
			Self::LowTopScore => f.write_str("low_top_score"),
		}
	}
}
impl Serialize for FailureTag {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.collect_str(self)
	}
}

/// Request-scoped accumulator. Keeps first-insertion order and drops repeats.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TagSet {
	tags: Vec<FailureTag>,
}
impl TagSet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, tag: FailureTag) -> bool {
		if self.tags.contains(&tag) {
			return false;
		}

		self.tags.push(tag);

		true
	}

	pub fn extend(&mut self, other: TagSet) {
		for tag in other.tags {
			self.insert(tag);
		}
	}

	pub fn contains(&self, tag: FailureTag) -> bool {
		self.tags.contains(&tag)
	}

	pub fn is_empty(&self) -> bool {
		self.tags.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &FailureTag> {
		self.tags.iter()
	}

	pub fn to_strings(&self) -> Vec<String> {
		self.tags.iter().map(ToString::to_string).collect()
	}
}
