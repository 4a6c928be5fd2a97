use super::*;
use sag_testkit::EvidenceBuilder;

const QUERY: &str = "What does Seneca say about fear?";

fn vector_items() -> Vec<EvidenceItem> {
	vec![
		EvidenceBuilder::new("v1", "Fear is the anticipation of pain; naming it weakens it.", 0.9)
			.build(),
		EvidenceBuilder::new("v2", "Worry multiplies when we rehearse misfortunes in advance.", 0.7)
			.build(),
	]
}

#[tokio::test]
async fn off_topic_author_passages_fall_back_to_other_sources() {
	let agents = Agents {
		vector: Arc::new(FakeAgent::new(AgentKind::Vector).always(Reply::Ok(vector_items()))),
		lexical_author: Arc::new(FakeAgent::new(AgentKind::LexicalAuthor).always(Reply::Ok(vec![
			EvidenceBuilder::new("s1", "Seneca wrote about the shortness of life.", 6.0)
				.source("seneca_letters.md")
				.build(),
		]))),
		..Agents::empty()
	};
	let generator = FakeGenerator {
		synthesis: Some(Reply::Ok(
			"{\"answer\": \"Fear loosens its grip once it is named.\", \
			\"provenance\": [\"s1\", \"v1\"]}"
				.to_string(),
		)),
		..Default::default()
	};
	let service = service(config(), providers(&agents, generator, None));
	let response = service.query(request(QUERY)).await.expect("Query should succeed.");
	let tags = tags(&response);

	assert!(tags.contains(&"author_gap".to_string()), "tags: {tags:?}");
	assert!(
		response.answer.starts_with("No direct passages from Seneca"),
		"answer: {}",
		response.answer
	);
	assert!(response.answer.contains("Fear loosens its grip"));
	assert!(!response.provenance.is_empty());
	assert!(response.provenance.iter().all(|p| p.chunk_id != "s1"));
	assert!(response.explain_trace.evidence.iter().all(|e| e.chunk_id != "s1"));
	assert_eq!(response.explain_trace.aggregation.as_ref().map(|a| a.author_items), Some(1));

	let author_calls = agents.lexical_author.seen();

	assert!(!author_calls.is_empty());
	assert!(author_calls.iter().all(|sq| sq.constraints.author.as_deref() == Some("Seneca")));
	assert!(agents.vector.seen().iter().all(|sq| sq.constraints.author.is_none()));
}

#[tokio::test]
async fn on_topic_author_passages_rank_first() {
	let agents = Agents {
		vector: Arc::new(FakeAgent::new(AgentKind::Vector).always(Reply::Ok(vector_items()))),
		lexical_author: Arc::new(FakeAgent::new(AgentKind::LexicalAuthor).always(Reply::Ok(vec![
			EvidenceBuilder::new("s2", "Seneca taught that fear fades when we look at it.", 6.0)
				.author("Seneca")
				.build(),
		]))),
		..Agents::empty()
	};
	let service = service(config(), providers(&agents, FakeGenerator::default(), None));
	let response = service.query(request(QUERY)).await.expect("Query should succeed.");

	assert!(!tags(&response).contains(&"author_gap".to_string()));
	assert!(!response.answer.starts_with("No direct passages"));

	let top = &response.explain_trace.evidence[0];

	assert_eq!(top.chunk_id, "s2");
	assert!(top.author_match);
}
