use super::*;
use sag_service::synthesis::NO_ANSWER;
use sag_testkit::evidence;

const QUERY: &str = "How do stoic thinkers handle fear?";

fn stoic_items() -> Vec<EvidenceItem> {
	vec![
		evidence("v1", "Stoic thinkers treat fear as a judgment that can be revised.", 0.9),
		evidence("v2", "Epictetus separated what is up to us from what is not.", 0.8),
		evidence("v3", "Marcus Aurelius wrote that the mind colors events in advance.", 0.6),
	]
}

#[tokio::test]
async fn lexical_timeout_still_answers_from_vector_results() {
	let agents = Agents {
		vector: Arc::new(FakeAgent::new(AgentKind::Vector).always(Reply::Ok(stoic_items()))),
		lexical: Arc::new(
			FakeAgent::new(AgentKind::Lexical).always(Reply::Sleep(Duration::from_secs(1))),
		),
		..Agents::empty()
	};
	let service = service(config(), providers(&agents, FakeGenerator::default(), None));
	let response = service.query(request(QUERY)).await.expect("Query should succeed.");
	let tags = tags(&response);

	assert!(tags.contains(&"lexical_timeout".to_string()), "tags: {tags:?}");
	assert!(!tags.contains(&"lexical_error".to_string()));
	assert!(!tags.contains(&"no_domain".to_string()));
	assert!(!response.answer.is_empty());
	assert_ne!(response.answer, NO_ANSWER);
	assert!(!response.provenance.is_empty());
	assert!(response.confidence > 0.0);
	assert!(agents.lexical_author.seen().is_empty(), "author agent runs only with an author hint");
}

#[tokio::test]
async fn agent_errors_and_reported_timeouts_are_tagged_separately() {
	let agents = Agents {
		vector: Arc::new(FakeAgent::new(AgentKind::Vector).always(Reply::Fail)),
		lexical: Arc::new(FakeAgent::new(AgentKind::Lexical).always(Reply::TimedOut)),
		..Agents::empty()
	};
	let service = service(config(), providers(&agents, FakeGenerator::default(), None));
	let response = service.query(request(QUERY)).await.expect("Query should succeed.");
	let tags = tags(&response);

	for tag in ["vector_error", "lexical_timeout", "structured_zero_hits", "no_results"] {
		assert!(tags.contains(&tag.to_string()), "missing {tag} in {tags:?}");
	}

	assert_eq!(response.confidence, 0.0);
	assert_eq!(response.answer, NO_ANSWER);
	assert!(response.provenance.is_empty());
}

#[tokio::test]
async fn failed_synthesis_degrades_confidence() {
	let agents = Agents {
		vector: Arc::new(FakeAgent::new(AgentKind::Vector).always(Reply::Ok(stoic_items()))),
		..Agents::empty()
	};
	let healthy = FakeGenerator {
		synthesis: Some(Reply::Ok(
			"{\"answer\": \"Examine the judgment behind the fear.\"}".to_string(),
		)),
		..Default::default()
	};
	let baseline = service(config(), providers(&agents, healthy, None))
		.query(request(QUERY))
		.await
		.expect("Query should succeed.");
	let failed = service(config(), providers(&agents, FakeGenerator::default(), None))
		.query(request(QUERY))
		.await
		.expect("Query should succeed.");

	assert!(!tags(&baseline).contains(&"synthesis_error".to_string()));
	assert!(tags(&failed).contains(&"synthesis_error".to_string()));
	assert_eq!(
		failed.explain_trace.synthesis.as_deref(),
		Some("synthesis_fallback:synthesis_error")
	);
	assert!(failed.confidence < baseline.confidence);
	assert!(failed.answer.starts_with("Stoic thinkers treat fear as a judgment"));
}

#[tokio::test]
async fn slow_synthesis_is_tagged_as_timeout() {
	let agents = Agents {
		vector: Arc::new(FakeAgent::new(AgentKind::Vector).always(Reply::Ok(stoic_items()))),
		..Agents::empty()
	};
	let generator = FakeGenerator {
		synthesis: Some(Reply::Sleep(Duration::from_secs(1))),
		..Default::default()
	};
	let response = service(config(), providers(&agents, generator, None))
		.query(request(QUERY))
		.await
		.expect("Query should succeed.");

	assert!(tags(&response).contains(&"synthesis_timeout".to_string()));
	assert!(!response.explain_trace.deadline_exceeded);
	assert!(!response.provenance.is_empty());
}
