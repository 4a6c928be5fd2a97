use super::*;
use sag_domain::evidence::RetrievalStatus;
use sag_service::query::DEADLINE_ANSWER;
use sag_testkit::evidence;

#[tokio::test]
async fn request_deadline_returns_accumulated_tags() {
	let short_deadline = ("request_timeout_ms = 2000", "request_timeout_ms = 400");
	let cfg = sag_testkit::sample_config_with(&[short_deadline]).expect("Config should load.");
	let agents = Agents {
		vector: Arc::new(FakeAgent::new(AgentKind::Vector).always(Reply::Ok(vec![evidence(
			"v1",
			"Fear is lessened by rehearsing it calmly.",
			0.9,
		)]))),
		..Agents::empty()
	};
	let mut providers = providers(&agents, FakeGenerator::default(), None);

	providers.rerank = Arc::new(WordCountRerank { delay: Some(Duration::from_secs(5)) });

	let started = tokio::time::Instant::now();
	let response = service(cfg, providers)
		.query(request("What helps with fear?"))
		.await
		.expect("Deadline is not a request error.");
	let tags = tags(&response);

	assert!(started.elapsed() < Duration::from_secs(3));
	assert!(response.explain_trace.deadline_exceeded);
	assert_eq!(response.answer, DEADLINE_ANSWER);
	assert_eq!(response.confidence, 0.0);
	assert!(response.provenance.is_empty());
	assert!(tags.contains(&"synthesis_timeout".to_string()), "tags: {tags:?}");
	assert!(tags.contains(&"no_domain".to_string()), "earlier tags must survive: {tags:?}");
	assert!(!response.explain_trace.retrieval.is_empty());
}

#[tokio::test]
async fn queued_calls_share_the_agent_timeout() {
	let cfg = sag_testkit::sample_config_with(&[
		("max_in_flight = 16", "max_in_flight = 1"),
		("request_timeout_ms = 2000", "request_timeout_ms = 1000"),
	])
	.expect("Config should load.");
	let stall = Reply::Sleep(Duration::from_secs(10));
	let agents = Agents {
		vector: Arc::new(FakeAgent::new(AgentKind::Vector).always(Reply::Ok(vec![evidence(
			"v1",
			"Fear is lessened by rehearsing it calmly.",
			0.9,
		)]))),
		lexical: Arc::new(FakeAgent::new(AgentKind::Lexical).always(stall.clone())),
		structured: Arc::new(FakeAgent::new(AgentKind::Structured).always(stall)),
		..Agents::empty()
	};
	let generator = FakeGenerator {
		plan: Some(Reply::Ok(
			"{\"intent\": \"explain\", \
			\"sub_queries\": [\"fear\", \"calm\", \"courage\", \"dread\"]}"
				.to_string(),
		)),
		..Default::default()
	};
	let started = tokio::time::Instant::now();
	let response = service(cfg, providers(&agents, generator, None))
		.query(request("What helps with fear?"))
		.await
		.expect("Query should succeed.");
	let trace = &response.explain_trace;
	let tags = tags(&response);

	assert!(started.elapsed() < Duration::from_millis(900));
	assert!(!trace.deadline_exceeded);
	assert_ne!(response.answer, DEADLINE_ANSWER);
	assert_eq!(trace.retrieval.len(), 12);
	assert_eq!(trace.retrieval[0].status, RetrievalStatus::Ok);
	assert_eq!(response.provenance[0].chunk_id, "v1");

	for tag in ["lexical_timeout", "structured_timeout"] {
		assert!(tags.contains(&tag.to_string()), "missing {tag} in {tags:?}");
	}
}

#[tokio::test]
async fn empty_query_is_rejected() {
	let agents = Agents::empty();
	let service = service(config(), providers(&agents, FakeGenerator::default(), None));
	let err = service.query(request("   ")).await.expect_err("Blank query must be rejected.");

	assert!(matches!(err, Error::InvalidRequest { .. }));
}
