use super::*;
use sag_testkit::EvidenceBuilder;

const QUERY: &str = "How do stoic thinkers handle fear?";

/// Word-count rerank scores of 4, 2 and 0 against `QUERY`.
fn items(third_domain: &str) -> Vec<EvidenceItem> {
	vec![
		EvidenceBuilder::new("p1", "Stoic thinkers handle fear by examining the judgment.", 0.9)
			.domain("philosophy")
			.build(),
		EvidenceBuilder::new("p2", "Stoic writers describe fear as a passing passion.", 0.8)
			.domain("philosophy")
			.build(),
		EvidenceBuilder::new("x1", "Quarterly revenue rose on steady customer demand.", 0.7)
			.domain(third_domain)
			.build(),
	]
}

async fn run(
	cfg: Config,
	items: Vec<EvidenceItem>,
	generator: FakeGenerator,
) -> sag_service::QueryResponse {
	let agents = Agents {
		vector: Arc::new(FakeAgent::new(AgentKind::Vector).always(Reply::Ok(items))),
		..Agents::empty()
	};

	service(cfg, providers(&agents, generator, None))
		.query(request(QUERY))
		.await
		.expect("Query should succeed.")
}

#[tokio::test]
async fn exclusive_domains_in_evidence_lower_confidence() {
	let mixed = run(config(), items("finance"), FakeGenerator::default()).await;
	let single = run(config(), items("philosophy"), FakeGenerator::default()).await;
	let single_tags = tags(&single);
	let tags = tags(&mixed);

	assert!(tags.contains(&"cross_domain_conflict".to_string()), "tags: {tags:?}");
	assert!(
		mixed
			.explain_trace
			.judge_notes
			.contains(&"cross_domain_conflict:philosophy+finance".to_string())
	);
	assert!(!single_tags.contains(&"cross_domain_conflict".to_string()));
	assert!(mixed.confidence < single.confidence);
}

#[tokio::test]
async fn thin_evidence_is_tagged() {
	let one = vec![EvidenceBuilder::new("p1", "Stoic thinkers handle fear calmly.", 0.9).build()];
	let response = run(config(), one, FakeGenerator::default()).await;
	let tags = tags(&response);

	assert!(tags.contains(&"low_result_count".to_string()), "tags: {tags:?}");
	assert!(!tags.contains(&"low_top_score".to_string()), "tags: {tags:?}");
}

#[tokio::test]
async fn weak_top_score_is_tagged() {
	let cfg = sag_testkit::sample_config_with(&[("min_top_score = -12.0", "min_top_score = 5.0")])
		.expect("Config should load.");
	let response = run(cfg, items("philosophy"), FakeGenerator::default()).await;
	let tags = tags(&response);

	assert!(tags.contains(&"low_top_score".to_string()), "tags: {tags:?}");
	assert!(!tags.contains(&"low_result_count".to_string()), "tags: {tags:?}");
}

#[tokio::test]
async fn enough_strong_evidence_carries_no_quality_tags() {
	let response = run(config(), items("philosophy"), FakeGenerator::default()).await;
	let tags = tags(&response);

	assert!(!tags.contains(&"low_result_count".to_string()), "tags: {tags:?}");
	assert!(!tags.contains(&"low_top_score".to_string()), "tags: {tags:?}");
}

#[tokio::test]
async fn synthesized_answer_keeps_judge_confidence() {
	let disabled = sag_testkit::sample_config_with(&[(
		"[synthesis]\nenabled = true",
		"[synthesis]\nenabled = false",
	)])
	.expect("Config should load.");
	let judged = run(disabled, items("philosophy"), FakeGenerator::default()).await;
	let generator = FakeGenerator {
		synthesis: Some(Reply::Ok(
			"{\"answer\": \"Stoics examine the judgment behind fear.\", \
			\"provenance\": [\"p1\"], \"confidence\": 0.01}"
				.to_string(),
		)),
		..Default::default()
	};
	let synthesized = run(config(), items("philosophy"), generator).await;
	let tags = tags(&synthesized);

	assert!(judged.confidence > 0.0);
	assert_eq!(synthesized.confidence, judged.confidence);
	assert_eq!(synthesized.answer, "Stoics examine the judgment behind fear.");
	assert!(tags.iter().all(|tag| !tag.starts_with("synthesis_")), "tags: {tags:?}");
}
