use time::OffsetDateTime;

use super::*;
use sag_domain::evidence::{PolicyOverrides, Preferences};
use sag_testkit::EvidenceBuilder;

#[tokio::test]
async fn blocked_evidence_never_reaches_provenance() {
	let items = vec![
		EvidenceBuilder::new("ok1", "Stoic practice treats fear as a judgment we can revise.", 0.9)
			.build(),
		EvidenceBuilder::new("bad1", "This confidential memo covers fear of layoffs.", 0.95)
			.build(),
		EvidenceBuilder::new("bad2", "Draft notes on fear and courage in the stoic tradition.", 0.8)
			.source_type("draft")
			.build(),
		EvidenceBuilder::new("bad3", "Unaudited revenue figures show stoic market fear.", 0.85)
			.domain("finance")
			.build(),
		EvidenceBuilder::new("ok2", "Virtue is the only good, according to the stoic school.", 0.7)
			.build(),
	];
	let agents = Agents {
		vector: Arc::new(FakeAgent::new(AgentKind::Vector).always(Reply::Ok(items))),
		..Agents::empty()
	};
	let generator = FakeGenerator {
		synthesis: Some(Reply::Ok(
			"{\"answer\": \"Fear is a judgment.\", \
			\"provenance\": [\"bad1\", \"bad2\", \"bad3\", \"ok1\"]}"
				.to_string(),
		)),
		..Default::default()
	};
	let response = service(config(), providers(&agents, generator, None))
		.query(request("How do stoic thinkers handle fear?"))
		.await
		.expect("Query should succeed.");
	let ids: Vec<&str> = response.provenance.iter().map(|p| p.chunk_id.as_str()).collect();

	assert_eq!(ids, vec!["ok1"]);
	assert!(tags(&response).contains(&"policy_blocked".to_string()));
	assert!(response.explain_trace.evidence.iter().all(|e| e.chunk_id.starts_with("ok")));
	assert_eq!(response.explain_trace.aggregation.as_ref().map(|a| a.policy_blocked), Some(3));
}

#[tokio::test]
async fn stale_evidence_is_filtered_by_freshness_preference() {
	let now = OffsetDateTime::now_utc();
	let items = vec![
		EvidenceBuilder::new("fresh", "Stoic journaling keeps fear in proportion.", 0.9)
			.timestamp(now - time::Duration::days(3))
			.build(),
		EvidenceBuilder::new("stale", "An old stoic pamphlet about fear and fortune.", 0.9)
			.timestamp(now - time::Duration::days(400))
			.build(),
	];
	let agents = Agents {
		vector: Arc::new(FakeAgent::new(AgentKind::Vector).always(Reply::Ok(items))),
		..Agents::empty()
	};
	let mut req = request("How do stoic thinkers handle fear?");

	req.preferences = Preferences { freshness_days: Some(30), ..Default::default() };

	let response = service(config(), providers(&agents, FakeGenerator::default(), None))
		.query(req)
		.await
		.expect("Query should succeed.");

	assert!(response.provenance.iter().all(|p| p.chunk_id != "stale"));
	assert!(tags(&response).contains(&"policy_blocked".to_string()));
	assert_eq!(response.explain_trace.aggregation.as_ref().map(|a| a.stale), Some(1));
	assert!(agents.vector.seen().iter().all(|sq| sq.constraints.freshness_days == Some(30)));
}

#[tokio::test]
async fn request_overrides_tighten_policy() {
	let items = vec![
		EvidenceBuilder::new("book1", "Stoic letters describe fear as a passing judgment.", 0.9)
			.source_type("book")
			.build(),
		EvidenceBuilder::new("blog1", "A stoic blog post about fear of public speaking.", 0.95)
			.source_type("blog")
			.build(),
		EvidenceBuilder::new("rumor1", "A stoic rumor says fear never troubled Cato.", 0.8)
			.source_type("book")
			.build(),
	];
	let agents = Agents {
		vector: Arc::new(FakeAgent::new(AgentKind::Vector).always(Reply::Ok(items))),
		..Agents::empty()
	};
	let mut req = request("How do stoic thinkers handle fear?");

	req.preferences = Preferences {
		policy: PolicyOverrides {
			blocklist: vec!["Rumor".to_string()],
			source_types_block: vec!["blog".to_string()],
			..Default::default()
		},
		..Default::default()
	};

	let response = service(config(), providers(&agents, FakeGenerator::default(), None))
		.query(req)
		.await
		.expect("Query should succeed.");
	let ids: Vec<&str> = response.provenance.iter().map(|p| p.chunk_id.as_str()).collect();

	assert_eq!(ids, vec!["book1"]);
	assert_eq!(response.explain_trace.aggregation.as_ref().map(|a| a.policy_blocked), Some(2));
	assert!(tags(&response).contains(&"policy_blocked".to_string()));
}

#[tokio::test]
async fn plan_constraints_tighten_policy() {
	let items = vec![
		EvidenceBuilder::new("book1", "Stoic letters describe fear as a passing judgment.", 0.9)
			.source_type("book")
			.build(),
		EvidenceBuilder::new("blog1", "A stoic blog post about fear of public speaking.", 0.95)
			.source_type("blog")
			.build(),
	];
	let agents = Agents {
		vector: Arc::new(FakeAgent::new(AgentKind::Vector).always(Reply::Ok(items))),
		..Agents::empty()
	};
	let generator = FakeGenerator {
		plan: Some(Reply::Ok(
			"{\"sub_queries\": [\"stoic fear\"], \
			\"constraints\": {\"source_types_block\": \"blog\"}}"
				.to_string(),
		)),
		..Default::default()
	};
	let response = service(config(), providers(&agents, generator, None))
		.query(request("How do stoic thinkers handle fear?"))
		.await
		.expect("Query should succeed.");
	let ids: Vec<&str> = response.provenance.iter().map(|p| p.chunk_id.as_str()).collect();
	let plan = response.explain_trace.plan.as_ref().expect("Plan should be traced.");

	assert_eq!(plan.policy.source_types_block, vec!["blog"]);
	assert_eq!(ids, vec!["book1"]);
	assert_eq!(response.explain_trace.aggregation.as_ref().map(|a| a.policy_blocked), Some(1));
}

#[tokio::test]
async fn unbounded_freshness_window_keeps_dated_evidence() {
	let items = vec![
		EvidenceBuilder::new("old", "Seneca wrote that fear outruns danger.", 0.9)
			.timestamp(time::macros::datetime!(1990-06-01 00:00 UTC))
			.build(),
	];
	let agents = Agents {
		vector: Arc::new(FakeAgent::new(AgentKind::Vector).always(Reply::Ok(items))),
		..Agents::empty()
	};
	let mut req = request("How do stoic thinkers handle fear?");

	req.preferences = Preferences { freshness_days: Some(u32::MAX), ..Default::default() };

	let response = service(config(), providers(&agents, FakeGenerator::default(), None))
		.query(req)
		.await
		.expect("Query should succeed.");

	assert_eq!(response.provenance.len(), 1);
	assert_eq!(response.provenance[0].chunk_id, "old");
	assert_eq!(response.explain_trace.aggregation.as_ref().map(|a| a.stale), Some(0));
}
