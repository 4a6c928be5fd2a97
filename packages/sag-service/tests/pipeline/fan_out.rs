use std::cell::Cell;

use super::*;
use sag_domain::evidence::RetrievalStatus;
use sag_testkit::evidence;

/// Three sub-queries over four agents: nine single-hit calls, two empty calls, one timeout.
/// Three of the hits duplicate another hit. With `stagger`, hits listed earlier answer later,
/// reversing the natural completion order.
fn agents(stagger: bool) -> Agents {
	let remaining = Cell::new(9_u64);
	let one = |chunk_id: &str, text: &str, score: f32| {
		let items = vec![evidence(chunk_id, text, score)];

		remaining.set(remaining.get() - 1);

		if stagger {
			Reply::Late(Duration::from_millis(15 * (remaining.get() + 1)), items)
		} else {
			Reply::Ok(items)
		}
	};

	Agents {
		vector: Arc::new(
			FakeAgent::new(AgentKind::Vector)
				.reply("sq1", one("a", "Fear is a poor counselor and a worse companion.", 0.9))
				.reply(
					"sq2",
					one("b", "Courage grows from small daily acts of facing discomfort.", 0.8),
				)
				.reply(
					"sq3",
					one("c", "Death is feared mostly by those who have not lived well.", 0.7),
				),
		),
		lexical: Arc::new(
			FakeAgent::new(AgentKind::Lexical)
				.reply("sq1", one("a-dup", "fear is a poor counselor, and a worse companion", 11.0))
				.reply(
					"sq3",
					one("d", "Ancient schools debated whether fear could be useful.", 7.0),
				),
		),
		structured: Arc::new(
			FakeAgent::new(AgentKind::Structured)
				.reply(
					"sq2",
					one("b-dup", "Courage grows from small daily acts of facing discomfort!", 3.0),
				)
				.reply("sq3", one("e", "Remedy: journaling | Emotion: anxiety | Sessions: 3", 2.0)),
		),
		lexical_author: Arc::new(
			FakeAgent::new(AgentKind::LexicalAuthor)
				.reply(
					"sq1",
					one("f", "Seneca held that fear outruns the danger it anticipates.", 8.0),
				)
				.reply("sq2", Reply::Sleep(Duration::from_secs(1)))
				.reply(
					"sq3",
					one("c-dup", "death is feared mostly by those who have not lived well", 4.0),
				),
		),
	}
}

fn plan_reply() -> Reply<String> {
	Reply::Ok(
		"{\"intent\": \"explain\", \
		\"sub_queries\": [\"seneca on fear\", \"stoic courage\", \"fear of death\"]}"
			.to_string(),
	)
}

#[tokio::test]
async fn twelve_calls_collapse_to_six_items() {
	let agents = agents(false);
	let generator = FakeGenerator { plan: Some(plan_reply()), ..Default::default() };
	let service = service(config(), providers(&agents, generator, None));
	let response = service
		.query(request("What does Seneca say about fear?"))
		.await
		.expect("Query should succeed.");
	let trace = &response.explain_trace;
	let tags = tags(&response);

	assert_eq!(trace.retrieval.len(), 12);

	let agent_order =
		[AgentKind::Vector, AgentKind::Lexical, AgentKind::Structured, AgentKind::LexicalAuthor];

	for (index, envelope) in trace.retrieval.iter().enumerate() {
		assert_eq!(envelope.sub_query_id, format!("sq{}", index / 4 + 1));
		assert_eq!(envelope.agent, agent_order[index % 4]);
	}

	let count =
		|status: RetrievalStatus| trace.retrieval.iter().filter(|e| e.status == status).count();

	assert_eq!(count(RetrievalStatus::Ok), 9);
	assert_eq!(count(RetrievalStatus::ZeroHits), 2);
	assert_eq!(count(RetrievalStatus::Timeout), 1);

	let stats = trace.aggregation.as_ref().expect("Aggregation should be traced.");

	assert_eq!(stats.flattened, 9);
	assert_eq!(stats.duplicates_removed, 3);
	assert_eq!(trace.evidence.len(), 6);
	assert_eq!(trace.evidence.iter().filter(|e| e.dedup_group_size == 2).count(), 3);

	for tag in ["lexical_zero_hits", "structured_zero_hits", "lexical_author_timeout"] {
		assert!(tags.contains(&tag.to_string()), "missing {tag} in {tags:?}");
	}

	assert!(!tags.contains(&"author_gap".to_string()));
	assert!(!tags.contains(&"no_results".to_string()));
}

#[tokio::test]
async fn results_do_not_depend_on_completion_order() {
	let run = |stagger: bool| async move {
		let agents = agents(stagger);
		let generator = FakeGenerator { plan: Some(plan_reply()), ..Default::default() };

		service(config(), providers(&agents, generator, None))
			.query(request("What does Seneca say about fear?"))
			.await
			.expect("Query should succeed.")
	};
	let first = run(false).await;
	let second = run(true).await;
	let ids = |response: &sag_service::QueryResponse| {
		response.explain_trace.evidence.iter().map(|e| e.chunk_id.clone()).collect::<Vec<_>>()
	};

	assert_eq!(ids(&first), ids(&second));
	assert_eq!(first.failure_tags, second.failure_tags);
}
