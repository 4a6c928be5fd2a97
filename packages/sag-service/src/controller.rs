use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::{
	sync::Semaphore,
	task::JoinSet,
	time::{self, Instant},
};

use crate::{AgentError, Providers, RetrievalAgent};
use sag_config::Controller;
use sag_domain::{
	evidence::{AgentKind, RetrievalEnvelope, RetrievalStatus, SubQuery},
	resolver::AuthorHint,
	tags::{FailureTag, TagSet},
};

pub struct FanOut {
	/// Ordered by sub-query, then by agent, regardless of completion order.
	pub envelopes: Vec<RetrievalEnvelope>,
	pub tags: TagSet,
}

/// Agents called for every sub-query, in envelope order.
pub fn agents_for(
	providers: &Providers,
	author: Option<&AuthorHint>,
) -> Vec<Arc<dyn RetrievalAgent>> {
	let mut agents = vec![providers.vector.clone(), providers.lexical.clone()];

	if let Some(structured) = &providers.structured {
		agents.push(structured.clone());
	}
	if author.is_some()
		&& let Some(lexical_author) = &providers.lexical_author
	{
		agents.push(lexical_author.clone());
	}

	agents
}

/// Runs every (sub-query, agent) pair concurrently under a shared in-flight cap. Time spent
/// waiting for a slot counts against the agent timeout, so the whole fan-out finishes within
/// one agent timeout however small the cap is.
pub async fn fan_out(
	cfg: &Controller,
	providers: &Providers,
	sub_queries: &[SubQuery],
	author: Option<&AuthorHint>,
) -> FanOut {
	let agents = agents_for(providers, author);
	let permits = Arc::new(Semaphore::new(cfg.max_in_flight.max(1) as usize));
	let timeout = Duration::from_millis(cfg.agent_timeout_ms);
	let mut tasks = JoinSet::new();
	let mut slots: Vec<Option<RetrievalEnvelope>> = Vec::new();
	let mut task_slots = HashMap::new();

	for sub_query in sub_queries {
		for agent in &agents {
			let slot = slots.len();
			let mut sub_query = sub_query.clone();

			if agent.kind() == AgentKind::LexicalAuthor {
				sub_query.constraints.author = author.map(|hint| hint.name.clone());
			}

			let handle = tasks.spawn(run_one(agent.clone(), sub_query, timeout, permits.clone()));

			task_slots.insert(handle.id(), slot);
			slots.push(None);
		}
	}

	while let Some(joined) = tasks.join_next_with_id().await {
		match joined {
			Ok((id, envelope)) => {
				if let Some(slot) = task_slots.get(&id) {
					slots[*slot] = Some(envelope);
				}
			},
			Err(err) => {
				tracing::error!(error = %err, "Retrieval task did not complete.");
			},
		}
	}

	let mut envelopes = Vec::with_capacity(slots.len());
	let mut tags = TagSet::new();
	let pairs = sub_queries
		.iter()
		.flat_map(|sub_query| agents.iter().map(move |agent| (sub_query, agent)));

	for (slot, (sub_query, agent)) in slots.into_iter().zip(pairs) {
		let envelope = slot.unwrap_or_else(|| {
			RetrievalEnvelope::failed(agent.kind(), &sub_query.id, RetrievalStatus::Error, 0)
		});

		if let Some(tag) = FailureTag::for_agent(envelope.agent_id, envelope.status) {
			tags.insert(tag);
		}

		envelopes.push(envelope);
	}

	FanOut { envelopes, tags }
}

async fn run_one(
	agent: Arc<dyn RetrievalAgent>,
	sub_query: SubQuery,
	timeout: Duration,
	permits: Arc<Semaphore>,
) -> RetrievalEnvelope {
	let kind = agent.kind();
	let started = Instant::now();
	let call = async {
		let _permit = match permits.acquire_owned().await {
			Ok(permit) => permit,
			Err(err) => return Err(AgentError::Failed { message: err.to_string() }),
		};

		agent.retrieve(&sub_query, timeout.saturating_sub(started.elapsed())).await
	};
	let outcome = time::timeout(timeout, call).await;
	let elapsed_ms = started.elapsed().as_millis() as u64;
	let envelope = match outcome {
		Ok(Ok(mut items)) => {
			for item in &mut items {
				item.method = kind;
			}

			RetrievalEnvelope::from_items(kind, &sub_query.id, items, elapsed_ms)
		},
		Ok(Err(AgentError::Timeout)) | Err(_) =>
			RetrievalEnvelope::failed(kind, &sub_query.id, RetrievalStatus::Timeout, elapsed_ms),
		Ok(Err(err)) => {
			tracing::warn!(
				agent = %kind,
				sub_query_id = %sub_query.id,
				error = %err,
				"Retrieval agent failed."
			);

			RetrievalEnvelope::failed(kind, &sub_query.id, RetrievalStatus::Error, elapsed_ms)
		},
	};

	tracing::debug!(
		agent = %kind,
		sub_query_id = %sub_query.id,
		status = envelope.status.as_str(),
		items = envelope.items.len(),
		elapsed_ms,
		"Retrieval call finished."
	);

	envelope
}
