use std::time::Duration;

use reqwest::Client;

use crate::Result;
use sag_config::ProviderConfig;
use sag_domain::graph::{self, Subgraph};

/// Reads a bounded projection around `seed_ids`. The store is never written to.
pub async fn subgraph(
	cfg: &ProviderConfig,
	seed_ids: &[String],
	max_depth: u32,
	max_nodes: u32,
) -> Result<Subgraph> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"seed_ids": seed_ids,
		"max_depth": max_depth.min(graph::MAX_PROJECTION_DEPTH),
		"max_nodes": max_nodes,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let bytes = res.error_for_status()?.bytes().await?;
	let raw: Subgraph = serde_json::from_slice(&bytes)?;

	// Stores may over-return; re-project locally so the bounds always hold.
	Ok(graph::project(&raw, seed_ids, max_depth, max_nodes as usize))
}
