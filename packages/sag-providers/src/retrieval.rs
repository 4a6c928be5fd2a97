use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::Result;
use sag_config::AgentEndpoint;
use sag_domain::evidence::{AgentKind, EvidenceItem, EvidenceMetadata};

/// Body posted to a retrieval agent endpoint.
#[derive(Debug, Serialize)]
pub struct SearchRequest<'a> {
	pub query: &'a str,
	pub top_k: u32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub domain: Option<&'a str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub freshness_days: Option<u32>,
	#[serde(skip_serializing_if = "<[String]>::is_empty")]
	pub source_types: &'a [String],
	/// Set for author-restricted lexical searches.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub author: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
	#[serde(alias = "results")]
	hits: Vec<RawHit>,
}

#[derive(Debug, Deserialize)]
struct RawHit {
	#[serde(alias = "source")]
	source_id: String,
	#[serde(alias = "id")]
	chunk_id: String,
	text: String,
	#[serde(alias = "raw_score")]
	score: f32,
	#[serde(default)]
	metadata: EvidenceMetadata,
}

pub async fn search(
	endpoint: &AgentEndpoint,
	method: AgentKind,
	request: &SearchRequest<'_>,
	timeout: Duration,
) -> Result<Vec<EvidenceItem>> {
	let client = Client::builder().timeout(timeout).build()?;
	let url = format!("{}{}", endpoint.api_base, endpoint.path);
	let res = client
		.post(url)
		.headers(crate::auth_headers(&endpoint.api_key, &endpoint.default_headers)?)
		.json(request)
		.send()
		.await?;
	let bytes = res.error_for_status()?.bytes().await?;

	parse_hits(&bytes, method)
}

fn parse_hits(body: &[u8], method: AgentKind) -> Result<Vec<EvidenceItem>> {
	let response: SearchResponse = serde_json::from_slice(body)?;

	Ok(response
		.hits
		.into_iter()
		.map(|hit| EvidenceItem {
			source_id: hit.source_id,
			chunk_id: hit.chunk_id,
			text: hit.text,
			raw_score: hit.score,
			method,
			metadata: hit.metadata,
		})
		.collect())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_hits_with_aliases_and_metadata() {
		let body = br#"{
			"results": [
				{
					"source": "letters.txt",
					"id": "c7",
					"text": "We suffer more in imagination than in reality.",
					"raw_score": 11.5,
					"metadata": {
						"domain": "philosophy",
						"author": "Seneca",
						"timestamp": "2025-03-01T00:00:00Z",
						"offset_start": 120,
						"offset_end": 168
					}
				}
			]
		}"#;
		let items = parse_hits(body, AgentKind::Lexical).expect("parse failed");

		assert_eq!(items.len(), 1);
		assert_eq!(items[0].chunk_id, "c7");
		assert_eq!(items[0].method, AgentKind::Lexical);
		assert_eq!(items[0].domain(), "philosophy");
		assert!(items[0].metadata.timestamp.is_some());
	}

	#[test]
	fn request_omits_empty_filters() {
		let request = SearchRequest {
			query: "fear",
			top_k: 6,
			domain: None,
			freshness_days: None,
			source_types: &[],
			author: None,
		};
		let json = serde_json::to_value(&request).expect("serialize failed");

		assert_eq!(json, serde_json::json!({ "query": "fear", "top_k": 6 }));
	}
}
