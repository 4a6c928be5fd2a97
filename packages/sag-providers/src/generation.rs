use std::{
	sync::Arc,
	time::{Duration, SystemTime, UNIX_EPOCH},
};

use reqwest::Client;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::{Error, Result};
use sag_config::LlmProviderConfig;

/// Chat-completions client. Every clone shares one concurrency budget.
#[derive(Clone, Debug)]
pub struct GenerationClient {
	cfg: LlmProviderConfig,
	client: Client,
	permits: Arc<Semaphore>,
}
impl GenerationClient {
	pub fn new(cfg: &LlmProviderConfig) -> Result<Self> {
		let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
		let permits = Arc::new(Semaphore::new(cfg.max_concurrent.max(1) as usize));

		Ok(Self { cfg: cfg.clone(), client, permits })
	}

	/// Up to `max_retries` attempts with exponential backoff. `timeout` bounds each attempt.
	pub async fn generate(
		&self,
		prompt: &str,
		max_tokens: u32,
		timeout: Duration,
	) -> Result<String> {
		let _permit = self.permits.acquire().await.map_err(|_| Error::Closed)?;
		let attempts = self.cfg.max_retries.max(1);
		let mut attempt = 0;

		loop {
			attempt += 1;

			match self.complete(prompt, max_tokens, timeout).await {
				Ok(text) => return Ok(text),
				Err(err) if attempt < attempts && err.is_retryable() => {
					let delay = backoff_delay(self.cfg.retry_base_ms, attempt);

					tracing::warn!(
						error = %err,
						attempt,
						delay_ms = delay.as_millis() as u64,
						"Generation request failed. Retrying."
					);
					tokio::time::sleep(delay).await;
				},
				Err(err) => return Err(err),
			}
		}
	}

	async fn complete(&self, prompt: &str, max_tokens: u32, timeout: Duration) -> Result<String> {
		let url = format!("{}{}", self.cfg.api_base, self.cfg.path);
		let body = serde_json::json!({
			"model": self.cfg.model,
			"temperature": self.cfg.temperature,
			"max_tokens": max_tokens,
			"messages": [{ "role": "user", "content": prompt }],
		});
		let res = self
			.client
			.post(url)
			.headers(crate::auth_headers(&self.cfg.api_key, &self.cfg.default_headers)?)
			.timeout(timeout)
			.json(&body)
			.send()
			.await?;
		let json: Value = res.error_for_status()?.json().await?;

		parse_completion(json)
	}
}

/// `base * 2^(attempt - 1)` plus up to a quarter of `base` of jitter.
pub fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
	let exp = base_ms.saturating_mul(1_u64 << attempt.saturating_sub(1).min(16));
	let nanos = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.subsec_nanos()).unwrap_or(0);
	let jitter = u64::from(nanos) % (base_ms / 4 + 1);

	Duration::from_millis(exp.saturating_add(jitter))
}

fn parse_completion(json: Value) -> Result<String> {
	let choice = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.ok_or_else(|| Error::InvalidResponse {
			message: "Generation response is missing choices.".to_string(),
		})?;
	let content = choice
		.get("message")
		.and_then(|msg| msg.get("content"))
		.or_else(|| choice.get("text"))
		.and_then(|c| c.as_str())
		.ok_or_else(|| Error::InvalidResponse {
			message: "Generation choice is missing text content.".to_string(),
		})?;

	Ok(content.to_string())
}
