pub mod aggregator;
pub mod controller;
pub mod graph;
pub mod judge;
pub mod planner;
pub mod query;
pub mod synthesis;

mod error;

pub use error::{AgentError, Error, Result};
pub use query::{ExplainTrace, QueryRequest, QueryResponse};

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use sag_config::{AgentEndpoint, Config, ProviderConfig, StructuredAgent};
use sag_domain::{
	evidence::{AgentKind, EvidenceItem, SubQuery},
	graph::Subgraph,
};
use sag_providers::{
	generation::GenerationClient,
	rerank,
	retrieval::{self, SearchRequest},
	structured,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait RetrievalAgent
where
	Self: Send + Sync,
{
	fn kind(&self) -> AgentKind;

	fn retrieve<'a>(
		&'a self,
		sub_query: &'a SubQuery,
		timeout: Duration,
	) -> BoxFuture<'a, Result<Vec<EvidenceItem>, AgentError>>;
}

pub trait GenerationProvider
where
	Self: Send + Sync,
{
	fn generate<'a>(
		&'a self,
		prompt: &'a str,
		opts: GenerateOptions,
	) -> BoxFuture<'a, Result<String>>;
}

pub trait RerankProvider
where
	Self: Send + Sync,
{
	fn rerank<'a>(&'a self, query: &'a str, docs: &'a [String]) -> BoxFuture<'a, Result<Vec<f32>>>;
}

pub trait GraphStore
where
	Self: Send + Sync,
{
	fn subgraph<'a>(
		&'a self,
		seed_ids: &'a [String],
		max_depth: u32,
	) -> BoxFuture<'a, Result<Subgraph>>;
}

#[derive(Clone, Copy, Debug)]
pub struct GenerateOptions {
	pub max_tokens: u32,
	pub timeout: Duration,
}

#[derive(Clone)]
pub struct Providers {
	pub vector: Arc<dyn RetrievalAgent>,
	pub lexical: Arc<dyn RetrievalAgent>,
	pub structured: Option<Arc<dyn RetrievalAgent>>,
	/// Only called when the query carries an author hint.
	pub lexical_author: Option<Arc<dyn RetrievalAgent>>,
	pub generation: Arc<dyn GenerationProvider>,
	pub rerank: Arc<dyn RerankProvider>,
	pub graph: Option<Arc<dyn GraphStore>>,
}
impl Providers {
	/// HTTP-backed providers built from configuration.
	pub fn from_config(cfg: &Config) -> Result<Self> {
		let lexical = HttpAgent::new(AgentKind::Lexical, &cfg.agents.lexical);
		let structured = cfg.agents.structured.enabled.then(|| {
			Arc::new(StructuredLinesAgent {
				lexical: HttpAgent::new(AgentKind::Structured, &cfg.agents.lexical),
				cfg: cfg.agents.structured.clone(),
			}) as Arc<dyn RetrievalAgent>
		});
		let lexical_author = cfg.agents.author_lexical_enabled.then(|| {
			Arc::new(HttpAgent::new(AgentKind::LexicalAuthor, &cfg.agents.lexical))
				as Arc<dyn RetrievalAgent>
		});
		let graph = cfg
			.providers
			.graph
			.as_ref()
			.filter(|_| cfg.graph.enabled)
			.map(|graph| {
				Arc::new(HttpGraphStore { cfg: graph.clone(), max_nodes: cfg.graph.max_nodes })
					as Arc<dyn GraphStore>
			});

		Ok(Self {
			vector: Arc::new(HttpAgent::new(AgentKind::Vector, &cfg.agents.vector)),
			lexical: Arc::new(lexical),
			structured,
			lexical_author,
			generation: Arc::new(HttpGeneration {
				client: GenerationClient::new(&cfg.providers.generation)?,
			}),
			rerank: Arc::new(HttpRerank { cfg: cfg.providers.rerank.clone() }),
			graph,
		})
	}
}

pub struct SagService {
	pub cfg: Config,
	pub providers: Providers,
}
impl SagService {
	pub fn new(cfg: Config) -> Result<Self> {
		let providers = Providers::from_config(&cfg)?;

		Ok(Self { cfg, providers })
	}

	pub fn with_providers(cfg: Config, providers: Providers) -> Self {
		Self { cfg, providers }
	}
}

struct HttpAgent {
	kind: AgentKind,
	endpoint: AgentEndpoint,
}
impl HttpAgent {
	fn new(kind: AgentKind, endpoint: &AgentEndpoint) -> Self {
		Self { kind, endpoint: endpoint.clone() }
	}

	async fn search(
		&self,
		sub_query: &SubQuery,
		timeout: Duration,
		top_k: u32,
	) -> Result<Vec<EvidenceItem>, AgentError> {
		let constraints = &sub_query.constraints;
		let request = SearchRequest {
			query: &sub_query.text,
			top_k,
			domain: constraints.domain.as_deref(),
			freshness_days: constraints.freshness_days,
			source_types: &constraints.source_types,
			author: constraints.author.as_deref(),
		};

		Ok(retrieval::search(&self.endpoint, self.kind, &request, timeout).await?)
	}
}
impl RetrievalAgent for HttpAgent {
	fn kind(&self) -> AgentKind {
		self.kind
	}

	fn retrieve<'a>(
		&'a self,
		sub_query: &'a SubQuery,
		timeout: Duration,
	) -> BoxFuture<'a, Result<Vec<EvidenceItem>, AgentError>> {
		Box::pin(self.search(sub_query, timeout, self.endpoint.top_k))
	}
}

/// Runs a lexical search and keeps only table-like or key-value lines from the hits.
struct StructuredLinesAgent {
	lexical: HttpAgent,
	cfg: StructuredAgent,
}
impl RetrievalAgent for StructuredLinesAgent {
	fn kind(&self) -> AgentKind {
		AgentKind::Structured
	}

	fn retrieve<'a>(
		&'a self,
		sub_query: &'a SubQuery,
		timeout: Duration,
	) -> BoxFuture<'a, Result<Vec<EvidenceItem>, AgentError>> {
		Box::pin(async move {
			let hits = self.lexical.search(sub_query, timeout, self.cfg.top_k).await?;

			Ok(structured::derive_items(hits, &sub_query.text, &self.cfg))
		})
	}
}

struct HttpGeneration {
	client: GenerationClient,
}
impl GenerationProvider for HttpGeneration {
	fn generate<'a>(
		&'a self,
		prompt: &'a str,
		opts: GenerateOptions,
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move {
			Ok(self.client.generate(prompt, opts.max_tokens, opts.timeout).await?)
		})
	}
}

struct HttpRerank {
	cfg: ProviderConfig,
}
impl RerankProvider for HttpRerank {
	fn rerank<'a>(&'a self, query: &'a str, docs: &'a [String]) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move { Ok(rerank::rerank(&self.cfg, query, docs).await?) })
	}
}

struct HttpGraphStore {
	cfg: ProviderConfig,
	max_nodes: u32,
}
impl GraphStore for HttpGraphStore {
	fn subgraph<'a>(
		&'a self,
		seed_ids: &'a [String],
		max_depth: u32,
	) -> BoxFuture<'a, Result<Subgraph>> {
		Box::pin(async move {
			let subgraph =
				sag_providers::graph::subgraph(&self.cfg, seed_ids, max_depth, self.max_nodes)
					.await?;

			Ok(subgraph)
		})
	}
}
