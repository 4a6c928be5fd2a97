use std::sync::Arc;

use sag_service::SagService;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<SagService>,
}
impl AppState {
	/// Builds HTTP-backed providers from the configuration.
	pub fn new(config: sag_config::Config) -> color_eyre::Result<Self> {
		let service = SagService::new(config)?;

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: SagService) -> Self {
		Self { service: Arc::new(service) }
	}
}
