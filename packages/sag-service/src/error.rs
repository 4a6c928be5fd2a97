pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
}
impl From<sag_providers::Error> for Error {
	fn from(err: sag_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

/// Failure of one retrieval call. Timeouts stay distinguishable from other failures.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
	#[error("Agent timed out.")]
	Timeout,
	#[error("Agent failed: {message}")]
	Failed { message: String },
}
impl From<sag_providers::Error> for AgentError {
	fn from(err: sag_providers::Error) -> Self {
		if err.is_timeout() { Self::Timeout } else { Self::Failed { message: err.to_string() } }
	}
}
