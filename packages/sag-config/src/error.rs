use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Configuration problems are fatal at startup; none of them are raised per request.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Unable to read SAG configuration from {path:?}.")]
	Read { path: PathBuf, source: std::io::Error },
	#[error("SAG configuration at {path:?} is not valid TOML for the expected schema.")]
	Parse { path: PathBuf, source: toml::de::Error },
	#[error("{message}")]
	Validation { message: String },
}
