#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Model not found: {0}")]
	ModelNotFound(String),

	#[error("Failed to load model: {0}")]
	ModelLoadFailed(String),

	#[error("Invalid input: {0}")]
	InvalidInput(String),

	/// Unreachable host, timeout or a non-success HTTP status.
	#[error("Network error: {0}")]
	Network(String),

	#[error("Configuration error: {0}")]
	ConfigError(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),

	#[error("Serialization error: {0}")]
	SerializationError(String),
}

impl From<reqwest::Error> for Error {
	fn from(err: reqwest::Error) -> Self {
		Error::Network(err.to_string())
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Error::SerializationError(err.to_string())
	}
}

impl From<toml::de::Error> for Error {
	fn from(err: toml::de::Error) -> Self {
		Error::SerializationError(err.to_string())
	}
}

pub type Result<T> = std::result::Result<T, Error>;
