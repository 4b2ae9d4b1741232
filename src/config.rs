use crate::error::{Error, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str =
	"https://github.com/materialsvirtuallab/matgl/raw/main/pretrained_models";
pub const DEFAULT_LISTING_URL: &str =
	"https://api.github.com/repos/materialsvirtuallab/matgl/contents/pretrained_models";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	/// Root of the local artifact cache.
	pub cache_dir: PathBuf,
	/// Remote directory holding one sub-directory per pretrained model.
	pub base_url: String,
	/// JSON listing of `base_url` (GitHub contents API format).
	pub listing_url: String,
	/// Overrides the HTTP client's default timeout.
	pub timeout_secs: Option<u64>,
	/// Model names added to the built-in catalog.
	pub extra_models: Vec<String>,
}

impl Config {
	pub fn from_file(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path)?;
		let config: Config = toml::from_str(&content)?;
		Ok(config)
	}

	/// Loads the optional config file, then applies `MATGL_*` environment overrides.
	pub fn from_env() -> Result<Self> {
		let file = std::env::var("MATGL_CONFIG")
			.ok()
			.map(PathBuf::from)
			.or_else(|| ProjectDirs::from("", "", "matgl").map(|d| d.config_dir().join("config.toml")));

		let mut config = match file {
			Some(path) if path.exists() => {
				tracing::debug!("Reading config from {:?}", path);
				Self::from_file(&path)?
			}
			_ => Self::default(),
		};

		config.apply_overrides(|key| std::env::var(key).ok())?;
		Ok(config)
	}

	fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
	where
		F: Fn(&str) -> Option<String>,
	{
		if let Some(dir) = lookup("MATGL_CACHE") {
			self.cache_dir = PathBuf::from(dir);
		}
		if let Some(url) = lookup("MATGL_BASE_URL") {
			self.base_url = url;
		}
		if let Some(url) = lookup("MATGL_LISTING_URL") {
			self.listing_url = url;
		}
		if let Some(secs) = lookup("MATGL_HTTP_TIMEOUT") {
			let secs = secs.trim().parse::<u64>().map_err(|_| {
				Error::ConfigError(format!("MATGL_HTTP_TIMEOUT must be a number of seconds, got '{}'", secs))
			})?;
			self.timeout_secs = Some(secs);
		}
		Ok(())
	}

	pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
		self.cache_dir = cache_dir.into();
		self
	}

	pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
		self.base_url = base_url.into();
		self
	}

	pub fn with_listing_url(mut self, listing_url: impl Into<String>) -> Self {
		self.listing_url = listing_url.into();
		self
	}

	pub fn model_url(&self, name: &str, file: &str) -> String {
		format!("{}/{}/{}", self.base_url.trim_end_matches('/'), name, file)
	}

	pub fn model_dir(&self, name: &str) -> PathBuf {
		self.cache_dir.join(name)
	}
}

impl Default for Config {
	fn default() -> Self {
		let cache_dir = ProjectDirs::from("", "", "matgl")
			.map(|d| d.cache_dir().to_path_buf())
			.unwrap_or_else(|| std::env::temp_dir().join("matgl"));

		Self {
			cache_dir,
			base_url: DEFAULT_BASE_URL.to_string(),
			listing_url: DEFAULT_LISTING_URL.to_string(),
			timeout_secs: None,
			extra_models: Vec::new(),
		}
	}
}
