use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::loader::{
    ensure_safetensors, Model, ModelFiles, PretrainedModel, CHECKPOINT_FILE, STATE_FILE,
    TORCH_STATE_FILE,
};
use crate::model::Downloader;
use candle_core::Device;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Models published in the upstream `pretrained_models` directory.
pub const PRETRAINED_MODELS: &[&str] = &[
    "CHGNet-MPtrj-2023.12.1-2.7M-PES",
    "CHGNet-MPtrj-2024.2.13-11M-PES",
    "M3GNet-MP-2018.6.1-Eform",
    "M3GNet-MP-2021.2.8-DIRECT-PES",
    "M3GNet-MP-2021.2.8-PES",
    "M3GNet-MatPES-PBE-v2025.1-PES",
    "MEGNet-MP-2018.6.1-Eform",
    "MEGNet-MP-2019.4.1-BandGap-mfi",
    "TensorNet-MatPES-PBE-v2025.1-PES",
    "TensorNet-MatPES-r2SCAN-v2025.1-PES",
];

#[derive(Debug, Clone)]
pub struct CachedModel {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub complete: bool,
}

#[derive(Deserialize)]
struct ListingEntry {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

pub struct PretrainedRegistry {
    config: Config,
    downloader: Downloader,
}

impl PretrainedRegistry {
    pub fn new(config: Config) -> Result<Self> {
        let downloader = Downloader::new(&config)?;
        Ok(Self { config, downloader })
    }

    pub fn with_downloader(config: Config, downloader: Downloader) -> Self {
        Self { config, downloader }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Built-in catalog plus configured extras, sorted. Never touches the network.
    pub fn list_available_names(&self) -> Vec<String> {
        let names: BTreeSet<&str> = PRETRAINED_MODELS
            .iter()
            .copied()
            .chain(self.config.extra_models.iter().map(String::as_str))
            .collect();
        names.into_iter().map(str::to_string).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        PRETRAINED_MODELS.contains(&name) || self.config.extra_models.iter().any(|m| m == name)
    }

    /// Directory names from the remote listing.
    pub fn fetch_remote_names(&self) -> Result<Vec<String>> {
        tracing::info!("Fetching model listing from {}", self.config.listing_url);

        let response = self
            .downloader
            .client()
            .get(&self.config.listing_url)
            .header("Accept", "application/json")
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Network(format!(
                "Listing {} failed: HTTP {}",
                self.config.listing_url, status
            )));
        }

        let body = response.text()?;
        let entries: Vec<ListingEntry> = serde_json::from_str(&body)?;

        let mut names: Vec<String> = entries
            .into_iter()
            .filter(|e| e.kind == "dir")
            .map(|e| e.name)
            .collect();
        names.sort();
        Ok(names)
    }

    /// Makes sure the model's files are in the cache, downloading what is missing.
    pub fn resolve(&self, name: &str) -> Result<ModelFiles> {
        if !self.contains(name) {
            return Err(Error::ModelNotFound(name.to_string()));
        }

        let dir = self.config.model_dir(name);
        let forced = self.downloader.is_forced();
        if !forced && ModelFiles::is_complete(&dir) {
            tracing::debug!("Model '{}' found in cache at {:?}", name, dir);
        } else {
            tracing::info!("Pulling model '{}' into {:?}", name, self.config.cache_dir);

            self.downloader
                .fetch(&self.config.model_url(name, CHECKPOINT_FILE), &self.config.cache_dir)?;
            // A freshly fetched state.pt replaces any converted copy in ensure_safetensors.
            if forced || !dir.join(STATE_FILE).is_file() {
                self.downloader
                    .fetch(&self.config.model_url(name, TORCH_STATE_FILE), &self.config.cache_dir)?;
            }
        }

        ensure_safetensors(&dir)?;
        Ok(ModelFiles::in_dir(dir))
    }

    pub fn load_by_name(&self, name: &str, device: &Device) -> Result<Box<dyn Model>> {
        let files = self.resolve(name)?;
        let model = PretrainedModel::load(name, &files, device)?;
        Ok(Box::new(model))
    }

    pub fn list_cached(&self) -> Result<Vec<CachedModel>> {
        let cache_dir = &self.config.cache_dir;
        if !cache_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut models = Vec::new();
        for entry in fs::read_dir(cache_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            let modified = entry.metadata()?.modified().ok().map(DateTime::<Utc>::from);

            models.push(CachedModel {
                size: dir_size(&path)?,
                complete: ModelFiles::is_complete(&path),
                name,
                path,
                modified,
            });
        }

        models.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(models)
    }

    /// Removes the whole cache directory.
    pub fn clear_cache(&self) -> Result<()> {
        match fs::remove_dir_all(&self.config.cache_dir) {
            Ok(()) => {
                tracing::info!("Removed cache at {:?}", self.config.cache_dir);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn dir_size(path: &Path) -> Result<u64> {
    let mut total = 0u64;
    let mut stack = vec![path.to_path_buf()];

    while let Some(current) = stack.pop() {
        for entry in fs::read_dir(&current)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if metadata.is_dir() {
                stack.push(entry.path());
            } else {
                total += metadata.len();
            }
        }
    }

    Ok(total)
}
