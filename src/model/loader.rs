use crate::error::{Error, Result};
use crate::model::PretrainedRegistry;
use candle_core::{pickle, Device, Tensor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const CHECKPOINT_FILE: &str = "model.json";
pub const STATE_FILE: &str = "state.safetensors";
pub const TORCH_STATE_FILE: &str = "state.pt";

/// Serialized description of a pretrained model (`model.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCheckpoint {
    #[serde(rename = "@class")]
    pub class: String,
    #[serde(rename = "@module", default)]
    pub module: Option<String>,
    #[serde(rename = "@model_version", default)]
    pub model_version: Option<u64>,
    #[serde(default)]
    pub metadata: Option<Value>,
    /// Constructor arguments of the model.
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    M3GNet,
    MEGNet,
    CHGNet,
    TensorNet,
    SO3Net,
    Potential,
}

impl FromStr for ModelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "M3GNet" => Ok(ModelKind::M3GNet),
            "MEGNet" => Ok(ModelKind::MEGNet),
            "CHGNet" => Ok(ModelKind::CHGNet),
            "TensorNet" => Ok(ModelKind::TensorNet),
            "SO3Net" => Ok(ModelKind::SO3Net),
            "Potential" => Ok(ModelKind::Potential),
            other => Err(Error::ModelLoadFailed(format!("Unknown model class: {}", other))),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelKind::M3GNet => "M3GNet",
            ModelKind::MEGNet => "MEGNet",
            ModelKind::CHGNet => "CHGNet",
            ModelKind::TensorNet => "TensorNet",
            ModelKind::SO3Net => "SO3Net",
            ModelKind::Potential => "Potential",
        };
        f.write_str(name)
    }
}

/// Anything loadable as a pretrained model.
pub trait Model: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn kind(&self) -> ModelKind;

    fn model_version(&self) -> Option<u64>;

    fn init_args(&self) -> &Map<String, Value>;

    fn metadata(&self) -> Option<&Value>;

    /// Named parameter tensors, sorted by name.
    fn parameters(&self) -> Vec<(&str, &Tensor)>;

    fn num_parameters(&self) -> usize {
        self.parameters()
            .iter()
            .map(|(_, tensor)| tensor.elem_count())
            .sum()
    }
}

/// Locations of the files making up one model directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub dir: PathBuf,
    pub checkpoint: PathBuf,
    pub state: PathBuf,
}

impl ModelFiles {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            checkpoint: dir.join(CHECKPOINT_FILE),
            state: dir.join(STATE_FILE),
            dir,
        }
    }

    /// A checkpoint plus either state format.
    pub fn is_complete(dir: &Path) -> bool {
        dir.join(CHECKPOINT_FILE).is_file()
            && (dir.join(STATE_FILE).is_file() || dir.join(TORCH_STATE_FILE).is_file())
    }
}

#[derive(Debug)]
pub struct PretrainedModel {
    name: String,
    kind: ModelKind,
    checkpoint: ModelCheckpoint,
    parameters: BTreeMap<String, Tensor>,
    device: Device,
}

impl PretrainedModel {
    pub fn load(name: &str, files: &ModelFiles, device: &Device) -> Result<Self> {
        tracing::info!("Loading model from: {:?}", files.dir);

        let content = std::fs::read_to_string(&files.checkpoint).map_err(|e| {
            Error::ModelLoadFailed(format!("Failed to read {:?}: {}", files.checkpoint, e))
        })?;
        let checkpoint: ModelCheckpoint = serde_json::from_str(&content)
            .map_err(|e| Error::ModelLoadFailed(format!("Failed to parse checkpoint: {}", e)))?;

        let kind: ModelKind = checkpoint.class.parse()?;
        if checkpoint.model_version.is_none() {
            tracing::warn!("Checkpoint for '{}' carries no @model_version", name);
        }

        ensure_safetensors(&files.dir)?;

        let tensors = candle_core::safetensors::load(&files.state, device)
            .map_err(|e| Error::ModelLoadFailed(format!("Failed to load parameters: {}", e)))?;
        let parameters: BTreeMap<String, Tensor> = tensors.into_iter().collect();

        tracing::info!("Model loaded successfully");
        tracing::info!("  Class: {}", kind);
        tracing::info!("  Parameter tensors: {}", parameters.len());

        Ok(Self {
            name: name.to_string(),
            kind,
            checkpoint,
            parameters,
            device: device.clone(),
        })
    }

    pub fn checkpoint(&self) -> &ModelCheckpoint {
        &self.checkpoint
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}

impl Model for PretrainedModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ModelKind {
        self.kind
    }

    fn model_version(&self) -> Option<u64> {
        self.checkpoint.model_version
    }

    fn init_args(&self) -> &Map<String, Value> {
        &self.checkpoint.kwargs
    }

    fn metadata(&self) -> Option<&Value> {
        self.checkpoint.metadata.as_ref()
    }

    fn parameters(&self) -> Vec<(&str, &Tensor)> {
        self.parameters
            .iter()
            .map(|(name, tensor)| (name.as_str(), tensor))
            .collect()
    }
}

/// Loads a model from a local directory, or by registry name when `path_or_name`
/// is not a directory.
pub fn load_model(
    path_or_name: &str,
    registry: &PretrainedRegistry,
    device: &Device,
) -> Result<Box<dyn Model>> {
    let path = Path::new(path_or_name);
    if !path.is_dir() {
        return registry.load_by_name(path_or_name, device);
    }

    if !ModelFiles::is_complete(path) {
        return Err(Error::ModelLoadFailed(format!(
            "{:?} does not contain {} and a parameter state file",
            path, CHECKPOINT_FILE
        )));
    }

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path_or_name);
    let model = PretrainedModel::load(name, &ModelFiles::in_dir(path), device)?;
    Ok(Box::new(model))
}

/// Converts `state.pt` into `state.safetensors`, replacing any earlier
/// conversion. The PyTorch file is removed afterwards, also when it cannot be
/// read, so a bad download is fetched again on the next resolve.
pub fn ensure_safetensors(model_dir: &Path) -> Result<()> {
    let pytorch_file = model_dir.join(TORCH_STATE_FILE);
    let safetensors_file = model_dir.join(STATE_FILE);

    if !pytorch_file.exists() {
        return Ok(());
    }

    tracing::info!("Converting {} to {}...", TORCH_STATE_FILE, STATE_FILE);

    let converted = convert_torch_state(&pytorch_file, &safetensors_file);

    if let Err(e) = std::fs::remove_file(&pytorch_file) {
        tracing::warn!("Could not remove {}: {}", TORCH_STATE_FILE, e);
    } else {
        tracing::debug!("Removed {:?}", pytorch_file);
    }

    converted
}

fn convert_torch_state(pytorch_file: &Path, safetensors_file: &Path) -> Result<()> {
    let tensors_vec = pickle::read_all(pytorch_file)
        .map_err(|e| Error::ModelLoadFailed(format!("Failed to read PyTorch file: {}", e)))?;

    tracing::info!("Loading {} tensors from PyTorch state", tensors_vec.len());

    let tensors: HashMap<_, _> = tensors_vec.into_iter().collect();

    let dir = safetensors_file
        .parent()
        .ok_or_else(|| Error::InvalidInput(format!("Invalid state path: {:?}", safetensors_file)))?;
    let partial = tempfile::Builder::new()
        .prefix(".state-")
        .suffix(".safetensors")
        .tempfile_in(dir)?;

    candle_core::safetensors::save(&tensors, partial.path())
        .map_err(|e| Error::ModelLoadFailed(format!("Failed to save SafeTensors: {}", e)))?;
    partial
        .persist(safetensors_file)
        .map_err(|e| Error::IoError(e.error))?;

    Ok(())
}
