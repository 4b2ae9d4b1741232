pub mod loader;
pub mod registry;
pub mod remote;

pub use loader::{load_model, Model, ModelCheckpoint, ModelFiles, ModelKind, PretrainedModel};
pub use registry::{CachedModel, PretrainedRegistry, PRETRAINED_MODELS};
pub use remote::{Downloader, RemoteFile};
