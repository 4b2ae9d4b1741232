//! Fetch, cache and load pretrained materials graph-network checkpoints.
//!
//! [`RemoteFile`] downloads a remote artifact once into a cache directory and
//! hands out a scoped read handle on the local copy. [`PretrainedRegistry`]
//! maps published model names onto cached model directories, which
//! [`load_model`] turns into [`Model`] trait objects.

pub mod config;
pub mod error;
pub mod model;

pub use config::Config;
pub use error::{Error, Result};
pub use model::{load_model, Downloader, Model, ModelKind, PretrainedRegistry, RemoteFile};
