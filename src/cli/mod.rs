use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mgl")]
#[command(version, about = "Fetch and load pretrained materials graph-network models", long_about = None)]
pub struct Cli {
	/// Cache directory for downloaded models
	#[arg(long, global = true, env = "MATGL_CACHE")]
	pub cache_dir: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Download a remote file into the cache and print its local path
	Fetch {
		/// HTTP(S) URL of the file (e.g., ".../pretrained_models/M3GNet-MP-2021.2.8-PES/model.json")
		url: String,

		/// Download again even if a cached copy exists
		#[arg(long)]
		force: bool,
	},

	/// List pretrained models
	List {
		/// Query the remote model listing instead of the built-in catalog
		#[arg(long, conflicts_with = "cached")]
		remote: bool,

		/// Show models present in the local cache
		#[arg(long)]
		cached: bool,
	},

	/// Load a pretrained model by name or from a local directory
	Load {
		/// Model name or path to a model directory
		model: String,

		/// Device to load parameters on (e.g., "cpu" or "cuda:0")
		#[arg(long, default_value = "cpu")]
		device: String,

		/// Download the model files again
		#[arg(long)]
		force: bool,
	},

	/// Remove all cached models
	ClearCache,
}
