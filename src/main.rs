mod cli;

use anyhow::{Context, Result};
use candle_core::Device;
use clap::Parser;
use cli::{Cli, Commands};
use matgl_hub::model::{load_model, Downloader, PretrainedRegistry};
use matgl_hub::{Config, Error};

fn parse_device(device_str: &str) -> matgl_hub::Result<Device> {
    match device_str {
        "cpu" => Ok(Device::Cpu),
        s if s.starts_with("cuda") => {
            let parts: Vec<&str> = s.split(':').collect();
            let ordinal = if parts.len() > 1 {
                parts[1]
                    .parse::<usize>()
                    .map_err(|_| Error::InvalidInput(format!("Invalid CUDA device: {}", s)))?
            } else {
                0
            };
            Device::new_cuda(ordinal).map_err(|e| {
                Error::ConfigError(format!("Failed to initialize CUDA device: {}", e))
            })
        }
        _ => Err(Error::InvalidInput(format!("Unknown device: {}", device_str))),
    }
}

fn format_size(bytes: u64) -> String {
    const MB: f64 = 1024.0 * 1024.0;
    if bytes as f64 >= MB {
        format!("{:.1} MB", bytes as f64 / MB)
    } else {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env().context("Failed to read configuration")?;
    if let Some(cache_dir) = cli.cache_dir {
        config = config.with_cache_dir(cache_dir);
    }

    match cli.command {
        Commands::Fetch { url, force } => {
            let downloader = Downloader::new(&config)?.force_download(force);
            let path = downloader
                .fetch(&url, &config.cache_dir)
                .with_context(|| format!("Failed to fetch {}", url))?;

            println!("{}", path.display());
        }

        Commands::List { remote, cached } => {
            let registry = PretrainedRegistry::new(config)?;

            if cached {
                let models = registry.list_cached()?;
                if models.is_empty() {
                    println!("No models cached in {:?}.", registry.config().cache_dir);
                } else {
                    println!("Cached models:\n");
                    for model in models {
                        let state = if model.complete { "" } else { " (incomplete)" };
                        println!("  {}{}", model.name, state);
                        println!("    Path: {:?}", model.path);
                        println!("    Size: {}", format_size(model.size));
                        if let Some(modified) = model.modified {
                            println!("    Modified: {}", modified.to_rfc3339());
                        }
                        println!();
                    }
                }
            } else {
                let names = if remote {
                    registry
                        .fetch_remote_names()
                        .context("Failed to fetch remote model listing")?
                } else {
                    registry.list_available_names()
                };
                for name in names {
                    println!("{}", name);
                }
            }
        }

        Commands::Load {
            model,
            device,
            force,
        } => {
            let device = parse_device(&device)?;
            let downloader = Downloader::new(&config)?.force_download(force);
            let registry = PretrainedRegistry::with_downloader(config, downloader);

            let loaded = load_model(&model, &registry, &device)
                .with_context(|| format!("Failed to load model '{}'", model))?;

            let output = serde_json::json!({
                "name": loaded.name(),
                "class": loaded.kind().to_string(),
                "model_version": loaded.model_version(),
                "parameter_tensors": loaded.parameters().len(),
                "num_parameters": loaded.num_parameters(),
                "init_args": loaded.init_args(),
            });

            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Commands::ClearCache => {
            let registry = PretrainedRegistry::new(config)?;
            registry.clear_cache()?;
            println!("✓ Cleared {:?}", registry.config().cache_dir);
        }
    }

    Ok(())
}
