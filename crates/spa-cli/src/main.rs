use std::env;
use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use spa::OscArg;
use spa_host::{Host, HostConfig, ModuleLoader};
use tracing_subscriber::EnvFilter;

const DEFAULT_MODULE: &str = "gain_plugin";
const INPUT_LEVEL: f32 = 0.1;

#[derive(Parser)]
#[command(author, version, about = "Load a spa plugin and drive it with a gain ramp")]
struct Cli {
    /// Path to a plugin module, or a bare module name looked up in the
    /// plugin directory.
    module: Option<PathBuf>,
    /// Host configuration file (JSON).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of blocks to process.
    #[arg(long, default_value_t = 10)]
    blocks: u32,
    /// Override the configured block size.
    #[arg(long)]
    block_size: Option<u32>,
    /// Fail unless every output sample equals input times gain.
    #[arg(long)]
    check: bool,
    /// Save the plugin state to this file after processing.
    #[arg(long)]
    save: Option<PathBuf>,
    /// Print the plugin metadata as JSON and exit.
    #[arg(long)]
    info: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => HostConfig::from_path(path)
            .with_context(|| format!("failed to read host configuration {}", path.display()))?,
        None => HostConfig::default(),
    };
    if let Some(block_size) = cli.block_size {
        config.block_size = block_size;
    }

    let loader = module_loader(&config);
    let module_name = cli
        .module
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MODULE));
    let module = loader
        .load(&module_name)
        .with_context(|| format!("failed to load plugin module {}", module_name.display()))?;
    let mut host = Host::instantiate(module, config).context("failed to instantiate plugin")?;

    if cli.info {
        println!("{}", serde_json::to_string_pretty(host.metadata())?);
        return Ok(host.shutdown()?);
    }

    let worst = run_ramp(&mut host, cli.blocks)?;
    println!(
        "Processed {} blocks of {} frames with {} (max deviation {worst:.6})",
        cli.blocks,
        host.config().block_size,
        host.metadata().unique_name
    );
    if cli.check {
        ensure!(
            worst < 1e-4,
            "output deviates from input times gain by {worst}"
        );
    }
    if host.dropped_messages() > 0 {
        tracing::warn!(dropped = host.dropped_messages(), "control messages were dropped");
    }

    if let Some(path) = &cli.save {
        let saved = host
            .save(path)
            .with_context(|| format!("failed to save plugin state to {}", path.display()))?;
        ensure!(saved, "plugin did not save its state to {}", path.display());
        println!("Saved plugin state to {}", path.display());
    }

    host.shutdown()?;
    Ok(())
}

fn module_loader(config: &HostConfig) -> ModuleLoader {
    let mut loader = ModuleLoader::new();
    if let Some(dir) = config.plugin_dir() {
        loader = loader.with_search_dir(dir);
    }
    // Modules built alongside this binary.
    if let Some(dir) = env::current_exe().ok().and_then(|exe| exe.parent().map(PathBuf::from)) {
        loader = loader.with_search_dir(dir);
    }
    loader
}

/// Sends gains 0.0, 0.1, ... 0.9 (repeating), one per block, over a constant
/// input. Returns the largest difference between output and expected output.
fn run_ramp(host: &mut Host, blocks: u32) -> Result<f32> {
    let frames = host.config().block_size as usize;
    let input = vec![INPUT_LEVEL; frames];
    let mut worst = 0.0f32;

    for block in 0..blocks {
        let gain = (block % 10) as f32 / 10.0;
        host.send("/gain", &[OscArg::Float(gain)])
            .with_context(|| format!("failed to send gain for block {block}"))?;
        let (left, right) = host
            .run_block(&input, &input)
            .with_context(|| format!("plugin failed in block {block}"))?;
        let expected = INPUT_LEVEL * gain;
        let deviation = left
            .iter()
            .chain(right)
            .map(|sample| (sample - expected).abs())
            .fold(0.0f32, f32::max);
        tracing::debug!(block, gain, deviation, "processed block");
        worst = worst.max(deviation);
    }
    Ok(worst)
}
