pub mod build;
pub mod layout;

use std::path::{Path, PathBuf};
use std::process;

use clap::Args;
use rustsl::config::Config;
use tracing_subscriber::EnvFilter;

/// Flags shared by every subcommand that reads sources.
#[derive(Args)]
pub struct InputArgs {
    /// Input .rs files or directories (non-recursive)
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,
    /// Config file (default: rustsl.toml in the input directory or above)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Comma-separated function names never translated
    #[arg(long, value_name = "NAMES")]
    pub exclude: Option<String>,
    /// Largest byte size of one GPU buffer
    #[arg(long, value_name = "BYTES")]
    pub max_buffer_size: Option<u64>,
    /// Verbose logging
    #[arg(long)]
    pub debug: bool,
}

/// Install the log subscriber: `RUST_LOG`, or `debug` with `--debug`.
pub fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("rustsl=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rustsl=warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

fn load_config(path: &Path) -> Config {
    match Config::load(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }
}

/// Resolve the config: an explicit file, else the config file found from
/// the first input, else defaults; then CLI flags on top.
pub fn resolve_config(args: &InputArgs) -> Config {
    let mut config = match &args.config {
        Some(path) => load_config(path),
        None => match Config::find(rustsl::input_root(&args.inputs)) {
            Some(path) => load_config(&path),
            None => Config::default(),
        },
    };
    if let Some(list) = &args.exclude {
        config.set_exclude_list(list);
    }
    if let Some(size) = args.max_buffer_size {
        config.max_buffer_size = size;
    }
    config.debug |= args.debug;
    if let Err(message) = config.check() {
        eprintln!("error: {}", message);
        process::exit(1);
    }
    config
}
