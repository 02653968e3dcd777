use std::path::PathBuf;
use std::process;

use clap::Args;

use super::{init_tracing, resolve_config, InputArgs};

#[derive(Args)]
pub struct BuildArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Output directory for .wgsl files (default: shaders)
    #[arg(short, long = "out", value_name = "DIR")]
    pub output: Option<PathBuf>,
    /// Skip in-process naga validation
    #[arg(long)]
    pub no_validate: bool,
    /// External validator command run on each kernel file
    #[arg(long, value_name = "CMD")]
    pub validator: Option<String>,
}

pub fn cmd_build(args: BuildArgs) {
    let BuildArgs {
        input,
        output,
        no_validate,
        validator,
    } = args;
    let mut config = resolve_config(&input);
    init_tracing(config.debug);
    if let Some(out) = output {
        config.output = out;
    }
    if no_validate {
        config.validate = false;
    }
    if validator.is_some() {
        config.validator = validator;
    }

    let report = match rustsl::build(&input.inputs, &config) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };
    report.render();
    for path in &report.written {
        eprintln!("Compiled -> {}", path.display());
    }
    eprintln!("{}", report.summary());
    if report.has_errors() {
        process::exit(1);
    }
}
