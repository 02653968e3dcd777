use std::process;

use clap::Args;

use super::{init_tracing, resolve_config, InputArgs};

#[derive(Args)]
pub struct LayoutArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Print the JSON manifest instead of the table
    #[arg(long)]
    pub json: bool,
}

pub fn cmd_layout(args: LayoutArgs) {
    let config = resolve_config(&args.input);
    init_tracing(config.debug);

    if args.json {
        let compiled = match rustsl::read_sources(&args.input.inputs)
            .and_then(|sources| rustsl::compile_sources(sources, &config))
        {
            Ok(c) => c,
            Err(e) => {
                eprintln!("error: {}", e);
                process::exit(1);
            }
        };
        compiled.report.render();
        match compiled.manifest.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("error: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    let (table, report) = match rustsl::layout_table(&args.input.inputs, &config) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };
    report.render();
    print!("{}", table);
    if report.has_errors() {
        process::exit(1);
    }
}
