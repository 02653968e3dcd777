mod cli;

use clap::{Parser, Subcommand};

use cli::build::{cmd_build, BuildArgs};
use cli::layout::{cmd_layout, LayoutArgs};

#[derive(Parser)]
#[command(
    name = "rustsl",
    version,
    about = "Compile annotated Rust kernels into WGSL compute shaders"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile kernels to one .wgsl file each
    Build(BuildArgs),
    /// Print the group/binding table of every System
    Layout(LayoutArgs),
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Build(args) => cmd_build(args),
        Command::Layout(args) => cmd_layout(args),
    }
}
