use clap::Parser;
use screener::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
