use clap::Parser;
use techsignal::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
