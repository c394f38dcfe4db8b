use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use taxsynth::cli::{Cli, execute};

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.trace {
        "info,taxsynth=debug"
    } else {
        "info"
    };
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    std::process::exit(execute(&cli));
}
