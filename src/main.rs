mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use raito::api;
use raito::config::Config;

fn main() {
    tracing_subscriber::fmt::init();

    let Commands::Serve(args) = Cli::parse().command;
    let config = match args.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };
    let config = match config {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
            eprintln!("failed to start async runtime: {e}");
            std::process::exit(1);
        });
        runtime.block_on(api::run(config))
    }));

    match result {
        Ok(Ok(())) => std::process::exit(0),
        Ok(Err(e)) => {
            eprintln!("raito exited with error: {e}");
            std::process::exit(1);
        }
        Err(_) => {
            eprintln!("raito panicked");
            std::process::exit(2);
        }
    }
}
