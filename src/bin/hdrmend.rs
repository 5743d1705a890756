//! CLI entry point for hdrmend.

use std::path::PathBuf;

use clap::{CommandFactory, Parser};

/// hdrmend — reconcile an IL2CPP target header against a typed input header.
#[derive(Parser, Debug)]
#[command(name = "hdrmend", version, about)]
struct Cli {
    /// Richly-typed input header (mangled names).
    input: Option<PathBuf>,

    /// Canonically-named target header to rebuild.
    target: Option<PathBuf>,

    /// Sysroot include directory passed to clang.
    sysroot: Option<PathBuf>,

    /// Output file path (defaults to `<target stem>.reconciled.h`).
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("hdrmend=info")),
        )
        .init();

    let cli = Cli::parse();
    let (Some(input), Some(target), Some(sysroot)) = (cli.input, cli.target, cli.sysroot) else {
        let _ = Cli::command().print_help();
        println!();
        return;
    };

    if let Err(err) = hdrmend::run(&input, &target, &sysroot, cli.output.as_deref()) {
        tracing::error!("{err:#}");
        std::process::exit(1);
    }
}
