// Copyright 2026 danecert contributors
// SPDX-License-Identifier: Apache-2.0

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use danecert::config::{Config, Paths};
use danecert::issue::issue;
use danecert::keys::AlgorithmProfile;
use danecert::server::{run_server, ServerState};

#[derive(Parser)]
#[command(name = "danecert", version, about = "Self-signed certificate and DANE/TLSA issuance")]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true, default_value = "danecert.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP issuance service
    Serve {
        /// Listen port (overrides the config file)
        #[arg(long)]
        port: Option<u16>,
        /// Root directory for issued artifacts (overrides the config file)
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Issue one certificate and print its TLSA record
    Issue {
        /// Domain to issue for
        domain: String,
        /// IP address to embed in the certificate
        ip: String,
        /// Root directory for issued artifacts (overrides the config file)
        #[arg(long)]
        root: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> danecert::Result<()> {
    let config = Config::load(&cli.config)?;

    match cli.command {
        Command::Serve { port, root } => {
            let port = port.unwrap_or(config.port);
            let paths = Paths::from_env_or(root.unwrap_or(config.root));
            serve(port, paths)
        }
        Command::Issue { domain, ip, root } => {
            let paths = Paths::from_env_or(root.unwrap_or(config.root));
            let issuance = issue(&paths, &AlgorithmProfile::default(), &domain, &ip)?;
            println!("{}", issuance.tlsa);
            Ok(())
        }
    }
}

fn serve(port: u16, paths: Paths) -> danecert::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| danecert::Error::Config(format!("failed to start runtime: {e}")))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let state = Arc::new(ServerState::new(paths));
    runtime.block_on(run_server(addr, state))
}
