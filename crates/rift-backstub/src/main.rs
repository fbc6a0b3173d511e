//! Rift backstub CLI.
//!
//! Usage:
//!   rift-backstub -m ./stubs/hello -m ./stubs/github,https://api.github.com
//!   rift-backstub -c backstub.yaml --port 8080
//!   rift-backstub -P '*,https://api.github.com'

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use rift_backstub::config::{Config, MountConfig, ProxyConfig};
use rift_backstub::{ListenOptions, StubServer};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "rift-backstub",
    about = "Mock backend serving stub files merged with live upstream responses",
    version
)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind (overrides the config file)
    #[arg(long)]
    host: Option<String>,

    /// Stub directory to mount, optionally bound to a service: <dir>[,<service>]
    #[arg(short, long = "mount", value_name = "DIR[,SERVICE]")]
    mounts: Vec<String>,

    /// Pass-through route: <endpoint|*>,<service>
    #[arg(short = 'P', long = "proxy", value_name = "ENDPOINT,SERVICE")]
    proxies: Vec<String>,

    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Mount everything, print the route table and exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.as_str().to_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = build_config(&args)?;

    if config.mounts.is_empty() && config.proxies.is_empty() {
        Args::command().print_help()?;
        println!();
        return Ok(());
    }
    config.check_mount_dirs()?;

    let server = configure(&config)?;

    if args.validate {
        for route in server.registry().routes() {
            println!("{:<6} {}", route.verb.as_str().to_uppercase(), route.path());
        }
        println!("{} routes OK", server.registry().len());
        return Ok(());
    }

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C");
        }
    };
    server
        .listen_with_shutdown(
            ListenOptions::from(config.listen.clone()),
            |addr| info!("rift-backstub listening on http://{}", addr),
            shutdown,
        )
        .await
        .context("server failed")?;
    Ok(())
}

/// Load the config file, then layer CLI flags on top of it.
fn build_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(port) = args.port {
        config.listen.port = port;
    }
    if let Some(host) = &args.host {
        config.listen.host = host.clone();
    }
    config
        .mounts
        .extend(args.mounts.iter().map(|m| MountConfig::parse_cli(m)));
    for proxy in &args.proxies {
        config.proxies.push(ProxyConfig::parse_cli(proxy)?);
    }

    config.validate()?;
    Ok(config)
}

/// Register every mount, then every proxy.
fn configure(config: &Config) -> Result<StubServer> {
    let mut server = StubServer::new(&config.client)?;
    for mount in &config.mounts {
        server
            .mount(&mount.dir, mount.service.as_deref())
            .with_context(|| format!("failed to mount {}", mount.dir.display()))?;
    }
    for proxy in &config.proxies {
        server
            .proxy(&proxy.path, &proxy.service)
            .with_context(|| format!("failed to register proxy {}", proxy.path))?;
    }
    Ok(server)
}
