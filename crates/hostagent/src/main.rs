//! Textcast Host
//!
//! Runs a layout of PTY windows and accepts send-text requests for them
//! over QUIC. Shells started by the host can reach it with `textcast`
//! without any flags.

mod broadcast;
mod cert;
mod config;
mod control;
mod dispatch;
mod keys;
mod pty;
mod quic_server;
mod registry;
mod resolver;
mod windows;

use anyhow::{Context, Result};
use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use textcast_core::transport::fingerprint;
use textcast_core::{AuthToken, ConnectInfo};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::cert::CertStore;
use crate::config::{default_config_path, HostConfig};
use crate::control::HostLoop;
use crate::quic_server::QuicServer;
use crate::windows::PtyRegistry;

/// Textcast Host - send text to many terminals at once
#[derive(Parser, Debug)]
#[command(name = "textcast-host")]
#[command(author = "Textcast Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Host for textcast broadcast input", long_about = None)]
struct Args {
    /// Bind address for QUIC server
    #[arg(short, long, default_value = "127.0.0.1:8443")]
    bind: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize rustls CryptoProvider with ring backend (required for rustls 0.23+)
    let _ = rustls::crypto::ring::default_provider().install_default();

    let args = Args::parse();

    setup_logging(&args.log_level)?;

    info!("Starting Textcast Host v{}", env!("CARGO_PKG_VERSION"));

    let config_path = args.config.unwrap_or_else(default_config_path);
    let config = HostConfig::load(&config_path)?;

    let bind_addr: SocketAddr = args
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address: {}", args.bind))?;

    let (cert, key) = CertStore::new()?.load_or_generate()?;
    let cert_fingerprint = fingerprint(&cert);
    let server = QuicServer::bind(bind_addr, cert, key)?;
    let local_addr = connect_addr(server.local_addr()?);

    let token = AuthToken::generate();
    let connect = ConnectInfo::new(local_addr, cert_fingerprint, token.to_hex());

    let (exited_tx, exited_rx) = mpsc::unbounded_channel();
    let registry = PtyRegistry::spawn(&config, &connect, exited_tx)?;
    let (host, handle) = HostLoop::new(registry, config.session_expiry(), exited_rx);
    info!("Broadcast sessions expire after {:?}", config.session_expiry());

    println!("============================================");
    println!("Address:     {}", connect.addr);
    println!("Fingerprint: {}", connect.fingerprint);
    println!("Token:       {}", connect.token);
    println!("============================================");

    let host_task = tokio::spawn(host.run());
    let server_task = tokio::spawn(async move {
        if let Err(e) = server.serve(token, handle).await {
            error!("Server error: {}", e);
        }
    });

    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .context("Failed to setup SIGTERM handler")?;

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down...");
        }
        result = server_task => {
            result.context("Server task failed")?;
        }
    }

    host_task.abort();
    info!("Shutdown complete");
    Ok(())
}

/// Setup logging with tracing
fn setup_logging(level: &str) -> Result<()> {
    let log_level = level
        .parse::<Level>()
        .unwrap_or(Level::INFO);

    let filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

/// Address local shells should dial; a wildcard bind is reached over loopback
fn connect_addr(bound: SocketAddr) -> SocketAddr {
    match bound.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), bound.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(std::net::Ipv6Addr::LOCALHOST), bound.port())
        }
        _ => bound,
    }
}
