//! Simple event-feed server example
//!
//! Run with: cargo run --example simple_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example simple_server                    # binds to 0.0.0.0:8443
//!   cargo run --example simple_server localhost          # binds to 127.0.0.1:8443
//!   cargo run --example simple_server 127.0.0.1:9443     # binds to 127.0.0.1:9443
//!
//! The server generates a self-signed certificate for `localhost` and
//! publishes the 1-minute load average once per second. Subscribe with the
//! tail client:
//!
//!   cargo run --example tail_client localhost:8443
//!
//! ## Features
//!
//! - Late-joiner support: subscribers joining mid-feed receive the replay
//!   buffer before live events
//! - Backpressure: slow subscribers skip frames instead of buffering
//!   indefinitely, and are dropped if they never recover

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use eventcast::{EventServer, ServerConfig, TlsSettings};

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:8443
/// - "localhost:9443" -> 127.0.0.1:9443
/// - "127.0.0.1" -> 127.0.0.1:8443
/// - "0.0.0.0:8443" -> 0.0.0.0:8443
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    const DEFAULT_PORT: u16 = 8443;

    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: simple_server [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:8443)");
}

/// Sample the 1-minute load average, if the platform exposes it
async fn sample_load() -> Option<f64> {
    let contents = tokio::fs::read_to_string("/proc/loadavg").await.ok()?;
    contents.split_whitespace().next()?.parse().ok()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let bind_addr = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => "0.0.0.0:8443".parse().unwrap(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("eventcast=debug".parse()?)
                .add_directive("simple_server=debug".parse()?),
        )
        .init();

    let config = ServerConfig {
        bind_addr,
        ..ServerConfig::default()
    };

    let tls = TlsSettings::self_signed(vec!["localhost".to_string()])?;
    let server = Arc::new(EventServer::bind(config, tls).await?);

    println!("Event feed server on {}", server.local_addr()?);
    println!();
    println!("Subscribe with:");
    println!("  cargo run --example tail_client localhost:8443");
    println!();

    // Demo event source: one load-average sample per second. Event
    // generation is the application's job; the library only broadcasts.
    let feed = server.handle();
    let sampler = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        let mut tick = 0u64;
        loop {
            ticker.tick().await;
            let load = sample_load().await.unwrap_or(0.0);
            let elapsed = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            let payload = serde_json::json!({
                "tick": tick,
                "load": load,
                "ts": elapsed,
            })
            .to_string();
            tick += 1;
            if feed.publish(payload.into_bytes()).await.is_err() {
                break;
            }
        }
    });

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                eprintln!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
        }
    }

    sampler.abort();
    Ok(())
}
