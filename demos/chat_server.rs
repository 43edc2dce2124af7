//! Chat server demo
//!
//! Run with: cargo run --example chat_server [BIND_ADDR] [--notify] [--announce]
//!
//! Examples:
//!   cargo run --example chat_server                    # binds to 0.0.0.0:8081
//!   cargo run --example chat_server localhost          # binds to 127.0.0.1:8081
//!   cargo run --example chat_server 127.0.0.1:9000     # binds to 127.0.0.1:9000
//!
//! Talk to it with netcat:
//!
//!   $ nc localhost 8081
//!   REG @alice
//!   OK
//!   JOIN #general
//!   OK
//!   MSG #general 5
//!   Hello
//!   @alice: Hello

use std::net::SocketAddr;
use std::time::Duration;

use chat_hub::protocol::constants::DEFAULT_PORT;
use chat_hub::{ChatServer, HubConfig, RoutingPolicy, ServerConfig};

/// Parse bind address from command line argument
///
/// Supports formats:
/// - "localhost" -> 127.0.0.1:8081
/// - "localhost:9000" -> 127.0.0.1:9000
/// - "127.0.0.1" -> 127.0.0.1:8081
/// - "0.0.0.0:9000" -> 0.0.0.0:9000
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
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
    eprintln!("Usage: chat_server [BIND_ADDR] [--notify] [--announce]");
    eprintln!();
    eprintln!("  --notify     reply ERR <reason> when a JOIN or MSG cannot be routed");
    eprintln!("  --announce   tell channel members when someone joins");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let bind_addr = match args.iter().find(|a| !a.starts_with("--")) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                print_usage();
                std::process::exit(1);
            }
        },
        None => SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chat_hub=debug".parse()?)
                .add_directive("chat_server=debug".parse()?),
        )
        .init();

    let policy = if args.iter().any(|a| a == "--notify") {
        RoutingPolicy::Notify
    } else {
        RoutingPolicy::Silent
    };
    let hub = HubConfig::default()
        .routing_policy(policy)
        .announce_joins(args.iter().any(|a| a == "--announce"));

    let config = ServerConfig::with_addr(bind_addr)
        .idle_timeout(Duration::from_secs(600))
        .hub(hub);

    println!("Starting chat server on {}", config.bind_addr);

    let server = ChatServer::new(config);
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        println!("\nShutting down...");
    };

    if let Err(e) = server.run_until(shutdown).await {
        eprintln!("Server error: {}", e);
    }

    let stats = server.hub().stats();
    println!(
        "Stats: users={} channels={} routed={} dropped={} deliveries={}",
        stats.users, stats.channels, stats.messages_routed, stats.messages_dropped, stats.deliveries
    );

    Ok(())
}
