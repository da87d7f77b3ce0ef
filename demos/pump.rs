//! Continuous event pump against a live interactive service.
//!
//! Demonstrates:
//! - Connecting with authorization and project headers
//! - Synchronizing with the server clock
//! - Negotiating gzip compression
//! - Handling `giveInput` calls on a background pump
//!
//! Environment:
//!   INTERACTIVE_ADDRESS     WebSocket address (ws:// or wss://)
//!   INTERACTIVE_TOKEN       OAuth token, sent as `Bearer <token>`
//!   INTERACTIVE_VERSION_ID  Project version id
//!
//! Usage:
//!   cargo run --example pump
//!   cargo run --example pump -- --debug
//!   cargo run --example pump -- --no-wait

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use interactive_rpc::{ConnectionOptions, GzipCodec, Session};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    let debug = args.iter().any(|a| a == "--debug");
    let no_wait = args.iter().any(|a| a == "--no-wait");

    let filter = if debug {
        "interactive_rpc=debug"
    } else {
        "interactive_rpc=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    if let Err(e) = run(no_wait).await {
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

async fn run(no_wait: bool) -> Result<()> {
    println!("=== Interactive Pump ===\n");

    // ========================================================================
    // Connect
    // ========================================================================

    let address = env("INTERACTIVE_ADDRESS")?;
    let token = env("INTERACTIVE_TOKEN")?;
    let version_id = env("INTERACTIVE_VERSION_ID")?;

    println!("[1] Connecting to {address}...");

    let options = ConnectionOptions::new()
        .address(address)
        .authorization(format!("Bearer {token}"))
        .project_version_id(version_id)
        .handshake_timeout(Duration::from_secs(10));

    let session = Session::connect(&options).await?;
    println!("    ✓ Connected\n");

    // ========================================================================
    // Clock and Compression
    // ========================================================================

    println!("[2] Synchronizing clock...");
    let offset = session.sync_time().await?;
    println!("    ✓ Offset: {offset}ms\n");

    println!("[3] Negotiating gzip...");
    let accepted = session.set_compression(GzipCodec::default()).await?;
    println!("    ✓ Accepted: {accepted} (codec: {})\n", session.connection().codec_name());

    // ========================================================================
    // Pump
    // ========================================================================

    println!("[4] Pumping events...");

    session.on("giveInput", |call| {
        println!("    giveInput: {}", call.params());
    });
    session.on("onParticipantJoin", |call| {
        println!("    participant joined: {}", call.params());
    });

    session
        .connection()
        .call_discard("ready", serde_json::json!({ "isReady": true }))?;

    let pump = session.pump_async();

    if no_wait {
        println!("[--no-wait] Skipping wait");
    } else {
        println!("Press Ctrl+C to exit...");
        tokio::signal::ctrl_c().await.ok();
    }

    pump.cancel().await;
    session.close().await;

    println!("\n=== Done ===");
    Ok(())
}

/// Reads a required environment variable.
fn env(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{name} is not set"))
}
