//! relay - Interactive chat relay client
//!
//! Connects to a relay server, prints everything the server sends, and
//! forwards each typed line.
//!
//! # Usage
//!
//! ```text
//! relay                  # 127.0.0.1:12345
//! relay 5000             # 127.0.0.1:5000
//! relay chat.local       # chat.local:12345
//! relay chat.local 5000  # chat.local:5000
//! ```
//!
//! Type `/quit` or `/exit` (any case) to leave.

use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use relay_client::{run_client, Endpoint};

// ============================================================================
// CLI Arguments
// ============================================================================

/// relay - chat relay client
#[derive(Parser, Debug)]
#[command(name = "relay", version, about)]
struct Args {
    /// [HOST] [PORT]; a single all-digit argument is a port
    #[arg(value_name = "HOST_OR_PORT")]
    target: Vec<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let endpoint = match Endpoint::from_args(&args.target) {
        Ok(endpoint) => endpoint,
        Err(e) => {
            println!("[ERROR] {e}");
            process::exit(e.exit_code());
        }
    };

    init_logging()?;

    // Reading stdin parks a blocking thread that never finishes on its own,
    // so the runtime is shut down without waiting for it.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let outcome = runtime.block_on(run_client(
        &endpoint,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        tokio::signal::ctrl_c(),
    ));
    runtime.shutdown_background();

    let code = outcome.context("Failed to write to console")?.exit_code();
    if code != 0 {
        process::exit(code);
    }
    Ok(())
}

fn init_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("relay_client=warn".parse()?))
        .init();
    Ok(())
}
