//! Stream a URL to stdout through the blocking bridge.
//!
//! Usage: `cargo run --example stream_url -- <url> [config.json]`

use anyhow::{bail, Context};
use fetch_bridge::host::{BlockingBridge, OPEN_FAILED};
use fetch_bridge::ClientConfig;
use std::io::Write;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let url = args.next().context("missing URL argument")?;
    let config = match args.next() {
        Some(path) => {
            let document = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path))?;
            ClientConfig::from_json(&document)?
        }
        None => ClientConfig::default(),
    };

    let bridge = BlockingBridge::new(config)?;
    let handle = bridge.open(url.as_bytes());
    if handle == OPEN_FAILED {
        let error = bridge.error_slot().take();
        bail!("open failed: {:?}", error);
    }

    let mut stdout = std::io::stdout().lock();
    let mut total = 0usize;
    loop {
        let chunk = bridge.read(handle)?;
        if chunk.end_of_stream {
            break;
        }
        total += chunk.len();
        stdout.write_all(&chunk.bytes)?;
    }
    stdout.flush()?;
    bridge.close(handle);

    tracing::info!("Streamed {} bytes from {}", total, url);
    Ok(())
}
