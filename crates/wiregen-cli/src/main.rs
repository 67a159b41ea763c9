use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info, warn};
use wiregen_cli::{RunOptions, qr};
use wiregen_core::generate::DEFAULT_BATCH_SIZE;
use wiregen_core::walker::DEFAULT_MAX_ADDRESSES;
use wiregen_types::MeshConfig;

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    #[cfg(distribute)]
    {
        fmt().json().with_env_filter(filter).init();
    }

    #[cfg(not(distribute))]
    {
        fmt().pretty().with_env_filter(filter).init();
    }
}

#[derive(Debug, Parser)]
#[command(name = "wiregen")]
#[command(version = env!("GIT_VERSION"))]
#[command(about = "Generates WireGuard configs for every address of a network")]
struct Args {
    /// Document to load and regenerate, such as mesh.toml (.json and .yml also work)
    #[arg(short = 'f', long)]
    config: Option<PathBuf>,

    /// File to save to; defaults to the loaded document
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Show progress bars while generating
    #[arg(short, long)]
    interactive: bool,

    /// Gzip peer stanzas while processing, trading speed for memory
    #[arg(long)]
    gz: bool,

    /// Number of peers configured concurrently
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Refuse networks larger than this many addresses
    #[arg(long, default_value_t = DEFAULT_MAX_ADDRESSES)]
    max_addresses: u64,

    /// Print the config of this peer id as a QR code after saving
    #[arg(long, value_name = "ID")]
    qr: Option<u64>,
}

fn print_qr(config: &MeshConfig, id: u64) -> Result<(), Box<dyn std::error::Error>> {
    let Some(peer) = config.peers.iter().find(|peer| peer.id == id) else {
        error!(id, "no peer with this id");
        return Err(format!("no peer with id {id}").into());
    };

    match qr::render(&peer.config)? {
        Some(image) => println!("{image}"),
        None => warn!(id, bytes = peer.config.len(), "config too long for a qr code"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();

    let Some(output) = args.output.clone().or_else(|| args.config.clone()) else {
        error!("no output file given; pass -o or -f");
        return Err("no output file given".into());
    };

    info!(
        config = ?args.config,
        output = %output.display(),
        gz = args.gz,
        batch_size = args.batch_size,
        "starting wiregen"
    );

    let opts = RunOptions {
        input: args.config,
        output,
        interactive: args.interactive,
        compress: args.gz,
        batch_size: args.batch_size,
        max_addresses: args.max_addresses,
    };

    let config = match wiregen_cli::run(&opts).await {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "generation failed, output left untouched");
            return Err(e.into());
        }
    };

    if let Some(id) = args.qr {
        print_qr(&config, id)?;
    }
    Ok(())
}
