use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "notegen")]
#[command(about = "Turn long text into note card images", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP and WebSocket server
    Server(ServerArgs),
    /// Save every image named in a generation results file
    Download(DownloadArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServerArgs {
    /// Address to bind the HTTP server to (overrides server.bind_addr)
    #[arg(long)]
    pub address: Option<SocketAddr>,
}

#[derive(clap::Args, Debug)]
pub struct DownloadArgs {
    /// Results JSON: an images-generated payload or a bare result array
    #[arg(long, short)]
    pub input: PathBuf,

    /// Directory to write images into (created if missing)
    #[arg(long, short, default_value = "downloads")]
    pub output_dir: PathBuf,

    /// Pause between downloads in milliseconds (overrides download.inter_item_delay)
    #[arg(long)]
    pub delay_ms: Option<u64>,
}
