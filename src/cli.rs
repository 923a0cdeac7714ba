use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mediagrab")]
#[command(about = "Fetch a media URL as mp3 or mp4 over HTTP", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server
    Server(ServerArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServerArgs {
    /// Address to bind to, overriding `server.bind_addr` and `PORT`
    #[arg(long)]
    pub address: Option<SocketAddr>,

    /// Configuration file (defaults to `MEDIAGRAB_CONFIG` or `config/mediagrab.toml`)
    #[arg(long)]
    pub config: Option<PathBuf>,
}
