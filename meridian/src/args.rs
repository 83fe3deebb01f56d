use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Meridian: an OpenAI-compatible Responses API gateway.
#[derive(Debug, Parser)]
#[command(name = "meridian", version)]
pub struct Args {
    /// Path to the Meridian TOML configuration file.
    #[arg(long, short = 'c', env = "MERIDIAN_CONFIG_PATH")]
    pub config: PathBuf,

    /// Socket address to listen on, overriding `server.listen_address` in the config file.
    #[arg(long, env = "MERIDIAN_LISTEN_ADDRESS")]
    pub listen_address: Option<SocketAddr>,

    /// Log filter string, e.g. `info` or `meridian_server=debug,responses=debug`.
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log: String,
}
