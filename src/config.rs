//! Command-line configuration surface. No config file: the CLI is the
//! entire configuration surface, matching `main.c`'s `args_t`.
use std::path::PathBuf;

use clap::Parser;

/// Single-process static file server.
///
/// Defaults match the reference implementation: port 8080, a 60 second
/// inactivity timeout, directory browsing enabled, web root `./`.
#[derive(Debug, Parser)]
#[command(name = "webserv", version, about, long_about = None)]
pub struct Args {
    /// TCP port to listen on.
    #[arg(short = 'p', long = "port", default_value_t = 8080)]
    pub port: u16,

    /// Seconds of inactivity before a connection is closed. 0 disables the
    /// check entirely.
    #[arg(short = 't', long = "conn_timeout", default_value_t = 60)]
    pub conn_timeout: u64,

    /// Disable directory listings; unbrowsable directories fall back to
    /// `index.html` or a 403.
    #[arg(short = 'b', long = "no-browse", action = clap::ArgAction::SetFalse)]
    pub browse_enabled: bool,

    /// Filesystem root to serve files from.
    #[arg(default_value = "./")]
    pub web_root_path: PathBuf,
}

impl Args {
    pub fn parse_cli() -> Self {
        Args::parse()
    }
}
