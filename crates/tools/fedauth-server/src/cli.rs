use clap::Parser;
use std::path::PathBuf;

/// Serve a page protected by Google Federated Login
#[derive(Debug, Parser)]
#[command(name = "fedauth-server")]
#[command(about = "Serve a page protected by Google Federated Login")]
#[command(version)]
pub struct Args {
    /// Path to the configuration file (TOML)
    #[arg(short, long, value_name = "FILE", env = "FEDAUTH_CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    pub check_config: bool,
}
