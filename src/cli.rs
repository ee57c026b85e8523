use clap::Parser;
use std::path::PathBuf;

/// poe_hatd: daemon for the PoE HAT OLED display and fan relay
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// YAML config file path (searched in standard locations when omitted)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Detach from the terminal and run in the background
    #[arg(short = 'd', long = "daemonize", default_value = "false")]
    pub daemonize: bool,

    /// Log debug messages, including every temperature sample
    #[arg(short = 'v', long = "verbose", default_value = "false")]
    pub verbose: bool,
}
