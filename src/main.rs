use std::fs::File;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use daemonize::Daemonize;
use log::{LevelFilter, error};
use poe_hatd::{application::Application, cli::Cli, config::Config};
use syslog::{BasicLogger, Facility, Formatter3164};

fn init_log(level: LevelFilter) -> Result<()> {
    syslog::unix(Formatter3164 {
        facility: Facility::LOG_USER,
        hostname: None,
        process: "poe_hatd".into(),
        pid: 0,
    })
    .map_err(|e| anyhow!("{e}"))
    .and_then(|logger| {
        log::set_boxed_logger(Box::new(BasicLogger::new(logger)))
            .map(|_| log::set_max_level(level))
            .map_err(|e| anyhow!("{e}"))
    })
}

fn into_daemon() -> Result<()> {
    File::create("/var/tmp/poe_hatd.log")
        .and_then(|out| Ok((out.try_clone()?, out)))
        .map_err(|e| anyhow!("{e}"))
        .and_then(|(stderr, stdout)| {
            Daemonize::new()
                .stdout(stdout)
                .stderr(stderr)
                .start()
                .map_err(|e| anyhow!("{e}"))
        })
}

// The runtime is built after forking; worker threads do not survive fork().
fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    init_log(level)?;
    if cli.daemonize {
        into_daemon()?;
    }

    let config = Config::load(cli.config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?;

    runtime
        .block_on(async {
            Application::builder()
                .with_config(config)
                .build()?
                .run()
                .await
        })
        .inspect_err(|e| error!("{e:#}"))
}
