use anyhow::{Context, Result};
use api_client::ApiClient;
use args::{Cli, Command};
use clap::Parser;
use log::LevelFilter;
use runner::Runner;
use settings::{FileSettings, Settings};
use std::process;

mod api_client;
mod args;
mod runner;
mod settings;
#[cfg(test)]
mod test_support;

fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // Help and version output.
        Err(err) if !err.use_stderr() => err.exit(),
        Err(err) => {
            let _ = err.print();
            process::exit(1);
        }
    };
    let Command::ListObjects(list) = &cli.command;

    let file = FileSettings::load(cli.global.config.as_deref())?;
    init_logging(list.debug.or(file.debug).unwrap_or(false));
    if let Some(path) = &file.source {
        log::info!("Using config file: {}", path.display());
    }
    log::info!("listObjects");

    let settings = Settings::resolve(&cli.global, list, file)?;
    let client = ApiClient::new(&settings).context("failed to get s3 client")?;

    Runner::new(client).list_objects(&settings)?;
    Ok(())
}

/// Logs go to stderr; `RUST_LOG` takes precedence over the debug flag.
fn init_logging(debug: bool) {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_module(env!("CARGO_CRATE_NAME"), level)
        .parse_default_env()
        .init();
}
