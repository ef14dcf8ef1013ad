mod cli;
mod display;
mod error;

use std::path::Path;

use clap::Parser;
use cli::{Cli, RunCommand};
use covid_atlas_core::config::Config;
use error::{CovidAtlasCliError, CovidAtlasCliResult};
use log::debug;

const DEFAULT_LOGGING_LEVEL: &str = "warn";
const APP_DIR: &str = "covid-atlas";

#[tokio::main]
async fn main() -> CovidAtlasCliResult<()> {
    // Set RUST_LOG to `DEFAULT_LOGGING_LEVEL` if not set
    let _ =
        std::env::var("RUST_LOG").map_err(|_| std::env::set_var("RUST_LOG", DEFAULT_LOGGING_LEVEL));
    pretty_env_logger::init_timed();
    let args = Cli::parse();
    debug!("args: {args:?}");
    let config = read_config_from_toml(args.config.as_deref())?;
    debug!("config: {config:?}");

    if let Some(command) = args.command {
        // Return ok if pipe is closed instead of error, otherwise return error
        // See: https://stackoverflow.com/a/65760807, https://github.com/rust-lang/rust/issues/62569
        if let Err(err) = command.run(config).await {
            if let CovidAtlasCliError::IOError(err) = &err {
                if err.kind() == std::io::ErrorKind::BrokenPipe {
                    return Ok(());
                }
            }
            Err(err)?;
        }
    }
    Ok(())
}

/// Read the config from `path`, or from the user config directory when no path is given. Only
/// the implicit file may be absent.
fn read_config_from_toml(path: Option<&Path>) -> CovidAtlasCliResult<Config> {
    // macOS: ~/Library/Application Support/covid-atlas/config.toml
    let file_path = match (path, dirs::config_dir()) {
        (Some(path), _) => path.to_path_buf(),
        (None, Some(config_dir)) => config_dir.join(APP_DIR).join("config.toml"),
        (None, None) => return Ok(Config::default()),
    };
    match std::fs::read_to_string(&file_path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && path.is_none() => {
            Ok(Config::default())
        }
        Err(e) => Err(e.into()),
    }
}
