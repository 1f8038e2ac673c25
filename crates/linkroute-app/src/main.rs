//! Demo entry point.
//!
//! Usage: `linkroute [options.json]`

mod demo;

use std::path::PathBuf;
use std::process::ExitCode;

use linkroute_core::{ConfigError, EngineError, RoutingOptions};
use thiserror::Error;

#[derive(Debug, Error)]
enum AppError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("Failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
}

fn load_options() -> Result<RoutingOptions, AppError> {
    let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        return Ok(RoutingOptions::default());
    };
    let json = std::fs::read_to_string(&path).map_err(|source| AppError::Read {
        path: path.clone(),
        source,
    })?;
    log::info!("Routing options from {}", path.display());
    Ok(RoutingOptions::from_json(&json)?)
}

fn main() -> ExitCode {
    env_logger::init();
    log::info!("Starting linkroute demo");

    match load_options().and_then(demo::run) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", err);
            eprintln!("linkroute: {}", err);
            ExitCode::FAILURE
        }
    }
}
