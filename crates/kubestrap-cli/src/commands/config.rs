//! Config command - print the resolved configuration

use std::path::Path;

use kubestrap_core::DeploymentConfig;

use crate::error::Result;
use crate::logging;

pub fn run(config_path: Option<&Path>, set_values: &[String], debug: bool) -> Result<()> {
    let config = DeploymentConfig::load(config_path, set_values)?;
    logging::init(&config.logging, debug);
    tracing::debug!(file = ?config_path, "configuration resolved");

    print!("{}", config.to_yaml()?);
    Ok(())
}
