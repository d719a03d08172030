//! Deploy command - run the provisioning pipeline

use std::path::Path;

use console::style;
use kubestrap_core::DeploymentConfig;
use kubestrap_provision::{Deployment, DeploymentReport, RunContext};

use crate::error::{CliError, Result};
use crate::logging;

pub fn run(config_path: Option<&Path>, set_values: &[String], debug: bool) -> Result<()> {
    let config = DeploymentConfig::load(config_path, set_values)?;
    logging::init(&config.logging, debug);

    println!(
        "{} Deploying {} environment {} to {}",
        style("→").blue().bold(),
        style(config.project_name()).cyan(),
        style(config.environment_name()).cyan(),
        style(config.region()).yellow()
    );

    // steps run strictly one after another
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::internal(format!("cannot start async runtime: {}", e)))?;

    let report = runtime.block_on(async {
        let ctx = RunContext::aws(config).await;
        Deployment::new(ctx).run().await
    })?;
    tracing::debug!(stack_id = %report.stack_id, "deployment finished");

    print_report(&report);
    Ok(())
}

fn print_report(report: &DeploymentReport) {
    let check = style("✓").green().bold();

    println!(
        "{} Account {} in {}",
        check,
        style(&report.account_id).cyan(),
        report.region
    );
    println!(
        "{} Cluster key {} ({})",
        check,
        report.public_key.display(),
        if report.key_reused { "reused" } else { "generated" }
    );
    println!(
        "{} Uploaded {} object(s) to s3://{}",
        check, report.uploaded_objects, report.artifact_bucket
    );
    println!("{} Pushed image {}", check, style(&report.image).cyan());
    println!("{} Wrote secret {}", check, report.secret_id);
    println!();
    println!(
        "{} Stack {} submitted",
        style("Done!").green().bold(),
        style(&report.stack_name).cyan()
    );
    println!("  {}", style(&report.stack_id).dim());
    println!("  Database bootstrap runs when the instance reports it has started.");
}
