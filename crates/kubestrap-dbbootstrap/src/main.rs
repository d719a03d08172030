//! Lambda host for the database bootstrap handler

use kubestrap_dbbootstrap::{BootstrapHandler, BootstrapResult, BootstrapSettings};
use lambda_runtime::{Error, LambdaEvent, service_fn};
use serde_json::Value as JsonValue;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_current_span(false)
        .without_time()
        .with_target(false)
        .init();

    let settings = BootstrapSettings::from_env()?;
    let handler = BootstrapHandler::aws(settings).await;
    let handler = &handler;

    lambda_runtime::run(service_fn(move |event: LambdaEvent<JsonValue>| async move {
        let result = handler.handle(&event.payload).await;
        respond(result)
    }))
    .await
}

/// Failed bootstraps are reported to the runtime as invocation errors
fn respond(result: BootstrapResult) -> Result<BootstrapResult, Error> {
    if result.success {
        Ok(result)
    } else {
        Err(result.data.into())
    }
}
