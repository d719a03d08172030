//! Lambda host for the thumbprint custom resource

use kubestrap_thumbprint::{CustomResourceRequest, ThumbprintHandler, send_response};
use lambda_runtime::{Error, LambdaEvent, service_fn};
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

    let handler = ThumbprintHandler::tls()?;
    let client = reqwest::Client::new();
    let (handler, client) = (&handler, &client);

    lambda_runtime::run(service_fn(move |event: LambdaEvent<CustomResourceRequest>| async move {
        let request = event.payload;
        let response = handler.handle(&request).await;
        send_response(client, &request.response_url, &response).await?;
        Ok::<(), Error>(())
    }))
    .await
}
