//! Response delivery to CloudFormation's presigned URL

use crate::error::{Result, ThumbprintError};
use crate::request::CustomResourceResponse;

/// PUT `response` to `response_url`
///
/// The presigned URL is signed without a content type, so none is sent.
pub async fn send_response(
    client: &reqwest::Client,
    response_url: &str,
    response: &CustomResourceResponse,
) -> Result<()> {
    let body = serde_json::to_vec(response).map_err(|e| ThumbprintError::Delivery(e.to_string()))?;

    client
        .put(response_url)
        .header(reqwest::header::CONTENT_TYPE, "")
        .body(body)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| {
            tracing::error!(error = %e, request_id = %response.request_id, "response delivery failed");
            ThumbprintError::Delivery(e.to_string())
        })?;

    tracing::info!(
        status = ?response.status,
        physical_id = %response.physical_resource_id,
        "response delivered"
    );
    Ok(())
}
