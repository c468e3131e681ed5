//! gRPC interceptors for cross-cutting concerns

use tonic::{metadata::MetadataValue, Request, Status};
use uuid::Uuid;

use crate::middleware::REQUEST_ID_HEADER;

/// Request ID interceptor
///
/// Keeps the caller's `x-request-id` or generates a new one, so gRPC calls
/// can be correlated the same way as HTTP requests.
pub fn request_id_interceptor(mut req: Request<()>) -> Result<Request<()>, Status> {
    let request_id = req
        .metadata()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let value = MetadataValue::try_from(request_id.as_str())
        .map_err(|_| Status::internal("Failed to parse request ID"))?;
    req.metadata_mut().insert(REQUEST_ID_HEADER, value);

    tracing::debug!(request_id = %request_id, "gRPC request received");

    Ok(req)
}
