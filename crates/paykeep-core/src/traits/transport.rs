use async_trait::async_trait;

use crate::errors::TransportError;
use crate::models::{HttpRequest, HttpResponse};

/// Sends a request over the network.
///
/// Any HTTP response, whatever its status, is `Ok`. `Err` is reserved for
/// requests that produced no response (connection failure, timeout) or
/// could not be built.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}
