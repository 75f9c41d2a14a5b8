use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;

pub mod http;

pub use http::HttpTransport;

/// Raw JSON-RPC dispatch. Implementations do no sealing; that happens in the
/// interceptor chain of [`crate::ConfidentialClient`].
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError>;
}

pub type SharedTransport = Arc<dyn RpcTransport>;

#[async_trait]
impl<T: RpcTransport + ?Sized> RpcTransport for Arc<T> {
    async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        (**self).request(method, params).await
    }
}
