//! Thin boundary to the remote REST API.
//!
//! The rest of the crate talks to the API through [`ApiGateway`], which maps a transport-neutral
//! [`ApiRequest`] to parsed JSON or a classified [`GatewayError`]. The reqwest-backed
//! implementation lives in [`http`].

/// Gateway errors and their classification.
pub mod error;
/// reqwest implementation of [`ApiGateway`].
#[cfg(feature = "http-gateway")]
pub mod http;
/// Paginated listings.
pub mod pagination;
/// Transport-neutral request model.
pub mod request;

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

pub use self::error::{BoxError, ErrorKind, FieldErrors, GatewayError, GatewayResult};
pub use self::pagination::{Page, fetch_page, paginate};
pub use self::request::{ApiRequest, FormPart, FormValue, HttpMethod, RequestBody};

/// Abstraction over the transport used to reach the REST API.
///
/// Implementations never retry. A 2xx response resolves to its JSON body (`Value::Null` for an
/// empty body), anything else to a classified error.
pub trait ApiGateway: Send + Sync {
    fn send(&self, request: ApiRequest) -> BoxFuture<'static, GatewayResult<Value>>;
}

/// Gateway shared between dispatchers and tasks.
pub type SharedGateway = Arc<dyn ApiGateway>;

impl<G> ApiGateway for Arc<G>
where
    G: ApiGateway + ?Sized,
{
    fn send(&self, request: ApiRequest) -> BoxFuture<'static, GatewayResult<Value>> {
        (**self).send(request)
    }
}
