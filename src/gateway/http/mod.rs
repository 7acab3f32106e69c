//! reqwest-backed implementation of [`ApiGateway`](super::ApiGateway).

mod client;
mod config;

pub use self::client::HttpGateway;
pub use self::config::{DEFAULT_AUTH_SCHEME, HttpGatewayConfig};
