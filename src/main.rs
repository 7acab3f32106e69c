//! shelf-sync binary: loads the configuration, warms a store with one listing and logs the
//! result.

use std::{env, sync::Arc};

use anyhow::Context;
use futures::StreamExt;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shelf_sync::{
    ClientConfig, Dispatcher, Store,
    gateway::{
        ApiRequest, SharedGateway,
        http::{HttpGateway, HttpGatewayConfig},
    },
    state::EntityKind,
};

/// Listing fetched when no path is given on the command line.
const DEFAULT_LISTING: &str = "/games";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ClientConfig::load().context("loading configuration")?;
    let gateway: SharedGateway = Arc::new(
        HttpGateway::new(HttpGatewayConfig::from(&config)).context("building API client")?,
    );
    let store = Store::with_settled_history(config.settled_history).shared();
    let dispatcher = Dispatcher::from_config(store.clone(), gateway, &config);

    let mut changes = store.updates();
    tokio::spawn(async move {
        while let Some(change) = changes.next().await {
            match change {
                Ok(change) => info!(version = change.version, action = change.action, "store changed"),
                Err(err) => warn!(error = %err, "store change stream lagged"),
            }
        }
    });

    let listing = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_LISTING.to_string());
    info!(api_url = %config.api_url, listing = %listing, "warming store");

    let loaded = dispatcher
        .load_list(EntityKind::Game, ApiRequest::get(listing.as_str()), &listing)
        .await
        .with_context(|| format!("loading `{listing}`"))?;

    let state = store.get_state().await;
    let total = state.list(&listing).and_then(|list| list.count());
    info!(
        loaded,
        total = ?total,
        entities = state.entity_count(),
        version = state.version(),
        "store warmed"
    );

    Ok(())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,shelf_sync=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
