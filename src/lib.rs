//! Client-side state layer for a game discovery site: a normalized entity store with typed
//! actions and pure reducers, optimistic updates reconciled against a REST API, and bulk
//! undo.
//!
//! The pieces, leaves first:
//!
//! - [`gateway`]: request models, response classification and the reqwest client.
//! - [`state`]: the [`Store`](state::Store), its actions and reducers.
//! - [`actions`]: typed [`Command`](actions::Command)s planned against a snapshot.
//! - [`services`]: the [`Dispatcher`](services::Dispatcher) running commands, the undo buffer
//!   and notifications.

/// Typed commands and their optimistic plans.
pub mod actions;
/// Client configuration.
pub mod config;
/// API request models and notifications.
pub mod dto;
/// Dispatcher errors and bulk reports.
pub mod error;
/// REST API boundary.
pub mod gateway;
/// Dispatcher, undo buffer and notifications.
pub mod services;
/// Normalized store, actions and reducers.
pub mod state;

pub use config::ClientConfig;
pub use error::{BulkReport, DispatchError};
pub use services::Dispatcher;
pub use state::{SharedStore, Store};
