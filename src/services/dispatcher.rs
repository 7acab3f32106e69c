use std::time::Duration;

use dashmap::DashMap;
use futures::future::join_all;
use serde_json::{Map, Value};
use tokio::time::timeout;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    actions::{Command, CommandPlan},
    config::ClientConfig,
    dto::GameStatus,
    error::{BulkReport, DispatchError},
    gateway::{
        ApiRequest, GatewayError, Page, SharedGateway, fetch_page, pagination::page_number,
    },
    services::{
        notifications::NotificationHub,
        undo::{UndoBuffer, UndoEntry, UndoSnapshot},
    },
    state::{
        Action, EntityId, EntityKind, EntityRef, Field, ListMode, ListUpdate, OperationId,
        ResetScope, SharedStore,
    },
};

const DEFAULT_NOTIFICATION_CAPACITY: usize = 32;
const DEFAULT_PAGE_SIZE: u32 = 20;

/// Whether a failed operation raises its own notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reporting {
    PerOperation,
    /// Part of a bulk action reported as a whole.
    Batched,
}

/// Drives the optimistic protocol: apply, call the API, then confirm or roll back.
pub struct Dispatcher {
    store: SharedStore,
    gateway: SharedGateway,
    notifications: NotificationHub,
    undo: UndoBuffer,
    in_flight: DashMap<OperationId, &'static str>,
    operation_timeout: Option<Duration>,
    page_size: u32,
}

impl Dispatcher {
    /// Dispatcher with default limits and no operation timeout.
    pub fn new(store: SharedStore, gateway: SharedGateway) -> Self {
        Self {
            store,
            gateway,
            notifications: NotificationHub::new(DEFAULT_NOTIFICATION_CAPACITY),
            undo: UndoBuffer::new(),
            in_flight: DashMap::new(),
            operation_timeout: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Dispatcher using the limits of `config`.
    pub fn from_config(store: SharedStore, gateway: SharedGateway, config: &ClientConfig) -> Self {
        Self {
            notifications: NotificationHub::new(config.notification_capacity),
            operation_timeout: config.operation_timeout,
            page_size: config.page_size,
            ..Self::new(store, gateway)
        }
    }

    /// Roll back operations whose request takes longer than `limit`.
    pub fn with_operation_timeout(mut self, limit: Option<Duration>) -> Self {
        self.operation_timeout = limit;
        self
    }

    /// Store the dispatcher writes to.
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Hub carrying failure notifications.
    pub fn notifications(&self) -> &NotificationHub {
        &self.notifications
    }

    /// Number of operations waiting for the API.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Run one command optimistically. Resolves once the operation settled.
    pub async fn execute(&self, command: Command) -> Result<OperationId, DispatchError> {
        let plan = {
            let state = self.store.get_state().await;
            command.plan(&state)
        };
        let plan = plan.inspect_err(|err| {
            debug!(command = command.label(), error = %err, "command rejected before dispatch");
        })?;

        let id = Uuid::new_v4();
        self.run(id, &command, plan, Reporting::PerOperation)
            .await
            .map(|()| id)
    }

    /// Set (or with `None`, remove) the library status of several games at once.
    ///
    /// Values are snapshotted for [`Dispatcher::undo`] before anything is applied. Items
    /// that fail are reported and left out of the snapshot.
    pub async fn bulk_set_status(
        &self,
        games: &[EntityId],
        status: Option<GameStatus>,
    ) -> BulkReport {
        let label = if status.is_some() {
            "bulk_set_status"
        } else {
            "bulk_remove_games"
        };
        let mut report = BulkReport::default();
        let mut snapshot = UndoSnapshot::new(label);
        let mut planned = Vec::with_capacity(games.len());

        {
            let state = self.store.get_state().await;
            for game in games {
                let target = EntityRef::game(game.clone());
                let command = match status {
                    Some(status) => Command::SetGameStatus {
                        game: game.clone(),
                        status,
                    },
                    None => Command::RemoveGame { game: game.clone() },
                };
                let Some(previous) = state.field(&target, Field::UserGame).cloned() else {
                    report.record(target.clone(), &Err(DispatchError::MissingEntity(target)));
                    continue;
                };
                match command.plan(&state) {
                    Ok(plan) => {
                        let inverse = Command::restore_user_game(game.clone(), &previous);
                        if let Some(inverse) = inverse {
                            snapshot.push(UndoEntry {
                                target,
                                field: Field::UserGame,
                                previous,
                                inverse,
                            });
                        }
                        planned.push((Uuid::new_v4(), command, plan));
                    }
                    Err(err) => report.record(target, &Err(err)),
                }
            }
        }

        self.run_batch(planned, &mut report).await;
        snapshot.retain(|target| report.succeeded.contains(target));
        debug!(label, entries = snapshot.len(), "undo snapshot captured");
        self.undo.replace(snapshot).await;
        self.notifications.bulk_partial_failure(label, &report);
        report
    }

    /// Revert the latest bulk action by replaying compensating commands as new operations.
    ///
    /// Undo is not itself undoable, and items whose compensation fails stay as they are.
    pub async fn undo(&self) -> Result<BulkReport, DispatchError> {
        let snapshot = self.undo.take().await.ok_or(DispatchError::NothingToUndo)?;
        let mut report = BulkReport::default();
        let mut planned = Vec::with_capacity(snapshot.len());

        {
            let state = self.store.get_state().await;
            for entry in snapshot.entries {
                match entry.inverse.plan(&state) {
                    Ok(plan) => planned.push((Uuid::new_v4(), entry.inverse, plan)),
                    Err(err) => report.record(entry.target, &Err(err)),
                }
            }
        }

        info!(label = %snapshot.label, items = planned.len(), "undoing bulk action");
        self.run_batch(planned, &mut report).await;
        self.notifications.bulk_partial_failure("undo", &report);
        Ok(report)
    }

    /// Fetch the first page of `request` into `list`, replacing its items.
    pub async fn load_list(
        &self,
        kind: EntityKind,
        request: ApiRequest,
        list: &str,
    ) -> Result<usize, DispatchError> {
        self.load_page(kind, request, list, 1).await
    }

    /// Fetch the page after the last one loaded into `list`. `None` once the list is complete.
    pub async fn load_more(
        &self,
        kind: EntityKind,
        request: ApiRequest,
        list: &str,
    ) -> Result<Option<usize>, DispatchError> {
        let next = self
            .store
            .select(|state| {
                state
                    .list(list)
                    .and_then(|entries| entries.next())
                    .and_then(page_number)
            })
            .await;
        match next {
            Some(page) => self.load_page(kind, request, list, page).await.map(Some),
            None => Ok(None),
        }
    }

    /// Fetch one page of `request` into `list`. Page 1 replaces the list, later pages append.
    pub async fn load_page(
        &self,
        kind: EntityKind,
        request: ApiRequest,
        list: &str,
        page: u32,
    ) -> Result<usize, DispatchError> {
        let path = request.path.clone();
        let Page {
            count, next, results, ..
        } = fetch_page::<Value>(&self.gateway, request, page, self.page_size)
            .await
            .inspect_err(|err| debug!(path = %path, page, error = %err, "listing failed"))?;

        let entities: Vec<Map<String, Value>> = results
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(attributes) => Some(attributes),
                _ => None,
            })
            .collect();
        let loaded = entities.len();
        let mode = if page <= 1 {
            ListMode::Replace
        } else {
            ListMode::Append
        };

        self.store
            .dispatch(Action::EntitiesLoaded {
                kind,
                entities,
                list: Some(ListUpdate {
                    key: list.to_string(),
                    mode,
                    count: Some(count),
                    next,
                }),
            })
            .await;
        Ok(loaded)
    }

    /// Fetch a single entity from its detail endpoint.
    pub async fn load_entity(&self, target: &EntityRef) -> Result<(), DispatchError> {
        let path = target.path();
        let body = self.gateway.send(ApiRequest::get(path.as_str())).await?;
        let attributes: Map<String, Value> = serde_json::from_value(body)
            .map_err(|source| GatewayError::Decode { path, source })?;
        self.store
            .dispatch(Action::EntitiesLoaded {
                kind: target.kind,
                entities: vec![attributes],
                list: None,
            })
            .await;
        Ok(())
    }

    /// Evict entities. A full reset (logout) also forgets the undo snapshot.
    pub async fn reset(&self, scope: ResetScope) {
        if scope == ResetScope::All {
            self.undo.clear().await;
        }
        self.store.dispatch(Action::Reset(scope)).await;
    }

    async fn run_batch(
        &self,
        planned: Vec<(OperationId, Command, CommandPlan)>,
        report: &mut BulkReport,
    ) {
        report.operations.extend(planned.iter().map(|(id, ..)| *id));
        let runs = planned.into_iter().map(|(id, command, plan)| async move {
            let result = self.run(id, &command, plan, Reporting::Batched).await;
            (command.target(), result)
        });
        for (target, result) in join_all(runs).await {
            report.record(target, &result);
        }
    }

    async fn run(
        &self,
        id: OperationId,
        command: &Command,
        plan: CommandPlan,
        reporting: Reporting,
    ) -> Result<(), DispatchError> {
        let CommandPlan {
            label,
            patches,
            request,
            reconciler,
        } = plan;

        self.store
            .dispatch(Action::OptimisticApplied {
                id,
                label: label.to_string(),
                patches,
            })
            .await;
        self.in_flight.insert(id, label);
        debug!(operation_id = %id, label, request = %request, "operation applied optimistically");

        let outcome = self.send(request).await;
        self.in_flight.remove(&id);

        match outcome {
            Ok(response) => {
                for action in reconciler.into_actions(id, response) {
                    self.store.dispatch(action).await;
                }
                Ok(())
            }
            Err(err) => {
                self.store.dispatch(Action::RolledBack { id }).await;
                let form_error =
                    command.is_submission() && matches!(err, DispatchError::Validation(_));
                if form_error {
                    debug!(operation_id = %id, label, error = %err, "submission rejected");
                } else if reporting == Reporting::PerOperation {
                    self.notifications
                        .operation_failed(id, label, &command.target(), &err);
                } else {
                    debug!(operation_id = %id, label, error = %err, "bulk item rolled back");
                }
                Err(err)
            }
        }
    }

    async fn send(&self, request: ApiRequest) -> Result<Value, DispatchError> {
        let call = self.gateway.send(request);
        match self.operation_timeout {
            Some(limit) => match timeout(limit, call).await {
                Ok(result) => result.map_err(Into::into),
                Err(_) => Err(DispatchError::Timeout),
            },
            None => call.await.map_err(Into::into),
        }
    }
}
