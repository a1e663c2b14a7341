//! In-process command executor.
//!
//! The backend runs as a single tokio task that owns [`BackendState`] and
//! serves requests from an `mpsc` queue, answering each through a
//! `oneshot` channel. Handles are cheap to clone.

mod state;
/// Snapshot persistence.
pub mod store;

use anyhow::Result;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::gateway::{CommandGateway, CommandName, GatewayError};

pub use state::{BackendState, Rejection};
pub use store::{Snapshot, SnapshotStore};

const REQUEST_BUFFER: usize = 16;

struct Request {
    command: CommandName,
    payload: Value,
    reply: oneshot::Sender<Result<Value, GatewayError>>,
}

/// Handle to a running local backend.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    sender: mpsc::Sender<Request>,
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("command", &self.command)
            .finish_non_exhaustive()
    }
}

impl LocalBackend {
    /// Start a backend persisted through `store`, restoring its last snapshot.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(store: SnapshotStore) -> Result<Self> {
        let snapshot = store.load()?;
        let saved_at = snapshot.as_ref().map(Snapshot::saved_at);
        let state = snapshot.map(Snapshot::into_state).unwrap_or_default();
        info!(
            path = %store.path().display(),
            events = state.race_events().len(),
            saved_at = ?saved_at,
            "local backend restored"
        );
        Ok(Self::start(state, Some(store)))
    }

    /// Start a backend that keeps everything in memory.
    ///
    /// Must be called from within a tokio runtime.
    pub fn in_memory() -> Self {
        Self::start(BackendState::default(), None)
    }

    /// Start an in-memory backend seeded with `state`.
    pub fn with_state(state: BackendState) -> Self {
        Self::start(state, None)
    }

    fn start(state: BackendState, store: Option<SnapshotStore>) -> Self {
        let (sender, receiver) = mpsc::channel(REQUEST_BUFFER);
        tokio::spawn(serve(state, store, receiver));
        Self { sender }
    }
}

impl CommandGateway for LocalBackend {
    async fn invoke(&self, command: CommandName, payload: Value) -> Result<Value, GatewayError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(Request {
                command,
                payload,
                reply,
            })
            .await
            .map_err(|_| GatewayError::Unavailable)?;
        response.await.map_err(|_| GatewayError::Unavailable)?
    }
}

async fn serve(
    mut state: BackendState,
    store: Option<SnapshotStore>,
    mut receiver: mpsc::Receiver<Request>,
) {
    while let Some(request) = receiver.recv().await {
        let outcome = handle(&mut state, store.as_ref(), request.command, request.payload);
        if request.reply.send(outcome).is_err() {
            debug!(command = %request.command, "caller went away before the reply");
        }
    }
    debug!("local backend stopped");
}

fn handle(
    state: &mut BackendState,
    store: Option<&SnapshotStore>,
    command: CommandName,
    payload: Value,
) -> Result<Value, GatewayError> {
    if !mutates(command) {
        return state.apply(command, payload);
    }

    let mut next = state.clone();
    let value = next.apply(command, payload)?;
    if let Some(store) = store {
        store.persist(&next).map_err(|err| {
            error!(%command, ?err, "failed to persist backend snapshot");
            GatewayError::Remote {
                command,
                message: format!("failed to persist change: {err:#}"),
            }
        })?;
    }
    *state = next;
    Ok(value)
}

fn mutates(command: CommandName) -> bool {
    !matches!(
        command,
        CommandName::Init | CommandName::FindRaceEventDetails
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{CreateRaceEvent, FindRaceEventDetails, Init, SetPilot};
    use crate::models::RaceEventId;
    use tempfile::tempdir;

    #[tokio::test]
    async fn serves_typed_commands() -> anyhow::Result<()> {
        let backend = LocalBackend::in_memory();
        let event = backend
            .execute(&CreateRaceEvent {
                name: "Finals".to_string(),
            })
            .await?;
        let init = backend.execute(&Init).await?;
        assert_eq!(init.race_events, vec![event]);
        Ok(())
    }

    #[tokio::test]
    async fn rejected_command_leaves_state_untouched() -> anyhow::Result<()> {
        let backend = LocalBackend::in_memory();
        let err = backend
            .execute(&SetPilot {
                name: "Ada".to_string(),
                race_event_id: RaceEventId::from("evt-1"),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Remote { .. }));
        assert!(backend.execute(&Init).await?.race_events.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn seeded_state_is_served() -> anyhow::Result<()> {
        let mut state = BackendState::default();
        let event = state.create_race_event("Seeded")?;
        let backend = LocalBackend::with_state(state);

        let details = backend
            .execute(&FindRaceEventDetails {
                race_event_id: event.id.clone(),
            })
            .await?;
        assert!(details.pilots.is_empty());
        assert_eq!(backend.execute(&Init).await?.race_events, vec![event]);
        Ok(())
    }

    #[tokio::test]
    async fn state_survives_restart() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store = SnapshotStore::new(dir.path());

        let first = LocalBackend::spawn(store.clone())?;
        first
            .execute(&CreateRaceEvent {
                name: "Persisted".to_string(),
            })
            .await?;
        drop(first);

        let second = LocalBackend::spawn(store)?;
        let init = second.execute(&Init).await?;
        assert_eq!(init.race_events.len(), 1);
        assert_eq!(init.race_events[0].name, "Persisted");

        let next = second
            .execute(&CreateRaceEvent {
                name: "Second".to_string(),
            })
            .await?;
        assert_ne!(next.id, init.race_events[0].id);
        Ok(())
    }

    #[test]
    fn failed_persist_keeps_previous_state() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let blocker = dir.path().join("blocked");
        std::fs::write(&blocker, "not a directory")?;
        let store = SnapshotStore::new(&blocker);
        let mut state = BackendState::default();

        let err = handle(
            &mut state,
            Some(&store),
            CommandName::CreateRaceEvent,
            serde_json::json!({ "name": "Lost" }),
        )
        .unwrap_err();

        assert!(matches!(err, GatewayError::Remote { .. }));
        assert!(state.race_events().is_empty());
        Ok(())
    }
}
