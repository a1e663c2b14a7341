//! Process-lifetime session state.
//!
//! [`SessionStore`] is the only writer of the event, pilot and race
//! collections. Every mutating intent calls the gateway first and touches
//! local state only after the backend confirmed; the backend-returned
//! entity is what gets stored.

use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    gateway::{
        AddRace, CommandGateway, CreateRaceEvent, FindRaceEventDetails, GatewayError, Init,
        RemoveRaceEvent, SetPilot, StartRace,
    },
    models::{Pilot, Race, RaceEvent, RaceEventDetails, RaceEventId, RaceId, RaceStatus},
};

use super::{
    builder::RaceDraft,
    notice::Notice,
    selection::{EventView, Selection, SelectionMachine},
};

/// Race name used when none is configured.
pub const DEFAULT_RACE_NAME: &str = "Race";

/// Failures of a session intent.
#[derive(Debug, Error)]
pub enum SessionError {
    /// `initialize` already ran or is running.
    #[error("session is already initialized")]
    AlreadyInitialized,
    /// The intent needs a selected event.
    #[error("no race event is selected")]
    NoEventSelected,
    /// The intent targeted an event other than the selected one.
    #[error("race event {0} is not the selected event")]
    EventNotSelected(RaceEventId),
    /// The race is not part of the selected event.
    #[error("race {0} is not part of the selected event")]
    UnknownRace(RaceId),
    /// The backend call failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// What happened to a details load once it resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// The snapshot replaced the local pilots and races.
    Installed(RaceEventDetails),
    /// The selection moved on while the load was in flight.
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum InitPhase {
    #[default]
    Idle,
    Running,
    Ready,
}

#[derive(Debug, Default)]
struct Inner {
    init: InitPhase,
    race_events: Vec<RaceEvent>,
    selection: Option<RaceEventId>,
    machine: SelectionMachine,
    pilots: Vec<Pilot>,
    races: Vec<Race>,
    load_ticket: u64,
    notices: Vec<Notice>,
}

impl Inner {
    fn reset_selection(&mut self) {
        self.selection = None;
        self.machine.clear();
        self.pilots.clear();
        self.races.clear();
        self.load_ticket += 1;
    }

    fn details(&self) -> RaceEventDetails {
        RaceEventDetails {
            pilots: self.pilots.clone(),
            races: self.races.clone(),
        }
    }

    fn is_current(&self, event_id: &RaceEventId, ticket: u64) -> bool {
        self.load_ticket == ticket && self.selection.as_ref() == Some(event_id)
    }

    fn is_selected(&self, event_id: &RaceEventId) -> bool {
        self.selection.as_ref() == Some(event_id)
    }
}

/// Session state shared by every consumer of one session.
///
/// Clones share the same state. Locks are never held across a gateway call,
/// so concurrent intents interleave only at those calls.
pub struct SessionStore<G> {
    gateway: Arc<G>,
    inner: Arc<RwLock<Inner>>,
    race_name: Arc<str>,
}

impl<G> Clone for SessionStore<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            inner: Arc::clone(&self.inner),
            race_name: Arc::clone(&self.race_name),
        }
    }
}

impl<G: CommandGateway> SessionStore<G> {
    /// Build an empty, uninitialized session over `gateway`.
    pub fn new(gateway: G) -> Self {
        Self {
            gateway: Arc::new(gateway),
            inner: Arc::new(RwLock::new(Inner::default())),
            race_name: Arc::from(DEFAULT_RACE_NAME),
        }
    }

    /// Name given to races created through [`SessionStore::add_race`].
    pub fn with_race_name(mut self, name: impl AsRef<str>) -> Self {
        self.race_name = Arc::from(name.as_ref());
        self
    }

    /// Gateway the session talks through.
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Load the event list. Runs once per session; a failed attempt may be retried.
    pub async fn initialize(&self) -> Result<usize, SessionError> {
        {
            let mut inner = self.inner.write();
            if inner.init != InitPhase::Idle {
                return Err(SessionError::AlreadyInitialized);
            }
            inner.init = InitPhase::Running;
        }

        match self.gateway.execute(&Init).await {
            Ok(state) => {
                let total = state.race_events.len();
                {
                    let mut inner = self.inner.write();
                    inner.race_events = state.race_events;
                    inner.init = InitPhase::Ready;
                }
                info!(total, "session initialized");
                Ok(total)
            }
            Err(err) => {
                self.inner.write().init = InitPhase::Idle;
                Err(self.report(err))
            }
        }
    }

    /// Create an event and append the backend's copy of it.
    pub async fn create_race_event(&self, name: &str) -> Result<RaceEvent, SessionError> {
        let event = self
            .gateway
            .execute(&CreateRaceEvent {
                name: name.to_string(),
            })
            .await
            .map_err(|err| self.report(err))?;
        self.inner.write().race_events.push(event.clone());
        info!(event_id = %event.id, name = %event.name, "race event created");
        Ok(event)
    }

    /// Remove an event. Clears the selection if it pointed at that event.
    pub async fn remove_race_event(&self, event_id: &RaceEventId) -> Result<(), SessionError> {
        self.gateway
            .execute(&RemoveRaceEvent {
                race_event_id: event_id.clone(),
            })
            .await
            .map_err(|err| self.report(err))?;
        {
            let mut inner = self.inner.write();
            inner.race_events.retain(|event| &event.id != event_id);
            if inner.is_selected(event_id) {
                inner.reset_selection();
            }
        }
        info!(event_id = %event_id, "race event removed");
        Ok(())
    }

    /// Point the selection at `event_id` and load its details.
    ///
    /// Pilots and races are emptied until the load lands. A load that
    /// resolves after the selection moved on is discarded.
    pub async fn select_race_event(
        &self,
        event_id: RaceEventId,
    ) -> Result<LoadOutcome, SessionError> {
        let ticket = {
            let mut inner = self.inner.write();
            inner.reset_selection();
            inner.selection = Some(event_id.clone());
            inner.load_ticket
        };
        info!(event_id = %event_id, "race event selected");
        self.load_details(event_id, ticket).await
    }

    /// Return to "no event selected" and drop the event's pilots and races.
    pub fn clear_selection(&self) {
        self.inner.write().reset_selection();
        debug!("selection cleared");
    }

    /// Reload the selected event's pilots and races wholesale.
    pub async fn load_race_event_details(
        &self,
        event_id: &RaceEventId,
    ) -> Result<LoadOutcome, SessionError> {
        let ticket = {
            let mut inner = self.inner.write();
            if !inner.is_selected(event_id) {
                return Err(SessionError::EventNotSelected(event_id.clone()));
            }
            inner.load_ticket += 1;
            inner.load_ticket
        };
        self.load_details(event_id.clone(), ticket).await
    }

    /// Register a pilot for the selected event.
    pub async fn add_pilot(&self, name: &str) -> Result<Pilot, SessionError> {
        let event_id = self.require_selection()?;
        let pilot = self
            .gateway
            .execute(&SetPilot {
                name: name.to_string(),
                race_event_id: event_id,
            })
            .await
            .map_err(|err| self.report(err))?;
        {
            let mut inner = self.inner.write();
            if inner.is_selected(&pilot.race_event_id) {
                inner.pilots.push(pilot.clone());
                let details = inner.details();
                inner.machine.contents_changed(&details);
            } else {
                debug!(pilot_id = %pilot.id, "selection moved on; pilot not appended");
            }
        }
        info!(pilot_id = %pilot.id, name = %pilot.name, "pilot added");
        Ok(pilot)
    }

    /// Create a race in the selected event from a validated draft.
    pub async fn add_race(&self, draft: RaceDraft) -> Result<Race, SessionError> {
        let event_id = self.require_selection()?;
        let race = self
            .gateway
            .execute(&AddRace {
                name: self.race_name.to_string(),
                heats: draft.into_heats(),
                race_event_id: event_id,
            })
            .await
            .map_err(|err| self.report(err))?;
        {
            let mut inner = self.inner.write();
            if inner.is_selected(&race.race_event_id) {
                inner.races.push(race.clone());
                let details = inner.details();
                inner.machine.contents_changed(&details);
            } else {
                debug!(race_id = %race.id, "selection moved on; race not appended");
            }
        }
        info!(race_id = %race.id, heats = race.heats.len(), "race added");
        Ok(race)
    }

    /// Ask the backend to start `race_id` and store the updated race.
    pub async fn start_race(&self, race_id: &RaceId) -> Result<Race, SessionError> {
        {
            let inner = self.inner.read();
            if inner.selection.is_none() {
                return Err(SessionError::NoEventSelected);
            }
            if !inner.races.iter().any(|race| &race.id == race_id) {
                return Err(SessionError::UnknownRace(race_id.clone()));
            }
        }
        let race = self
            .gateway
            .execute(&StartRace {
                race_id: race_id.clone(),
            })
            .await
            .map_err(|err| self.report(err))?;
        {
            let mut inner = self.inner.write();
            if let Some(slot) = inner.races.iter_mut().find(|known| known.id == race.id) {
                *slot = race.clone();
            }
        }
        info!(race_id = %race.id, status = %race.status, "race started");
        Ok(race)
    }

    async fn load_details(
        &self,
        event_id: RaceEventId,
        ticket: u64,
    ) -> Result<LoadOutcome, SessionError> {
        let result = self
            .gateway
            .execute(&FindRaceEventDetails {
                race_event_id: event_id.clone(),
            })
            .await;

        let details = match result {
            Ok(details) => details,
            Err(err) => {
                if !self.inner.read().is_current(&event_id, ticket) {
                    debug!(event_id = %event_id, error = %err, "superseded load failed");
                    return Ok(LoadOutcome::Discarded);
                }
                return Err(self.report(err));
            }
        };

        let mut inner = self.inner.write();
        if !inner.is_current(&event_id, ticket) {
            debug!(event_id = %event_id, ticket, "discarding stale details");
            return Ok(LoadOutcome::Discarded);
        }
        inner.pilots = details.pilots.clone();
        inner.races = details.races.clone();
        inner.machine.details_loaded(event_id.clone(), &details);
        debug!(
            event_id = %event_id,
            pilots = details.pilots.len(),
            races = details.races.len(),
            "details installed"
        );
        Ok(LoadOutcome::Installed(details))
    }
}

impl<G> SessionStore<G> {
    /// Whether `initialize` completed.
    pub fn is_initialized(&self) -> bool {
        self.inner.read().init == InitPhase::Ready
    }

    /// Known events.
    pub fn race_events(&self) -> Vec<RaceEvent> {
        self.inner.read().race_events.clone()
    }

    /// Selection cursor.
    pub fn selection(&self) -> Option<RaceEventId> {
        self.inner.read().selection.clone()
    }

    /// The selected event, if it is in the event list.
    pub fn selected_event(&self) -> Option<RaceEvent> {
        let inner = self.inner.read();
        let selected = inner.selection.as_ref()?;
        inner
            .race_events
            .iter()
            .find(|event| &event.id == selected)
            .cloned()
    }

    /// Pilots of the selected event.
    pub fn pilots(&self) -> Vec<Pilot> {
        self.inner.read().pilots.clone()
    }

    /// Races of the selected event.
    pub fn races(&self) -> Vec<Race> {
        self.inner.read().races.clone()
    }

    /// Pilots and races of the selected event as one snapshot.
    pub fn details(&self) -> RaceEventDetails {
        self.inner.read().details()
    }

    /// Navigation state.
    ///
    /// Follows the selection cursor: it enters [`Selection::EventSelected`]
    /// once the selected event's details are installed and returns to
    /// [`Selection::NoEventSelected`] whenever the cursor is reset.
    pub fn selection_state(&self) -> Selection {
        self.inner.read().machine.state().clone()
    }

    /// Visible sub-view of the selected event.
    pub fn view(&self) -> Option<EventView> {
        self.inner.read().machine.view()
    }

    /// Switch the selected event to its settings.
    pub fn open_settings(&self) -> bool {
        self.inner.write().machine.open_settings()
    }

    /// Switch back to the race list. Refused while the event is empty.
    pub fn close_settings(&self) -> bool {
        let mut inner = self.inner.write();
        let details = inner.details();
        inner.machine.close_settings(&details)
    }

    /// Flip between race list and settings.
    pub fn toggle_settings(&self) -> bool {
        let mut inner = self.inner.write();
        let details = inner.details();
        inner.machine.toggle_settings(&details)
    }

    /// First race of the selected event that has not started.
    pub fn next_pending_race(&self) -> Option<RaceId> {
        self.inner
            .read()
            .races
            .iter()
            .find(|race| race.status == RaceStatus::New)
            .map(|race| race.id.clone())
    }

    /// Take every notice raised since the last call.
    pub fn take_notices(&self) -> Vec<Notice> {
        std::mem::take(&mut self.inner.write().notices)
    }

    /// Record a notice for the user.
    pub fn push_notice(&self, notice: Notice) {
        self.inner.write().notices.push(notice);
    }

    fn require_selection(&self) -> Result<RaceEventId, SessionError> {
        self.inner
            .read()
            .selection
            .clone()
            .ok_or(SessionError::NoEventSelected)
    }

    fn report(&self, err: GatewayError) -> SessionError {
        warn!(error = %err, "command failed");
        self.push_notice(Notice::error(err.to_string()));
        SessionError::Gateway(err)
    }
}
