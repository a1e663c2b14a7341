use std::collections::HashSet;

use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{
    gateway::{
        AddRace, CommandName, CreateRaceEvent, FindRaceEventDetails, GatewayError, InitState,
        RemoveRaceEvent, SetPilot, StartRace,
    },
    models::{
        HeatCreationRecord, Pilot, PilotId, Race, RaceEvent, RaceEventDetails, RaceEventId,
        RaceEventType, RaceId, RaceStatus, MAX_HEATS,
    },
};

/// A command the backend refused, with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct Rejection(pub String);

impl Rejection {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Authoritative data owned by the local backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendState {
    #[serde(default)]
    race_events: Vec<RaceEvent>,
    #[serde(default)]
    pilots: Vec<Pilot>,
    #[serde(default)]
    races: Vec<Race>,
    #[serde(default)]
    next_id: u64,
}

impl BackendState {
    /// Every event in creation order.
    pub fn race_events(&self) -> &[RaceEvent] {
        &self.race_events
    }

    /// Every pilot across all events.
    pub fn pilots(&self) -> &[Pilot] {
        &self.pilots
    }

    /// Every race across all events.
    pub fn races(&self) -> &[Race] {
        &self.races
    }

    /// Decode `payload` for `command`, apply it and encode the result.
    pub fn apply(&mut self, command: CommandName, payload: Value) -> Result<Value, GatewayError> {
        match command {
            CommandName::Init => encode(
                command,
                InitState {
                    race_events: self.race_events.clone(),
                },
            ),
            CommandName::CreateRaceEvent => {
                let request: CreateRaceEvent = decode(command, payload)?;
                let event = self
                    .create_race_event(&request.name)
                    .map_err(|err| rejected(command, err))?;
                encode(command, event)
            }
            CommandName::RemoveRaceEvent => {
                let request: RemoveRaceEvent = decode(command, payload)?;
                self.remove_race_event(&request.race_event_id)
                    .map_err(|err| rejected(command, err))?;
                Ok(Value::Null)
            }
            CommandName::FindRaceEventDetails => {
                let request: FindRaceEventDetails = decode(command, payload)?;
                let details = self
                    .details(&request.race_event_id)
                    .map_err(|err| rejected(command, err))?;
                encode(command, details)
            }
            CommandName::SetPilot => {
                let request: SetPilot = decode(command, payload)?;
                let pilot = self
                    .add_pilot(&request.name, &request.race_event_id)
                    .map_err(|err| rejected(command, err))?;
                encode(command, pilot)
            }
            CommandName::AddRace => {
                let request: AddRace = decode(command, payload)?;
                let race = self
                    .add_race(&request.name, request.heats, &request.race_event_id)
                    .map_err(|err| rejected(command, err))?;
                encode(command, race)
            }
            CommandName::StartRace => {
                let request: StartRace = decode(command, payload)?;
                let race = self
                    .start_race(&request.race_id)
                    .map_err(|err| rejected(command, err))?;
                encode(command, race)
            }
        }
    }

    /// Create a `Local` event stamped with the current time.
    pub fn create_race_event(&mut self, name: &str) -> Result<RaceEvent, Rejection> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Rejection::new("Missing 'name' property in RaceEvent"));
        }
        let event = RaceEvent {
            id: RaceEventId::new(self.allocate("evt")),
            name: name.to_string(),
            race_event_type: RaceEventType::Local,
            created_at: Utc::now(),
        };
        self.race_events.push(event.clone());
        Ok(event)
    }

    /// Remove an event together with its pilots and races.
    pub fn remove_race_event(&mut self, id: &RaceEventId) -> Result<(), Rejection> {
        self.require_event(id)?;
        self.race_events.retain(|event| &event.id != id);
        self.pilots.retain(|pilot| &pilot.race_event_id != id);
        self.races.retain(|race| &race.race_event_id != id);
        Ok(())
    }

    /// Pilots and races of one event in creation order.
    pub fn details(&self, id: &RaceEventId) -> Result<RaceEventDetails, Rejection> {
        self.require_event(id)?;
        Ok(RaceEventDetails {
            pilots: self
                .pilots
                .iter()
                .filter(|pilot| &pilot.race_event_id == id)
                .cloned()
                .collect(),
            races: self
                .races
                .iter()
                .filter(|race| &race.race_event_id == id)
                .cloned()
                .collect(),
        })
    }

    /// Register a pilot whose name is unique within the event.
    pub fn add_pilot(&mut self, name: &str, event_id: &RaceEventId) -> Result<Pilot, Rejection> {
        self.require_event(event_id)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Rejection::new("Missing 'name' property in Pilot"));
        }
        if self
            .pilots
            .iter()
            .any(|pilot| &pilot.race_event_id == event_id && pilot.name == name)
        {
            return Err(Rejection::new(format!(
                "Pilot with name '{name}' already exists"
            )));
        }
        let pilot = Pilot {
            id: PilotId::new(self.allocate("pilot")),
            name: name.to_string(),
            race_event_id: event_id.clone(),
        };
        self.pilots.push(pilot.clone());
        Ok(pilot)
    }

    /// Create a `New` race after checking heat structure against the event.
    pub fn add_race(
        &mut self,
        name: &str,
        heats: Vec<HeatCreationRecord>,
        event_id: &RaceEventId,
    ) -> Result<Race, Rejection> {
        self.require_event(event_id)?;
        self.check_heats(&heats, event_id)?;

        let event_races = self
            .races
            .iter()
            .filter(|race| &race.race_event_id == event_id)
            .count();
        let name = match name.trim() {
            "" => format!("Race {}", event_races + 1),
            trimmed => trimmed.to_string(),
        };
        let race = Race {
            id: RaceId::new(self.allocate("race")),
            name,
            status: RaceStatus::New,
            heats: heats.into_iter().map(Into::into).collect(),
            race_event_id: event_id.clone(),
        };
        self.races.push(race.clone());
        Ok(race)
    }

    /// Move a `New` race to `InProgress`.
    pub fn start_race(&mut self, race_id: &RaceId) -> Result<Race, Rejection> {
        let race = self
            .races
            .iter_mut()
            .find(|race| &race.id == race_id)
            .ok_or_else(|| Rejection::new(format!("Race '{race_id}' does not exist")))?;
        if race.status != RaceStatus::New {
            return Err(Rejection::new(format!(
                "Race '{}' cannot start from status {}",
                race.name, race.status
            )));
        }
        race.status = RaceStatus::InProgress;
        Ok(race.clone())
    }

    fn check_heats(
        &self,
        heats: &[HeatCreationRecord],
        event_id: &RaceEventId,
    ) -> Result<(), Rejection> {
        if heats.is_empty() {
            return Err(Rejection::new("Race needs at least one heat"));
        }
        if heats.len() > MAX_HEATS {
            return Err(Rejection::new(format!(
                "Race supports at most {MAX_HEATS} heats"
            )));
        }

        let mut channels = HashSet::new();
        let mut pilots = HashSet::new();
        for (index, heat) in heats.iter().enumerate() {
            if usize::from(heat.no) != index + 1 {
                return Err(Rejection::new(format!(
                    "Heat numbers must run from 1 in order, found {} at position {}",
                    heat.no,
                    index + 1
                )));
            }
            if !channels.insert(heat.channel) {
                return Err(Rejection::new(format!(
                    "Channel {} is assigned to more than one heat",
                    heat.channel
                )));
            }
            if !pilots.insert(&heat.pilot_id) {
                return Err(Rejection::new(format!(
                    "Pilot '{}' is assigned to more than one heat",
                    heat.pilot_id
                )));
            }
            if !self
                .pilots
                .iter()
                .any(|pilot| pilot.id == heat.pilot_id && &pilot.race_event_id == event_id)
            {
                return Err(Rejection::new(format!(
                    "Pilot '{}' is not registered for this event",
                    heat.pilot_id
                )));
            }
        }
        Ok(())
    }

    fn require_event(&self, id: &RaceEventId) -> Result<(), Rejection> {
        if self.race_events.iter().any(|event| &event.id == id) {
            Ok(())
        } else {
            Err(Rejection::new(format!("Race event '{id}' does not exist")))
        }
    }

    fn allocate(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

fn decode<T: DeserializeOwned>(command: CommandName, payload: Value) -> Result<T, GatewayError> {
    serde_json::from_value(payload).map_err(|err| GatewayError::Remote {
        command,
        message: format!("invalid payload: {err}"),
    })
}

fn encode<T: Serialize>(command: CommandName, value: T) -> Result<Value, GatewayError> {
    serde_json::to_value(value).map_err(|source| GatewayError::Encode { command, source })
}

fn rejected(command: CommandName, rejection: Rejection) -> GatewayError {
    GatewayError::Remote {
        command,
        message: rejection.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Channel;
    use serde_json::json;

    fn seeded() -> Result<(BackendState, RaceEventId, Vec<PilotId>), Rejection> {
        let mut state = BackendState::default();
        let event = state.create_race_event("Club Night")?;
        let ada = state.add_pilot("Ada", &event.id)?;
        let bo = state.add_pilot("Bo", &event.id)?;
        Ok((state, event.id, vec![ada.id, bo.id]))
    }

    fn heat(no: u8, channel: Channel, pilot: &PilotId) -> HeatCreationRecord {
        HeatCreationRecord {
            no,
            channel,
            pilot_id: pilot.clone(),
        }
    }

    #[test]
    fn blank_event_name_is_rejected() {
        let mut state = BackendState::default();
        let err = state.create_race_event("   ").unwrap_err();
        assert_eq!(err.0, "Missing 'name' property in RaceEvent");
        assert!(state.race_events().is_empty());
    }

    #[test]
    fn identifiers_are_unique_across_kinds() -> Result<(), Rejection> {
        let (state, event_id, pilots) = seeded()?;
        assert_eq!(event_id.as_str(), "evt-1");
        assert_eq!(pilots[0].as_str(), "pilot-2");
        assert_eq!(pilots[1].as_str(), "pilot-3");
        assert_eq!(state.pilots().len(), 2);
        Ok(())
    }

    #[test]
    fn duplicate_pilot_in_same_event_is_rejected() -> Result<(), Rejection> {
        let (mut state, event_id, _) = seeded()?;
        let err = state.add_pilot("Ada", &event_id).unwrap_err();
        assert_eq!(err.0, "Pilot with name 'Ada' already exists");

        let other = state.create_race_event("Other")?;
        state.add_pilot("Ada", &other.id)?;
        Ok(())
    }

    #[test]
    fn race_with_duplicate_channel_is_rejected() -> Result<(), Rejection> {
        let (mut state, event_id, pilots) = seeded()?;
        let err = state
            .add_race(
                "Heat A",
                vec![
                    heat(1, Channel::R1, &pilots[0]),
                    heat(2, Channel::R1, &pilots[1]),
                ],
                &event_id,
            )
            .unwrap_err();
        assert_eq!(err.0, "Channel R1 is assigned to more than one heat");
        assert!(state.races().is_empty());
        Ok(())
    }

    #[test]
    fn race_heats_must_be_contiguous() -> Result<(), Rejection> {
        let (mut state, event_id, pilots) = seeded()?;
        let err = state
            .add_race("Heat A", vec![heat(2, Channel::R1, &pilots[0])], &event_id)
            .unwrap_err();
        assert!(err.0.starts_with("Heat numbers must run from 1"));
        Ok(())
    }

    #[test]
    fn race_rejects_pilot_from_other_event() -> Result<(), Rejection> {
        let (mut state, event_id, _) = seeded()?;
        let other = state.create_race_event("Other")?;
        let stranger = state.add_pilot("Cy", &other.id)?;
        let err = state
            .add_race("Heat A", vec![heat(1, Channel::R3, &stranger.id)], &event_id)
            .unwrap_err();
        assert!(err.0.contains("not registered"));
        Ok(())
    }

    #[test]
    fn blank_race_name_gets_numbered_default() -> Result<(), Rejection> {
        let (mut state, event_id, pilots) = seeded()?;
        let race = state.add_race("", vec![heat(1, Channel::R6, &pilots[0])], &event_id)?;
        assert_eq!(race.name, "Race 1");
        assert_eq!(race.status, RaceStatus::New);
        Ok(())
    }

    #[test]
    fn start_race_only_from_new() -> Result<(), Rejection> {
        let (mut state, event_id, pilots) = seeded()?;
        let race = state.add_race("A", vec![heat(1, Channel::R7, &pilots[1])], &event_id)?;

        let started = state.start_race(&race.id)?;
        assert_eq!(started.status, RaceStatus::InProgress);

        let err = state.start_race(&race.id).unwrap_err();
        assert!(err.0.contains("cannot start"));
        Ok(())
    }

    #[test]
    fn removing_event_cascades() -> Result<(), Rejection> {
        let (mut state, event_id, pilots) = seeded()?;
        state.add_race("A", vec![heat(1, Channel::R1, &pilots[0])], &event_id)?;
        let other = state.create_race_event("Other")?;
        state.add_pilot("Keep", &other.id)?;

        state.remove_race_event(&event_id)?;

        assert_eq!(state.race_events().len(), 1);
        assert_eq!(state.pilots().len(), 1);
        assert!(state.races().is_empty());
        assert!(state.details(&event_id).is_err());
        Ok(())
    }

    #[test]
    fn apply_maps_rejections_to_remote_errors() {
        let mut state = BackendState::default();
        let err = state
            .apply(CommandName::SetPilot, json!({ "name": "Ada", "raceEventId": "evt-404" }))
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Remote { command: CommandName::SetPilot, ref message }
                if message == "Race event 'evt-404' does not exist"
        ));
    }

    #[test]
    fn apply_rejects_malformed_payload() {
        let mut state = BackendState::default();
        let err = state
            .apply(CommandName::CreateRaceEvent, json!({ "title": "x" }))
            .unwrap_err();
        assert!(matches!(err, GatewayError::Remote { ref message, .. } if message.starts_with("invalid payload")));
    }
}
