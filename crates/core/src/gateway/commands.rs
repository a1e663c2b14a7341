use serde::{Deserialize, Serialize};

use crate::models::{
    HeatCreationRecord, Pilot, Race, RaceEvent, RaceEventDetails, RaceEventId, RaceId,
};

use super::{Command, CommandName};

/// `init`: load the event list.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Init;

/// Result of [`Init`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitState {
    /// Every known event.
    pub race_events: Vec<RaceEvent>,
}

impl Command for Init {
    const NAME: CommandName = CommandName::Init;
    type Output = InitState;
}

/// `create_race_event`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRaceEvent {
    /// Display name of the new event.
    pub name: String,
}

impl Command for CreateRaceEvent {
    const NAME: CommandName = CommandName::CreateRaceEvent;
    type Output = RaceEvent;
}

/// `remove_race_event`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveRaceEvent {
    /// Event to remove.
    pub race_event_id: RaceEventId,
}

impl Command for RemoveRaceEvent {
    const NAME: CommandName = CommandName::RemoveRaceEvent;
    type Output = ();
}

/// `find_race_event_details`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindRaceEventDetails {
    /// Event whose pilots and races are requested.
    pub race_event_id: RaceEventId,
}

impl Command for FindRaceEventDetails {
    const NAME: CommandName = CommandName::FindRaceEventDetails;
    type Output = RaceEventDetails;
}

/// `set_pilot`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPilot {
    /// Pilot display name.
    pub name: String,
    /// Event the pilot registers for.
    pub race_event_id: RaceEventId,
}

impl Command for SetPilot {
    const NAME: CommandName = CommandName::SetPilot;
    type Output = Pilot;
}

/// `add_race`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddRace {
    /// Race display name.
    pub name: String,
    /// Heats in position order.
    pub heats: Vec<HeatCreationRecord>,
    /// Event the race belongs to.
    pub race_event_id: RaceEventId,
}

impl Command for AddRace {
    const NAME: CommandName = CommandName::AddRace;
    type Output = Race;
}

/// `start_race`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRace {
    /// Race to start.
    pub race_id: RaceId,
}

impl Command for StartRace {
    const NAME: CommandName = CommandName::StartRace;
    type Output = Race;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Channel, PilotId};
    use serde_json::json;

    #[test]
    fn add_race_payload_matches_wire_shape() -> serde_json::Result<()> {
        let request = AddRace {
            name: "Race".to_string(),
            heats: vec![HeatCreationRecord {
                no: 1,
                channel: Channel::R1,
                pilot_id: PilotId::from("pilot-1"),
            }],
            race_event_id: RaceEventId::from("evt-1"),
        };
        assert_eq!(
            serde_json::to_value(&request)?,
            json!({
                "name": "Race",
                "heats": [{ "no": 1, "channel": "R1", "pilot_id": "pilot-1" }],
                "raceEventId": "evt-1"
            })
        );
        Ok(())
    }

    #[test]
    fn remove_result_decodes_from_null() -> serde_json::Result<()> {
        let () = serde_json::from_value::<<RemoveRaceEvent as Command>::Output>(json!(null))?;
        Ok(())
    }
}
