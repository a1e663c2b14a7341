//! Shared domain models.
//!
//! Identifiers are opaque strings assigned by the backend. They compare by
//! equality only and carry no ordering.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a backend-assigned identifier.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the raw identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

opaque_id!(
    /// Identifier of a [`RaceEvent`].
    RaceEventId
);
opaque_id!(
    /// Identifier of a [`Pilot`].
    PilotId
);
opaque_id!(
    /// Identifier of a [`Race`].
    RaceId
);

/// Where an event's data is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaceEventType {
    /// Owned by the in-process backend.
    Local,
    /// Owned by a remote service.
    Cloud,
}

impl fmt::Display for RaceEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RaceEventType::Local => f.write_str("Local"),
            RaceEventType::Cloud => f.write_str("Cloud"),
        }
    }
}

/// Root aggregate grouping the pilots and races of one race day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceEvent {
    /// Backend-assigned identifier.
    pub id: RaceEventId,
    /// Display name.
    pub name: String,
    /// Ownership of the event's data.
    pub race_event_type: RaceEventType,
    /// Creation timestamp reported by the backend.
    pub created_at: DateTime<Utc>,
}

/// A pilot registered for exactly one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pilot {
    /// Backend-assigned identifier.
    pub id: PilotId,
    /// Display name, unique within the owning event.
    pub name: String,
    /// Owning event.
    #[serde(rename = "raceEventId")]
    pub race_event_id: RaceEventId,
}

/// Lifecycle of a race.
///
/// Only `New -> InProgress` is requested by this engine. Later transitions
/// are reported by the backend and taken as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RaceStatus {
    /// Created, not yet started.
    #[default]
    New,
    /// Running.
    InProgress,
    /// Stopped before completion.
    Interrupted,
    /// Completed.
    Finished,
}

impl fmt::Display for RaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RaceStatus::New => "New",
            RaceStatus::InProgress => "In progress",
            RaceStatus::Interrupted => "Interrupted",
            RaceStatus::Finished => "Finished",
        };
        f.write_str(label)
    }
}

/// Number of heats that can fly at once, one per supported channel.
pub const MAX_HEATS: usize = 4;

/// Radio channels a race can assign to its heats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// Raceband 1 (5658 MHz).
    R1,
    /// Raceband 3 (5732 MHz).
    R3,
    /// Raceband 6 (5843 MHz).
    R6,
    /// Raceband 7 (5880 MHz).
    R7,
}

impl Channel {
    /// Every supported channel, in display order.
    pub const ALL: [Channel; 4] = [Channel::R1, Channel::R3, Channel::R6, Channel::R7];

    /// Wire representation (`"R1"`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::R1 => "R1",
            Channel::R3 => "R3",
            Channel::R6 => "R6",
            Channel::R7 => "R7",
        }
    }

    /// Channel following `current` in [`Channel::ALL`], wrapping to `None`
    /// after the last one.
    pub fn cycle(current: Option<Channel>) -> Option<Channel> {
        match current {
            None => Some(Channel::ALL[0]),
            Some(channel) => {
                let index = Channel::ALL.iter().position(|c| *c == channel)?;
                Channel::ALL.get(index + 1).copied()
            }
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing a channel outside the supported set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported channel '{0}'")]
pub struct UnknownChannel(pub String);

impl FromStr for Channel {
    type Err = UnknownChannel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .iter()
            .copied()
            .find(|channel| channel.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownChannel(s.to_string()))
    }
}

/// One channel and pilot pairing inside a persisted race.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heat {
    /// 1-based position within the race.
    pub no: u8,
    /// Assigned radio channel.
    pub channel: Channel,
    /// Pilot flying this heat.
    pub pilot_id: PilotId,
}

/// A race composed of up to four concurrent heats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Race {
    /// Backend-assigned identifier.
    pub id: RaceId,
    /// Display name.
    pub name: String,
    /// Current lifecycle state.
    pub status: RaceStatus,
    /// Heats ordered by `no`.
    pub heats: Vec<Heat>,
    /// Owning event.
    #[serde(rename = "raceEventId")]
    pub race_event_id: RaceEventId,
}

/// Heat record sent when creating a race.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatCreationRecord {
    /// 1-based position, contiguous within the race.
    pub no: u8,
    /// Assigned radio channel.
    pub channel: Channel,
    /// Pilot flying this heat.
    pub pilot_id: PilotId,
}

impl From<HeatCreationRecord> for Heat {
    fn from(record: HeatCreationRecord) -> Self {
        Heat {
            no: record.no,
            channel: record.channel,
            pilot_id: record.pilot_id,
        }
    }
}

/// Snapshot of one event's pilots and races.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RaceEventDetails {
    /// Pilots registered for the event.
    pub pilots: Vec<Pilot>,
    /// Races created for the event.
    pub races: Vec<Race>,
}

impl RaceEventDetails {
    /// An event missing either pilots or races cannot show a race list.
    pub fn is_empty(&self) -> bool {
        self.pilots.is_empty() || self.races.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_parses_case_insensitively() {
        assert_eq!("r6".parse::<Channel>(), Ok(Channel::R6));
        assert_eq!(
            "R2".parse::<Channel>(),
            Err(UnknownChannel("R2".to_string()))
        );
    }

    #[test]
    fn channel_cycle_wraps_through_unset() {
        let mut current = None;
        let mut seen = Vec::new();
        for _ in 0..5 {
            current = Channel::cycle(current);
            seen.push(current);
        }
        assert_eq!(
            seen,
            vec![
                Some(Channel::R1),
                Some(Channel::R3),
                Some(Channel::R6),
                Some(Channel::R7),
                None
            ]
        );
    }

    #[test]
    fn pilot_uses_camel_case_event_key() -> serde_json::Result<()> {
        let pilot = Pilot {
            id: PilotId::from("pilot-1"),
            name: "Ada".to_string(),
            race_event_id: RaceEventId::from("evt-1"),
        };
        let value = serde_json::to_value(&pilot)?;
        assert_eq!(value["raceEventId"], "evt-1");
        assert_eq!(value["id"], "pilot-1");
        Ok(())
    }

    #[test]
    fn details_without_races_are_empty() {
        let details = RaceEventDetails {
            pilots: vec![Pilot {
                id: PilotId::from("pilot-1"),
                name: "Ada".to_string(),
                race_event_id: RaceEventId::from("evt-1"),
            }],
            races: Vec::new(),
        };
        assert!(details.is_empty());
    }
}
