//! Draft editor for a new race.

use std::collections::HashSet;

use thiserror::Error;

use crate::models::{Channel, HeatCreationRecord, Pilot, MAX_HEATS};

/// Draft form of a heat. Incomplete until both fields are set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Slot {
    /// Chosen radio channel.
    pub channel: Option<Channel>,
    /// Chosen pilot, held by value until the race exists.
    pub pilot: Option<Pilot>,
}

impl Slot {
    /// Whether both channel and pilot are chosen.
    pub fn is_complete(&self) -> bool {
        self.channel.is_some() && self.pilot.is_some()
    }
}

/// Why a draft cannot become a race. Slot numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    /// No slots were added.
    #[error("add at least one slot")]
    Empty,
    /// A slot has no channel.
    #[error("slot {slot} has no channel")]
    MissingChannel {
        /// Offending slot.
        slot: usize,
    },
    /// A slot has no pilot.
    #[error("slot {slot} has no pilot")]
    MissingPilot {
        /// Offending slot.
        slot: usize,
    },
    /// Two slots share a channel.
    #[error("channel {channel} is already used before slot {slot}")]
    DuplicateChannel {
        /// Shared channel.
        channel: Channel,
        /// Second slot using it.
        slot: usize,
    },
    /// Two slots share a pilot.
    #[error("pilot {pilot} is already flying before slot {slot}")]
    DuplicatePilot {
        /// Shared pilot's name.
        pilot: String,
        /// Second slot using it.
        slot: usize,
    },
}

/// Heat records produced from a valid draft, ready for `add_race`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceDraft {
    heats: Vec<HeatCreationRecord>,
}

impl RaceDraft {
    /// Heat records in position order.
    pub fn heats(&self) -> &[HeatCreationRecord] {
        &self.heats
    }

    /// Consume the draft and return its heat records.
    pub fn into_heats(self) -> Vec<HeatCreationRecord> {
        self.heats
    }
}

/// Ordered list of at most [`MAX_HEATS`] slots.
///
/// Positions are not stable: removing a slot shifts later slots left.
#[derive(Debug, Clone, Default)]
pub struct SlotBuilder {
    slots: Vec<Slot>,
}

impl SlotBuilder {
    /// Empty draft.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current slots in order.
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no slot was added.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether another slot would exceed the channel capacity.
    pub fn is_full(&self) -> bool {
        self.slots.len() >= MAX_HEATS
    }

    /// Append an empty slot. Returns `false` when already full.
    pub fn add_slot(&mut self) -> bool {
        if self.is_full() {
            return false;
        }
        self.slots.push(Slot::default());
        true
    }

    /// Remove the slot at `index`, shifting later slots left.
    pub fn remove_slot(&mut self, index: usize) -> Option<Slot> {
        (index < self.slots.len()).then(|| self.slots.remove(index))
    }

    /// Set or clear a slot's channel. Returns `false` for an unknown index.
    pub fn set_channel(&mut self, index: usize, channel: Option<Channel>) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) => {
                slot.channel = channel;
                true
            }
            None => false,
        }
    }

    /// Set or clear a slot's pilot. Returns `false` for an unknown index.
    pub fn set_pilot(&mut self, index: usize, pilot: Option<Pilot>) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) => {
                slot.pilot = pilot;
                true
            }
            None => false,
        }
    }

    /// Channels not yet taken by any slot.
    pub fn free_channels(&self) -> Vec<Channel> {
        Channel::ALL
            .into_iter()
            .filter(|channel| !self.slots.iter().any(|slot| slot.channel == Some(*channel)))
            .collect()
    }

    /// Unset pilots that are no longer part of `roster`.
    pub fn retain_roster(&mut self, roster: &[Pilot]) {
        for slot in &mut self.slots {
            if let Some(pilot) = &slot.pilot {
                if !roster.iter().any(|candidate| candidate.id == pilot.id) {
                    slot.pilot = None;
                }
            }
        }
    }

    /// Drop every slot.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// First reason the draft cannot be built, if any.
    pub fn validate(&self) -> Result<(), DraftError> {
        if self.slots.is_empty() {
            return Err(DraftError::Empty);
        }

        let mut channels = HashSet::new();
        let mut pilots = HashSet::new();
        for (index, slot) in self.slots.iter().enumerate() {
            let position = index + 1;
            let channel = slot
                .channel
                .ok_or(DraftError::MissingChannel { slot: position })?;
            let pilot = slot
                .pilot
                .as_ref()
                .ok_or(DraftError::MissingPilot { slot: position })?;
            if !channels.insert(channel) {
                return Err(DraftError::DuplicateChannel {
                    channel,
                    slot: position,
                });
            }
            if !pilots.insert(&pilot.id) {
                return Err(DraftError::DuplicatePilot {
                    pilot: pilot.name.clone(),
                    slot: position,
                });
            }
        }
        Ok(())
    }

    /// Whether [`SlotBuilder::build`] would produce a draft.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Convert the slots into heat records numbered from 1.
    ///
    /// Returns `None` while the draft is invalid.
    pub fn build(&self) -> Option<RaceDraft> {
        if !self.is_valid() {
            return None;
        }
        let heats = self
            .slots
            .iter()
            .zip(1_u8..)
            .filter_map(|(slot, no)| {
                Some(HeatCreationRecord {
                    no,
                    channel: slot.channel?,
                    pilot_id: slot.pilot.as_ref()?.id.clone(),
                })
            })
            .collect();
        Some(RaceDraft { heats })
    }
}
