//! Which view is visible and which event is active.

use crate::models::{RaceEventDetails, RaceEventId};

/// Sub-state of a selected event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventView {
    /// Race list of the event.
    Viewing,
    /// Pilot roster and race composition.
    Settings,
}

/// Navigation state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    /// Event list is shown.
    #[default]
    NoEventSelected,
    /// One event is active.
    EventSelected {
        /// Active event.
        event_id: RaceEventId,
        /// Visible sub-view.
        view: EventView,
    },
}

/// State machine over [`Selection`].
///
/// An event without pilots or without races is always shown in
/// [`EventView::Settings`] so it gets populated first.
#[derive(Debug, Clone, Default)]
pub struct SelectionMachine {
    state: Selection,
}

impl SelectionMachine {
    /// Start with no event selected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> &Selection {
        &self.state
    }

    /// Active event, if any.
    pub fn active_event(&self) -> Option<&RaceEventId> {
        match &self.state {
            Selection::NoEventSelected => None,
            Selection::EventSelected { event_id, .. } => Some(event_id),
        }
    }

    /// Visible sub-view, if an event is selected.
    pub fn view(&self) -> Option<EventView> {
        match &self.state {
            Selection::NoEventSelected => None,
            Selection::EventSelected { view, .. } => Some(*view),
        }
    }

    /// Enter the selected state once `event_id`'s details have loaded.
    ///
    /// Reloading the active event keeps the current sub-view unless the
    /// event became empty.
    pub fn details_loaded(&mut self, event_id: RaceEventId, details: &RaceEventDetails) {
        let view = match &self.state {
            _ if details.is_empty() => EventView::Settings,
            Selection::EventSelected {
                event_id: active,
                view,
            } if *active == event_id => *view,
            _ => EventView::Viewing,
        };
        self.state = Selection::EventSelected { event_id, view };
    }

    /// Re-check the empty-event rule after pilots or races changed.
    pub fn contents_changed(&mut self, details: &RaceEventDetails) {
        if let Selection::EventSelected { view, .. } = &mut self.state {
            if details.is_empty() {
                *view = EventView::Settings;
            }
        }
    }

    /// Return to the event list.
    pub fn clear(&mut self) {
        self.state = Selection::NoEventSelected;
    }

    /// Switch to settings. Returns `false` without a selected event.
    pub fn open_settings(&mut self) -> bool {
        match &mut self.state {
            Selection::EventSelected { view, .. } => {
                *view = EventView::Settings;
                true
            }
            Selection::NoEventSelected => false,
        }
    }

    /// Switch back to the race list. Refused while the event is empty.
    pub fn close_settings(&mut self, details: &RaceEventDetails) -> bool {
        match &mut self.state {
            Selection::EventSelected { view, .. } if !details.is_empty() => {
                *view = EventView::Viewing;
                true
            }
            _ => false,
        }
    }

    /// Flip between the two sub-views, honouring the empty-event rule.
    pub fn toggle_settings(&mut self, details: &RaceEventDetails) -> bool {
        match self.view() {
            Some(EventView::Viewing) => self.open_settings(),
            Some(EventView::Settings) => self.close_settings(details),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Pilot, PilotId, Race, RaceId, RaceStatus};

    fn populated() -> RaceEventDetails {
        let event_id = RaceEventId::from("evt-1");
        RaceEventDetails {
            pilots: vec![Pilot {
                id: PilotId::from("pilot-1"),
                name: "Ada".to_string(),
                race_event_id: event_id.clone(),
            }],
            races: vec![Race {
                id: RaceId::from("race-1"),
                name: "Race".to_string(),
                status: RaceStatus::New,
                heats: Vec::new(),
                race_event_id: event_id,
            }],
        }
    }

    #[test]
    fn starts_without_selection() {
        let machine = SelectionMachine::new();
        assert_eq!(machine.state(), &Selection::NoEventSelected);
        assert!(machine.view().is_none());
    }

    #[test]
    fn event_without_pilots_forces_settings() {
        let mut machine = SelectionMachine::new();
        let mut details = populated();
        details.pilots.clear();

        machine.details_loaded(RaceEventId::from("evt-1"), &details);

        assert_eq!(machine.view(), Some(EventView::Settings));
        assert!(!machine.close_settings(&details));
        assert!(!machine.toggle_settings(&details));
        assert_eq!(machine.view(), Some(EventView::Settings));
    }

    #[test]
    fn populated_event_opens_in_viewing() {
        let mut machine = SelectionMachine::new();
        machine.details_loaded(RaceEventId::from("evt-1"), &populated());
        assert_eq!(machine.view(), Some(EventView::Viewing));
        assert_eq!(machine.active_event(), Some(&RaceEventId::from("evt-1")));
    }

    #[test]
    fn toggle_round_trips_when_populated() {
        let details = populated();
        let mut machine = SelectionMachine::new();
        machine.details_loaded(RaceEventId::from("evt-1"), &details);

        assert!(machine.toggle_settings(&details));
        assert_eq!(machine.view(), Some(EventView::Settings));
        assert!(machine.toggle_settings(&details));
        assert_eq!(machine.view(), Some(EventView::Viewing));
    }

    #[test]
    fn reload_keeps_settings_for_same_event() {
        let details = populated();
        let mut machine = SelectionMachine::new();
        machine.details_loaded(RaceEventId::from("evt-1"), &details);
        machine.open_settings();

        machine.details_loaded(RaceEventId::from("evt-1"), &details);
        assert_eq!(machine.view(), Some(EventView::Settings));

        machine.details_loaded(RaceEventId::from("evt-2"), &details);
        assert_eq!(machine.view(), Some(EventView::Viewing));
    }

    #[test]
    fn emptied_event_falls_back_to_settings() {
        let mut details = populated();
        let mut machine = SelectionMachine::new();
        machine.details_loaded(RaceEventId::from("evt-1"), &details);

        details.races.clear();
        machine.contents_changed(&details);
        assert_eq!(machine.view(), Some(EventView::Settings));
    }

    #[test]
    fn clear_returns_to_list() {
        let mut machine = SelectionMachine::new();
        machine.details_loaded(RaceEventId::from("evt-1"), &populated());
        machine.clear();
        assert_eq!(machine.state(), &Selection::NoEventSelected);
        assert!(!machine.open_settings());
    }
}
