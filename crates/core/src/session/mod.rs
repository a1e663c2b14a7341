//! Client-side session: state store, navigation and race drafting.

pub mod builder;
pub mod selection;
pub mod store;
mod notice;

pub use builder::{DraftError, RaceDraft, Slot, SlotBuilder};
pub use notice::{Notice, NoticeLevel};
pub use selection::{EventView, Selection, SelectionMachine};
pub use store::{LoadOutcome, SessionError, SessionStore, DEFAULT_RACE_NAME};
