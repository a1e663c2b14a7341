#![warn(clippy::all, missing_docs)]

//! Core logic for the PatLimer race timer.
//!
//! This crate hosts the domain models, the command gateway and its
//! backends, configuration handling, and the client session state used by
//! the terminal UI and any future frontends.

pub mod backend;
pub mod config;
pub mod gateway;
pub mod models;
pub mod session;

pub use backend::{LocalBackend, SnapshotStore};
pub use self::config::{AppConfig, BackendMode};
pub use gateway::{CommandGateway, CommandName, GatewayError, HttpGateway};
pub use models::{
    Channel, Heat, HeatCreationRecord, Pilot, PilotId, Race, RaceEvent, RaceEventDetails,
    RaceEventId, RaceEventType, RaceId, RaceStatus, MAX_HEATS,
};
pub use session::{
    EventView, LoadOutcome, Notice, NoticeLevel, RaceDraft, Selection, SelectionMachine,
    SessionError, SessionStore, SlotBuilder,
};
