//! Typed request/response conduit to the authoritative backend.
//!
//! Every call is exactly one round trip. The gateway never retries, caches
//! or validates; callers decide what a failure means.

/// Typed request structs, one per command.
pub mod commands;
/// HTTP transport for a remote backend.
pub mod http;

use std::{fmt, future::Future, str::FromStr};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub use commands::{
    AddRace, CreateRaceEvent, FindRaceEventDetails, Init, InitState, RemoveRaceEvent, SetPilot,
    StartRace,
};
pub use http::HttpGateway;

/// The closed set of commands the backend understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandName {
    /// Fetch the event list at session start.
    Init,
    /// Create an event.
    CreateRaceEvent,
    /// Remove an event and everything it owns.
    RemoveRaceEvent,
    /// Fetch an event's pilots and races.
    FindRaceEventDetails,
    /// Register a pilot for an event.
    SetPilot,
    /// Create a race from heat records.
    AddRace,
    /// Move a race from `New` to `InProgress`.
    StartRace,
}

impl CommandName {
    /// Every command, in wire-table order.
    pub const ALL: [CommandName; 7] = [
        CommandName::Init,
        CommandName::CreateRaceEvent,
        CommandName::RemoveRaceEvent,
        CommandName::FindRaceEventDetails,
        CommandName::SetPilot,
        CommandName::AddRace,
        CommandName::StartRace,
    ];

    /// Name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandName::Init => "init",
            CommandName::CreateRaceEvent => "create_race_event",
            CommandName::RemoveRaceEvent => "remove_race_event",
            CommandName::FindRaceEventDetails => "find_race_event_details",
            CommandName::SetPilot => "set_pilot",
            CommandName::AddRace => "add_race",
            CommandName::StartRace => "start_race",
        }
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandName {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandName::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| GatewayError::UnknownCommand(s.to_string()))
    }
}

/// Failures surfaced by a gateway call.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The backend processed the command and rejected it.
    #[error("{command} rejected: {message}")]
    Remote {
        /// Command that failed.
        command: CommandName,
        /// Backend-provided description.
        message: String,
    },
    /// The backend could not be reached or the exchange broke off.
    #[error("{command} could not reach the backend: {message}")]
    Transport {
        /// Command that failed.
        command: CommandName,
        /// Transport-level description.
        message: String,
    },
    /// No response arrived within the configured timeout.
    #[error("{command} timed out")]
    Timeout {
        /// Command that failed.
        command: CommandName,
    },
    /// The payload could not be serialized.
    #[error("failed to encode {command} payload")]
    Encode {
        /// Command that failed.
        command: CommandName,
        /// Serializer error.
        #[source]
        source: serde_json::Error,
    },
    /// The result did not match the command's declared type.
    #[error("failed to decode {command} result")]
    Decode {
        /// Command that failed.
        command: CommandName,
        /// Deserializer error.
        #[source]
        source: serde_json::Error,
    },
    /// A command name outside the supported set.
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    /// The in-process backend task has stopped.
    #[error("backend is no longer running")]
    Unavailable,
}

/// A request with a fixed wire name and a declared result type.
pub trait Command: Serialize {
    /// Wire name of the command.
    const NAME: CommandName;
    /// Result decoded from a successful response.
    type Output: DeserializeOwned + Send + 'static;
}

/// Transport hook shared by every backend binding.
pub trait CommandGateway: Send + Sync {
    /// Send one raw command and wait for its raw result.
    fn invoke(
        &self,
        command: CommandName,
        payload: Value,
    ) -> impl Future<Output = Result<Value, GatewayError>> + Send;

    /// Send a typed command and decode its declared result.
    fn execute<C>(
        &self,
        request: &C,
    ) -> impl Future<Output = Result<C::Output, GatewayError>> + Send
    where
        C: Command + Sync,
    {
        async move {
            let payload = serde_json::to_value(request).map_err(|source| GatewayError::Encode {
                command: C::NAME,
                source,
            })?;
            debug!(command = %C::NAME, "dispatching command");
            let value = self.invoke(C::NAME, payload).await?;
            serde_json::from_value(value).map_err(|source| GatewayError::Decode {
                command: C::NAME,
                source,
            })
        }
    }
}
