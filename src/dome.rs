use derive_more::From;
use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Indicates the current state of the shutter or roof.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, TryFromPrimitive)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum ShutterState {
    /// The shutter or roof is open.
    Open = 0,

    /// The shutter or roof is closed.
    Closed = 1,

    /// The shutter or roof is opening.
    Opening = 2,

    /// The shutter or roof is closing.
    Closing = 3,

    /// The shutter or roof has encountered a problem, or the device reported a state we don't know.
    Error = 4,
}

impl ShutterState {
    /// Map a raw `shutterstatus` value.
    ///
    /// Anything outside `0..=3` is treated as [`ShutterState::Error`].
    pub fn from_raw(raw: i64) -> Self {
        i32::try_from(raw)
            .ok()
            .and_then(|raw| Self::try_from_primitive(raw).ok())
            .unwrap_or(Self::Error)
    }

    /// Map an opaque `Value` from the response envelope.
    pub(crate) fn from_value(value: Option<&serde_json::Value>) -> Self {
        value
            .and_then(serde_json::Value::as_i64)
            .map_or(Self::Error, Self::from_raw)
    }

    /// Lowercase name as reported to status consumers.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Opening => "opening",
            Self::Closing => "closing",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ShutterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Merged result of the two status reads.
///
/// A `None` field means the corresponding read failed; the failure has already been logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomeStatus {
    /// Whether the dome can operate its shutter automatically.
    pub can_set_shutter: Option<bool>,
    /// Current shutter state.
    pub shutter_status: Option<ShutterState>,
}

/// Shutter movement command.
///
/// Parses case-insensitively, so `openShutter`, `OpenShutter` and `openshutter` are all the same action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum ShutterAction {
    /// Open shutter or otherwise expose telescope to the sky.
    OpenShutter,
    /// Close the shutter or otherwise shield telescope from the sky.
    CloseShutter,
    /// Immediately stop any dome movement.
    AbortSlew,
}

impl ShutterAction {
    /// Endpoint name of the action.
    pub const fn path(self) -> &'static str {
        match self {
            Self::OpenShutter => "openshutter",
            Self::CloseShutter => "closeshutter",
            Self::AbortSlew => "abortslew",
        }
    }
}

/// Action name that is not one of `openshutter`, `closeshutter` or `abortslew`.
#[derive(Debug, Clone, Error)]
#[error("Unknown dome action {0:?}, expected openShutter, closeShutter or abortSlew")]
pub struct UnknownAction(pub String);

impl std::fmt::Display for ShutterAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for ShutterAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::OpenShutter, Self::CloseShutter, Self::AbortSlew]
            .into_iter()
            .find(|action| action.path().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownAction(s.to_owned()))
    }
}

impl TryFrom<String> for ShutterAction {
    type Error = UnknownAction;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A command as handed over by the observatory scheduler.
///
/// Deserializes from `{"action": "openShutter", ...}`, ignoring other fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, From)]
pub struct Command {
    /// What to do.
    pub action: ShutterAction,
}

impl Command {
    /// Wrap an action.
    pub const fn new(action: ShutterAction) -> Self {
        Self { action }
    }
}
