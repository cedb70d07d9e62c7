//! Error kinds shared across the room simulation, hosting, and store layers.
//!
//! Mirrors the documented error taxonomy: command intake and HTTP handlers map
//! directly onto a kind, the tick scheduler only ever produces `Transient` (a
//! single tick failing) or `Fatal` (restart budget exhausted).

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Bad coordinates, out-of-range sliders, missing fields.
    InvalidInput(String),
    /// Unknown userId, password mismatch, wrong joinCode.
    AuthFailed(String),
    /// Room or map id unknown.
    NotFound(String),
    /// Non-creator attempted a creator-only action.
    Forbidden(String),
    /// Nation already founded, cell already owned, refound disabled, etc.
    Conflict(Conflict),
    /// Insufficient resources for a build/arrow command.
    Unaffordable(String),
    /// Room status is `ended`.
    GameEnded,
    /// Store unavailable, worker mid-restart; safe to retry.
    Transient(String),
    /// Generator produced invalid state, or the worker exhausted its restart budget.
    Fatal(String),
}

/// Named conflict codes distinct from a free-form message, so clients can branch on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    NationAlreadyFounded,
    CellAlreadyOwned,
    RefoundDisabled,
    StructureAlreadyPresent,
    RoomAlreadyExists,
}

impl Conflict {
    pub const fn code(self) -> &'static str {
        match self {
            Conflict::NationAlreadyFounded => "NATION_ALREADY_FOUNDED",
            Conflict::CellAlreadyOwned => "CELL_ALREADY_OWNED",
            Conflict::RefoundDisabled => "REFOUND_DISABLED",
            Conflict::StructureAlreadyPresent => "STRUCTURE_ALREADY_PRESENT",
            Conflict::RoomAlreadyExists => "ROOM_ALREADY_EXISTS",
        }
    }
}

impl Error {
    /// Stable string tag for wire serialization, independent of the human message.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "InvalidInput",
            Error::AuthFailed(_) => "AuthFailed",
            Error::NotFound(_) => "NotFound",
            Error::Forbidden(_) => "Forbidden",
            Error::Conflict(_) => "Conflict",
            Error::Unaffordable(_) => "Unaffordable",
            Error::GameEnded => "GameEnded",
            Error::Transient(_) => "Transient",
            Error::Fatal(_) => "Fatal",
        }
    }

    /// Whether a caller may reasonably retry the same request unchanged.
    pub fn retryable(&self) -> bool {
        matches!(self, Error::Transient(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidInput(m) => write!(f, "invalid input: {m}"),
            Error::AuthFailed(m) => write!(f, "auth failed: {m}"),
            Error::NotFound(m) => write!(f, "not found: {m}"),
            Error::Forbidden(m) => write!(f, "forbidden: {m}"),
            Error::Conflict(c) => write!(f, "conflict: {}", c.code()),
            Error::Unaffordable(m) => write!(f, "unaffordable: {m}"),
            Error::GameEnded => write!(f, "game has ended"),
            Error::Transient(m) => write!(f, "transient: {m}"),
            Error::Fatal(m) => write!(f, "fatal: {m}"),
        }
    }
}

impl std::error::Error for Error {}
