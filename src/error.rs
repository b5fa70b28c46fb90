use std::error::Error as StdError;
use std::fmt;
use std::fmt::Display;

/// All errors the public API can return.
///
/// Almost every runtime failure mode (malformed packets, peer timeouts,
/// desyncs) surfaces as an event instead of a [`Result`]; this enum only
/// covers the synchronous, caller-at-fault conditions raised directly from
/// configuration and actor-management calls.
#[derive(Debug, Clone, PartialEq, Hash)]
pub enum Error {
    /// The handle does not refer to a known actor.
    InvalidHandle,
    /// `num_players` player slots are already occupied.
    TooManyPlayers,
    /// `max_spectators` spectator slots are already occupied.
    TooManySpectators,
    /// A remote or spectator actor was added without an address.
    MissingAddress,
    /// You made an invalid request, usually by calling a function out of order.
    InvalidRequest {
        /// Further specifies why the request was invalid.
        info: String,
    },
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidHandle => write!(f, "the given handle does not refer to an actor"),
            Error::TooManyPlayers => write!(f, "no more player slots are available"),
            Error::TooManySpectators => write!(f, "no more spectator slots are available"),
            Error::MissingAddress => write!(f, "remote and spectator actors require an address"),
            Error::InvalidRequest { info } => write!(f, "invalid request: {info}"),
        }
    }
}

impl StdError for Error {}
