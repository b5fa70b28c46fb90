//! # synframe
//! synframe is a rollback netcode session core for deterministic,
//! frame-synchronous multiplayer simulations. It drives input exchange,
//! prediction, rollback/resimulation, and peer health over a transport the
//! embedder supplies, and hands back a list of requests — advance, save,
//! load — for the embedder to fulfill, rather than calling back into it.

#![forbid(unsafe_code)]

pub use config::Config;
pub use error::Error;
pub use events::{GameEvent, SessionEvent};
pub use input::GameInput;
pub use net::transport::NonBlockingSocket;
pub use player::{NetworkStats, PlayerType};
pub use session::{GameSession, SessionBuilder, SessionKind, SpectatorSession};
#[cfg(feature = "sync_test")]
pub use session::StressSession;
pub use storage::StateCell;

pub(crate) mod advantage;
pub(crate) mod config;
pub(crate) mod error;
pub(crate) mod events;
pub(crate) mod input;
pub(crate) mod net {
    pub(crate) mod message_system;
    pub(crate) mod transport;
    pub(crate) mod wire;
}
pub(crate) mod player;
pub(crate) mod session {
    pub(crate) mod builder;
    pub(crate) mod game;
    pub(crate) mod spectator;
    #[cfg(feature = "sync_test")]
    pub(crate) mod stress;

    pub use builder::{SessionBuilder, SessionKind};
    pub use game::GameSession;
    pub use spectator::SpectatorSession;
    #[cfg(feature = "sync_test")]
    pub use stress::StressSession;
}
pub(crate) mod storage;
pub(crate) mod sync;

/// Internally, -1 represents no frame / an invalid frame. Ring buffers index
/// by `((frame % capacity) + capacity) % capacity` so negative frames (the
/// handshake bootstrap, mainly) never panic.
pub const NULL_FRAME: i32 = -1;

pub type Frame = i32;
pub type Handle = i32;
