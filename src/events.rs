use crate::storage::StateCell;
use crate::{Frame, Handle};

/// A request from the library to the embedder, emitted during
/// `update_session`. The embedder must fulfill these in the order they are
/// returned.
#[derive(Debug, Clone)]
pub enum GameEvent {
    /// Advance the simulation by one frame using `inputs` (one
    /// `input_size`-byte row per player, in handle order).
    Advance {
        frame: Frame,
        inputs: Vec<u8>,
        rolling_back: bool,
    },
    /// Capture the current simulation state into `cell`.
    Save { frame: Frame, cell: StateCell },
    /// Restore the simulation from `cell`'s last saved state.
    Load { frame: Frame, cell: StateCell },
}

/// Out-of-band notifications about session/peer lifecycle, emitted
/// alongside [`GameEvent`]s but drained separately.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    PlayerSyncing { handle: Handle, current: u8, total: u8 },
    PlayerConnected { handle: Handle },
    PlayerDisconnected { handle: Handle },
    SessionStarted,
    SpectatorPaused,
    SpectatorUnpaused,
    DesyncDetected {
        frame: Frame,
        remote_handle: Handle,
        local_checksum: u32,
        remote_checksum: u32,
    },
}

/// A reset-and-reuse pool of events for one tick.
///
/// Matches the spec's pooling contract at the `Vec` level: `reset` clears
/// the backing storage without releasing its allocation, so steady-state
/// ticks do not allocate. Entries are valid to the caller until the next
/// `reset`.
#[derive(Debug, Default)]
pub struct EventPool<T> {
    events: Vec<T>,
}

impl<T> EventPool<T> {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn reset(&mut self) {
        self.events.clear();
    }

    pub fn push(&mut self, event: T) {
        self.events.push(event);
    }

    pub fn as_slice(&self) -> &[T] {
        &self.events
    }

    pub fn drain(&mut self) -> Vec<T> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

pub type GameEventPool = EventPool<GameEvent>;
pub type SessionEventPool = EventPool<SessionEvent>;
