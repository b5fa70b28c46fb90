use std::collections::{BTreeMap, VecDeque};

use crate::{Frame, Handle};

/// Number of SyncRequest/SyncResponse round trips required before a peer
/// transitions from `Initiating` to `Connected`.
pub const NUM_TO_SYNC: u8 = 4;

/// How many RTT samples [`PeerStats`] keeps for jitter/average reporting.
const RTT_HISTORY: usize = 10;

/// How far behind the locally-acknowledged frame a peer's session-health
/// entry may lag before it is evicted.
pub const SESSION_HEALTH_EVICTION_WINDOW: Frame = 128;

/// Defines how an actor participates in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerType {
    /// Plays on this device; contributes local input.
    Local,
    /// Plays on a remote device; requires a handshake before its input
    /// arrives.
    Remote,
    /// Observes a remote device's confirmed inputs; never predicts, never
    /// rolls back, and never contributes input.
    Spectator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerStatus {
    Initiating,
    Connected,
    Disconnected,
}

/// Round-trip-time and liveness bookkeeping for one peer.
#[derive(Debug, Clone, Default)]
pub struct PeerStats {
    pub rtt_samples: VecDeque<u32>,
    pub last_acked_frame: Frame,
    pub last_sent_sync_ms: u64,
    pub last_received_message_ms: u64,
    pub last_network_check_ms: u64,
}

impl PeerStats {
    pub fn push_rtt(&mut self, rtt_ms: u32) {
        self.rtt_samples.push_back(rtt_ms);
        while self.rtt_samples.len() > RTT_HISTORY {
            self.rtt_samples.pop_front();
        }
    }

    pub fn last_rtt(&self) -> u32 {
        self.rtt_samples.back().copied().unwrap_or(0)
    }

    pub fn avg_rtt(&self) -> f32 {
        if self.rtt_samples.is_empty() {
            return 0.0;
        }
        self.rtt_samples.iter().sum::<u32>() as f32 / self.rtt_samples.len() as f32
    }

    pub fn jitter_ms(&self) -> f32 {
        if self.rtt_samples.len() < 2 {
            return 0.0;
        }
        let avg = self.avg_rtt();
        let variance = self
            .rtt_samples
            .iter()
            .map(|&v| (v as f32 - avg).powi(2))
            .sum::<f32>()
            / self.rtt_samples.len() as f32;
        variance.sqrt()
    }
}

/// Derived, read-only network statistics exposed through the public control
/// surface's `network_stats` call.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkStats {
    pub last_rtt_ms: u32,
    pub avg_rtt_ms: f32,
    pub jitter_ms: f32,
}

impl From<&PeerStats> for NetworkStats {
    fn from(stats: &PeerStats) -> Self {
        Self {
            last_rtt_ms: stats.last_rtt(),
            avg_rtt_ms: stats.avg_rtt(),
            jitter_ms: stats.jitter_ms(),
        }
    }
}

/// A remote or spectator actor: its connection state machine, handshake
/// progress, address, and per-frame checksum reports from that peer.
///
/// Local actors do not get a `Peer` record — they have no connection state,
/// only an entry in the sync system's input buffers.
#[derive(Debug, Clone)]
pub struct Peer<A> {
    pub handle: Handle,
    pub player_type: PlayerType,
    pub address: A,
    /// This session's own magic, stamped on outgoing packets to this peer.
    pub session_magic: u16,
    /// The peer's own session magic, learned from its `SyncRequest`/
    /// `SyncResponse`; stamped onto outgoing packets addressed to them so
    /// they can validate the packet is meant for their session.
    pub peer_magic: u16,
    pub sync_num: u8,
    pub status: PeerStatus,
    pub stats: PeerStats,
    pub session_health: BTreeMap<Frame, u32>,
    pub network_health_pending: bool,
    /// The locally-owned player handles this remote peer supplies input for.
    pub owns_handles: Vec<Handle>,
}

impl<A> Peer<A> {
    pub fn new(handle: Handle, player_type: PlayerType, address: A, session_magic: u16) -> Self {
        Self {
            handle,
            player_type,
            address,
            session_magic,
            peer_magic: 0,
            sync_num: 0,
            status: PeerStatus::Initiating,
            stats: PeerStats::default(),
            session_health: BTreeMap::new(),
            network_health_pending: false,
            owns_handles: Vec::new(),
        }
    }

    pub fn evict_stale_health(&mut self) {
        let cutoff = self.stats.last_acked_frame - SESSION_HEALTH_EVICTION_WINDOW;
        self.session_health.retain(|&frame, _| frame >= cutoff);
    }
}
