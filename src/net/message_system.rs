use std::collections::{BTreeMap, HashSet};

use log::warn;
use rand::Rng;

use crate::events::SessionEventPool;
use crate::net::transport::NonBlockingSocket;
use crate::net::wire::{
    InputAckBody, InputsBody, NetworkHealthBody, Packet, SessionHealthBody, SyncBody,
};
use crate::player::{NetworkStats, Peer, PeerStatus, PlayerType, NUM_TO_SYNC, SESSION_HEALTH_EVICTION_WINDOW};
use crate::sync::SyncSystem;
use crate::{Frame, Handle, SessionEvent, NULL_FRAME};

pub const SYNC_MSG_DELAY_MS: u64 = 200;
pub const DISCONNECT_TIMEOUT_MS: u64 = 5000;
pub const NET_CHECK_DELAY_MS: u64 = 500;
pub const MAX_INPUT_QUEUE_SIZE: usize = 64;
pub const MAX_INPUT_SIZE: usize = 512;

/// Owns every remote/spectator connection and drives the per-peer state
/// machine, handshake, input exchange, acknowledgment, desync detection and
/// health probes. A single instance services the whole session, mirroring
/// the single orchestrator the source system models this on, rather than
/// one independent state machine per endpoint.
pub struct MessageSystem<A> {
    input_size: usize,
    session_magic: u16,
    locals: Vec<Handle>,
    remotes: Vec<Peer<A>>,
    spectators: Vec<Peer<A>>,
    last_added_input: Frame,
    pending_output: Vec<(A, Vec<u8>)>,
    local_health: BTreeMap<Frame, u32>,
}

impl<A: Clone + PartialEq> MessageSystem<A> {
    pub fn new(input_size: usize) -> Self {
        Self {
            input_size,
            session_magic: rand::thread_rng().gen(),
            locals: Vec::new(),
            remotes: Vec::new(),
            spectators: Vec::new(),
            last_added_input: NULL_FRAME,
            pending_output: Vec::new(),
            local_health: BTreeMap::new(),
        }
    }

    pub fn add_local(&mut self, handle: Handle) {
        self.locals.push(handle);
    }

    pub fn add_remote(&mut self, handle: Handle, address: A, owns: Vec<Handle>) {
        let mut peer = Peer::new(handle, PlayerType::Remote, address, self.session_magic);
        peer.owns_handles = owns;
        self.remotes.push(peer);
    }

    pub fn add_spectator(&mut self, handle: Handle, address: A) {
        let peer = Peer::new(handle, PlayerType::Spectator, address, self.session_magic);
        self.spectators.push(peer);
    }

    pub fn session_magic(&self) -> u16 {
        self.session_magic
    }

    pub fn remotes(&self) -> &[Peer<A>] {
        &self.remotes
    }

    pub fn spectators(&self) -> &[Peer<A>] {
        &self.spectators
    }

    pub fn network_stats(&self, handle: Handle) -> Option<NetworkStats> {
        self.remotes
            .iter()
            .chain(self.spectators.iter())
            .find(|p| p.handle == handle)
            .map(|p| NetworkStats::from(&p.stats))
    }

    fn find_peer_mut(&mut self, addr: &A) -> Option<&mut Peer<A>> {
        self.remotes
            .iter_mut()
            .chain(self.spectators.iter_mut())
            .find(|p| &p.address == addr)
    }

    /// All actors we have registered have completed the handshake.
    pub fn all_connected(&self) -> bool {
        self.remotes
            .iter()
            .chain(self.spectators.iter())
            .all(|p| p.status == PeerStatus::Connected)
    }

    /// Resends `SyncRequest` to any peer still in `Initiating` at most every
    /// `SYNC_MSG_DELAY_MS`.
    pub fn drive_handshake(&mut self, now_ms: u64) {
        let magic = self.session_magic;
        for peer in self.remotes.iter_mut().chain(self.spectators.iter_mut()) {
            if peer.status != PeerStatus::Initiating {
                continue;
            }
            if now_ms.saturating_sub(peer.stats.last_sent_sync_ms) < SYNC_MSG_DELAY_MS {
                continue;
            }
            peer.stats.last_sent_sync_ms = now_ms;
            let addr = peer.address.clone();
            self.pending_output.push((
                addr,
                Packet::SyncRequest(SyncBody { rng_data: magic }).encode(0),
            ));
        }
    }

    fn record_sync_progress(peer: &mut Peer<A>, events: &mut SessionEventPool) {
        if peer.status != PeerStatus::Initiating {
            return;
        }
        peer.sync_num = (peer.sync_num + 1).min(NUM_TO_SYNC);
        events.push(SessionEvent::PlayerSyncing {
            handle: peer.handle,
            current: peer.sync_num,
            total: NUM_TO_SYNC,
        });
        if peer.sync_num >= NUM_TO_SYNC {
            peer.status = PeerStatus::Connected;
            events.push(SessionEvent::PlayerConnected { handle: peer.handle });
        }
    }

    /// Receives every packet available on `socket` and dispatches it,
    /// feeding confirmed remote input into `sync` and acknowledging it.
    #[allow(clippy::too_many_arguments)]
    pub fn poll(
        &mut self,
        socket: &mut dyn NonBlockingSocket<A>,
        sync: &mut SyncSystem,
        session_events: &mut SessionEventPool,
        advantage: &mut crate::advantage::AdvantageHistory,
        local_frame_advantage: i8,
        num_players: usize,
        now_ms: u64,
    ) {
        let mut acked_this_tick: HashSet<Frame> = HashSet::new();
        let magic = self.session_magic;

        for (addr, bytes) in socket.receive_all() {
            let (header, packet) = match Packet::decode(&bytes) {
                Ok(v) => v,
                Err(e) => {
                    warn!("dropping malformed packet: {e}");
                    continue;
                }
            };

            if header.magic != magic && !matches!(packet, Packet::SyncRequest(_)) {
                warn!("dropping packet with mismatched session magic");
                continue;
            }

            if let Some(peer) = self.find_peer_mut(&addr) {
                peer.stats.last_received_message_ms = now_ms;
            }

            match packet {
                Packet::SyncRequest(body) => {
                    if let Some(peer) = self.find_peer_mut(&addr) {
                        peer.peer_magic = body.rng_data;
                        Self::record_sync_progress(peer, session_events);
                        let reply_magic = body.rng_data;
                        self.pending_output.push((
                            addr,
                            Packet::SyncResponse(SyncBody { rng_data: magic }).encode(reply_magic),
                        ));
                    }
                }
                Packet::SyncResponse(body) => {
                    if let Some(peer) = self.find_peer_mut(&addr) {
                        peer.peer_magic = body.rng_data;
                        Self::record_sync_progress(peer, session_events);
                    }
                }
                Packet::Inputs(body) => {
                    self.on_inputs(&addr, body, sync, local_frame_advantage);
                }
                Packet::SpectatorInputs(body) => {
                    self.on_spectator_inputs(body, sync, num_players);
                }
                Packet::InputAck(body) => {
                    if let Some(peer) = self.find_peer_mut(&addr) {
                        peer.stats.last_acked_frame = peer.stats.last_acked_frame.max(body.ack_frame);
                        if acked_this_tick.insert(body.ack_frame) {
                            advantage.add_remote_advantage(body.frame_advantage);
                        }
                    }
                }
                Packet::SessionHealth(body) => {
                    if let Some(peer) = self.find_peer_mut(&addr) {
                        peer.session_health.insert(body.frame, body.checksum);
                        peer.evict_stale_health();
                    }
                }
                Packet::NetworkHealth(body) => {
                    self.on_network_health(&addr, body, now_ms);
                }
            }
        }
    }

    fn on_inputs(
        &mut self,
        addr: &A,
        body: InputsBody,
        sync: &mut SyncSystem,
        local_frame_advantage: i8,
    ) {
        let Some(idx) = self.remotes.iter().position(|p| &p.address == addr) else {
            return;
        };
        let owns = self.remotes[idx].owns_handles.clone();
        if owns.is_empty() || body.input_count == 0 {
            return;
        }
        let row_size = self.input_size * owns.len();
        for i in 0..body.input_count as usize {
            let frame = body.start_frame + i as Frame;
            let offset = i * row_size;
            if offset + row_size > body.inputs.len() {
                break;
            }
            for (j, &handle) in owns.iter().enumerate() {
                let start = offset + j * self.input_size;
                let chunk = &body.inputs[start..start + self.input_size];
                sync.add_remote_input(handle, frame, chunk);
            }
        }

        let magic = self.remotes[idx].peer_magic;
        let addr = self.remotes[idx].address.clone();
        let ack_handle = owns[0];
        let ack_frame = sync.get_last_received_from(ack_handle);
        self.pending_output.push((
            addr,
            Packet::InputAck(InputAckBody {
                ack_frame,
                frame_advantage: local_frame_advantage,
            })
            .encode(magic),
        ));
    }

    fn on_spectator_inputs(&mut self, body: InputsBody, sync: &mut SyncSystem, num_players: usize) {
        if body.input_count == 0 || num_players == 0 {
            return;
        }
        let row_size = self.input_size * num_players;
        for i in 0..body.input_count as usize {
            let frame = body.start_frame + i as Frame;
            let offset = i * row_size;
            if offset + row_size > body.inputs.len() {
                break;
            }
            for j in 0..num_players {
                let start = offset + j * self.input_size;
                let chunk = &body.inputs[start..start + self.input_size];
                sync.add_remote_input(j as Handle, frame, chunk);
            }
        }
    }

    fn on_network_health(&mut self, addr: &A, body: NetworkHealthBody, now_ms: u64) {
        let Some(peer) = self.find_peer_mut(addr) else {
            return;
        };
        if !body.received {
            let magic = peer.peer_magic;
            let addr = peer.address.clone();
            self.pending_output.push((
                addr,
                Packet::NetworkHealth(NetworkHealthBody {
                    send_time: body.send_time,
                    received: true,
                })
                .encode(magic),
            ));
        } else {
            let rtt = now_ms.saturating_sub(body.send_time) as u32;
            peer.stats.push_rtt(rtt);
        }
    }

    /// Assembles and enqueues outbound input packets for remotes and, if any
    /// are registered, spectators, splitting so no packet body exceeds
    /// `MAX_INPUT_SIZE` bytes of payload. Skips peers that have nothing new
    /// to send since the last assembly.
    pub fn assemble_outbound_inputs(&mut self, sync: &mut SyncSystem) {
        if self.locals.is_empty() || self.last_added_input == NULL_FRAME {
            return;
        }
        let last = self.last_added_input;
        let row_size = self.input_size * self.locals.len();
        for idx in 0..self.remotes.len() {
            let (start, magic, addr) = {
                let peer = &self.remotes[idx];
                if peer.status == PeerStatus::Disconnected {
                    continue;
                }
                let floor = (last - MAX_INPUT_QUEUE_SIZE as Frame + 1).max(0);
                let start = (peer.stats.last_acked_frame + 1).max(floor);
                if start > last {
                    continue;
                }
                (start, peer.peer_magic, peer.address.clone())
            };
            let locals = self.locals.clone();
            Self::send_input_chunks(&mut self.pending_output, addr, magic, start, last, row_size, |frame| {
                let mut bytes = Vec::with_capacity(row_size);
                for &h in &locals {
                    bytes.extend_from_slice(&sync.get_local_input(h, frame).bytes);
                }
                bytes
            });
        }

        if !self.spectators.is_empty() {
            let ceiling = sync.get_min_received_frame();
            let spec_row_size = self.input_size * sync.num_players();
            for idx in 0..self.spectators.len() {
                let (start, magic, addr) = {
                    let peer = &self.spectators[idx];
                    if peer.status == PeerStatus::Disconnected || ceiling == NULL_FRAME {
                        continue;
                    }
                    let floor = (ceiling - MAX_INPUT_QUEUE_SIZE as Frame + 1).max(0);
                    let start = (peer.stats.last_acked_frame + 1).max(floor);
                    if start > ceiling {
                        continue;
                    }
                    (start, peer.peer_magic, peer.address.clone())
                };
                Self::send_input_chunks(
                    &mut self.pending_output,
                    addr,
                    magic,
                    start,
                    ceiling,
                    spec_row_size,
                    |frame| sync.get_spectator_inputs(frame).unwrap_or_default(),
                );
            }
        }
    }

    fn send_input_chunks(
        pending_output: &mut Vec<(A, Vec<u8>)>,
        addr: A,
        magic: u16,
        start: Frame,
        last: Frame,
        row_size: usize,
        mut row_for_frame: impl FnMut(Frame) -> Vec<u8>,
    ) {
        let frames_per_packet = (MAX_INPUT_SIZE / row_size.max(1)).max(1) as Frame;
        let mut frame = start;
        while frame <= last {
            let chunk_end = (frame + frames_per_packet - 1).min(last);
            let mut bytes = Vec::new();
            let mut count = 0u16;
            let mut f = frame;
            while f <= chunk_end {
                bytes.extend_from_slice(&row_for_frame(f));
                count += 1;
                f += 1;
            }
            let body = InputsBody {
                start_frame: frame,
                input_count: count,
                total_size: bytes.len() as u16,
                inputs: bytes,
            };
            pending_output.push((addr.clone(), Packet::Inputs(body).encode(magic)));
            frame = chunk_end + 1;
        }
    }

    pub fn mark_local_frame(&mut self, frame: Frame) {
        self.last_added_input = frame;
    }

    pub fn send_network_health_if_due(&mut self, now_ms: u64) {
        let mut due: Vec<(u16, A)> = Vec::new();
        for peer in self.remotes.iter_mut().chain(self.spectators.iter_mut()) {
            if peer.status != PeerStatus::Connected {
                continue;
            }
            if now_ms.saturating_sub(peer.stats.last_network_check_ms) < NET_CHECK_DELAY_MS {
                continue;
            }
            peer.stats.last_network_check_ms = now_ms;
            due.push((peer.peer_magic, peer.address.clone()));
        }
        for (magic, addr) in due {
            self.pending_output.push((
                addr,
                Packet::NetworkHealth(NetworkHealthBody {
                    send_time: now_ms,
                    received: false,
                })
                .encode(magic),
            ));
        }
    }

    pub fn send_session_health(&mut self, frame: Frame, checksum: u32) {
        self.local_health.insert(frame, checksum);
        let cutoff = frame - SESSION_HEALTH_EVICTION_WINDOW;
        self.local_health.retain(|&f, _| f >= cutoff);
        let magic_and_addrs: Vec<(u16, A)> = self
            .remotes
            .iter()
            .filter(|p| p.status == PeerStatus::Connected)
            .map(|p| (p.peer_magic, p.address.clone()))
            .collect();
        for (magic, addr) in magic_and_addrs {
            self.pending_output.push((
                addr,
                Packet::SessionHealth(SessionHealthBody { frame, checksum }).encode(magic),
            ));
        }
    }

    /// Cross-references the locally-computed checksums against every
    /// peer's reported `session_health` map, emitting `DesyncDetected` for
    /// any disagreement at a frame both sides have reported. Each entry is
    /// consumed as soon as it is compared, match or mismatch, so a real
    /// desync is reported exactly once rather than every tick until it
    /// ages out of the eviction window.
    pub fn cross_reference_health(&mut self, session_events: &mut SessionEventPool) {
        let local_health = &self.local_health;
        for peer in self.remotes.iter_mut() {
            let handle = peer.handle;
            peer.session_health.retain(|&frame, &mut remote_checksum| {
                let Some(&local_checksum) = local_health.get(&frame) else {
                    return true;
                };
                if local_checksum != remote_checksum {
                    session_events.push(SessionEvent::DesyncDetected {
                        frame,
                        remote_handle: handle,
                        local_checksum,
                        remote_checksum,
                    });
                }
                false
            });
        }
    }

    /// Any connected peer silent for longer than `DISCONNECT_TIMEOUT_MS`
    /// transitions to `Disconnected`.
    pub fn handle_too_far_behind(&mut self, now_ms: u64, session_events: &mut SessionEventPool) {
        for peer in self.remotes.iter_mut().chain(self.spectators.iter_mut()) {
            if peer.status != PeerStatus::Connected {
                continue;
            }
            if now_ms.saturating_sub(peer.stats.last_received_message_ms) > DISCONNECT_TIMEOUT_MS {
                peer.status = PeerStatus::Disconnected;
                session_events.push(SessionEvent::PlayerDisconnected { handle: peer.handle });
            }
        }
    }

    pub fn flush(&mut self, socket: &mut dyn NonBlockingSocket<A>) {
        for (addr, bytes) in self.pending_output.drain(..) {
            socket.send_to(&addr, &bytes);
        }
    }

    pub fn disconnected_remotes(&self) -> impl Iterator<Item = &Peer<A>> {
        self.remotes.iter().filter(|p| p.status == PeerStatus::Disconnected)
    }
}
