use crate::advantage::AdvantageHistory;
use crate::config::Config;
use crate::events::{GameEvent, GameEventPool, SessionEvent, SessionEventPool};
use crate::net::message_system::MessageSystem;
use crate::net::transport::NonBlockingSocket;
use crate::player::NetworkStats;
use crate::session::builder::ActorLists;
use crate::sync::SyncSystem;
use crate::{Frame, Handle, NULL_FRAME};

/// Pause onset is only re-evaluated every 600 frames (10 seconds at 60fps);
/// catching back up is checked every tick regardless of this boundary.
const PAUSE_CHECK_INTERVAL: Frame = 600;

/// Observes a host's confirmed input stream over a jitter buffer of
/// `spectator_delay` frames. Never predicts, never saves state, never
/// rolls back, and never contributes input of its own.
pub struct SpectatorSession<A> {
    config: Config,
    sync: SyncSystem,
    msg: MessageSystem<A>,
    advantage: AdvantageHistory,
    game_events: GameEventPool,
    session_events: SessionEventPool,
    started: bool,
    paused: bool,
    play_frame: Frame,
}

impl<A: Clone + PartialEq> SpectatorSession<A> {
    pub(crate) fn new(config: Config, actors: ActorLists<A>) -> Self {
        let mut msg = MessageSystem::new(config.input_size);
        let owns: Vec<Handle> = (0..config.num_players as Handle).collect();
        for (_, addr) in actors.remotes {
            msg.add_remote(0, addr, owns.clone());
        }
        Self {
            sync: SyncSystem::new(config.num_players, config.input_size, config.input_buffer_capacity(), 0),
            msg,
            advantage: AdvantageHistory::new(),
            game_events: GameEventPool::new(),
            session_events: SessionEventPool::new(),
            started: false,
            paused: false,
            play_frame: NULL_FRAME,
            config,
        }
    }

    pub fn network_stats(&self, handle: Handle) -> Option<NetworkStats> {
        self.msg.network_stats(handle)
    }

    pub fn session_events(&mut self) -> Vec<SessionEvent> {
        self.session_events.drain()
    }

    pub fn update_session(&mut self, socket: &mut dyn NonBlockingSocket<A>, now_ms: u64) -> Vec<GameEvent> {
        self.session_events.reset();
        self.game_events.reset();

        self.msg.drive_handshake(now_ms);
        self.msg.poll(
            socket,
            &mut self.sync,
            &mut self.session_events,
            &mut self.advantage,
            0,
            self.config.num_players,
            now_ms,
        );
        self.msg.handle_too_far_behind(now_ms, &mut self.session_events);
        self.msg.send_network_health_if_due(now_ms);

        if !self.started {
            if self.msg.all_connected() {
                self.started = true;
                self.session_events.push(SessionEvent::SessionStarted);
            } else {
                self.msg.flush(socket);
                return self.game_events.drain();
            }
        }

        let min_received = self.sync.get_min_received_frame();

        if self.play_frame == NULL_FRAME {
            if min_received != NULL_FRAME && min_received >= self.config.spectator_delay as Frame {
                self.play_frame = 0;
            } else {
                self.msg.flush(socket);
                return self.game_events.drain();
            }
        }

        if self.should_delay_spectator(min_received) {
            self.msg.flush(socket);
            return self.game_events.drain();
        }

        if let Some(inputs) = self.sync.get_spectator_inputs(self.play_frame) {
            self.game_events.push(GameEvent::Advance {
                frame: self.play_frame,
                inputs,
                rolling_back: false,
            });
            self.play_frame += 1;
        }

        self.msg.flush(socket);
        self.game_events.drain()
    }

    /// Jitter-buffer gate: once paused, unpausing is checked every tick, but
    /// entering the pause is only decided on a 600-frame boundary, so a
    /// single slow packet doesn't stall playback immediately.
    fn should_delay_spectator(&mut self, min_received: Frame) -> bool {
        if self.config.spectator_delay == 0 {
            return false;
        }
        let delay = self.config.spectator_delay as Frame;
        let diff = min_received.saturating_sub(self.play_frame).max(0);

        if self.paused {
            if diff >= delay {
                self.paused = false;
                self.session_events.push(SessionEvent::SpectatorUnpaused);
                return false;
            }
            return true;
        }

        if self.play_frame % PAUSE_CHECK_INTERVAL == 0 {
            self.paused = diff < delay;
            if self.paused {
                self.session_events.push(SessionEvent::SpectatorPaused);
                return true;
            }
        }

        false
    }
}
