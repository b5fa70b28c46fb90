use crate::advantage::AdvantageHistory;
use crate::config::Config;
use crate::error::Error;
use crate::events::{GameEvent, GameEventPool, SessionEvent, SessionEventPool};
use crate::net::message_system::MessageSystem;
use crate::net::transport::NonBlockingSocket;
use crate::player::NetworkStats;
use crate::session::builder::ActorLists;
use crate::storage::StateStorage;
use crate::sync::SyncSystem;
use crate::{Frame, Handle, NULL_FRAME};

/// A peer-to-peer session: predicts local frame advance ahead of confirmed
/// remote input, rolls back and resimulates on misprediction, and exchanges
/// confirmed input and (optionally) desync checksums with its peers.
///
/// This is the only variant that rolls back. A session with no remotes
/// still runs through the same machinery; it simply never has an incorrect
/// prediction to resolve, since its own input is always immediately known.
pub struct GameSession<A> {
    config: Config,
    sync: SyncSystem,
    storage: StateStorage,
    advantage: AdvantageHistory,
    msg: MessageSystem<A>,
    game_events: GameEventPool,
    session_events: SessionEventPool,
    started: bool,
    last_saved_frame: Frame,
    locals: Vec<Handle>,
}

impl<A: Clone + PartialEq> GameSession<A> {
    pub(crate) fn new(config: Config, actors: ActorLists<A>) -> Self {
        let mut msg = MessageSystem::new(config.input_size);
        for &h in &actors.locals {
            msg.add_local(h);
        }
        for (h, addr) in &actors.remotes {
            // every remote supplies exactly its own handle's input in a
            // two-or-more-player session; there is no host relay here.
            msg.add_remote(*h, addr.clone(), vec![*h]);
        }
        for (h, addr) in &actors.spectators {
            msg.add_spectator(*h, addr.clone());
        }
        Self {
            sync: SyncSystem::new(
                config.num_players,
                config.input_size,
                config.input_buffer_capacity(),
                config.input_prediction_window,
            ),
            storage: StateStorage::new(config.state_storage_capacity(), config.state_size),
            advantage: AdvantageHistory::new(),
            msg,
            game_events: GameEventPool::new(),
            session_events: SessionEventPool::new(),
            started: false,
            last_saved_frame: NULL_FRAME,
            locals: actors.locals,
            config,
        }
    }

    pub fn set_local_input_delay(&mut self, handle: Handle, delay: usize) -> Result<(), Error> {
        if !self.locals.contains(&handle) {
            return Err(Error::InvalidHandle);
        }
        self.sync.set_delay(handle, delay);
        Ok(())
    }

    /// Queues `bytes` as the local contribution for the current frame. Must
    /// be called once per local handle, every tick, before
    /// [`Self::update_session`].
    pub fn add_local_input(&mut self, handle: Handle, bytes: &[u8]) -> Result<(), Error> {
        if !self.locals.contains(&handle) {
            return Err(Error::InvalidHandle);
        }
        if bytes.len() != self.config.input_size {
            return Err(Error::InvalidRequest {
                info: "input does not match the configured input_size".to_string(),
            });
        }
        let frame = self.sync.current_frame();
        self.sync.add_local_input(handle, frame, bytes);
        self.msg.mark_local_frame(frame);
        Ok(())
    }

    pub fn network_stats(&self, handle: Handle) -> Option<NetworkStats> {
        self.msg.network_stats(handle)
    }

    /// Positive means the local side is running ahead of its peers and
    /// should consider slowing down; negative means it should speed up.
    pub fn frames_ahead(&self) -> f32 {
        self.advantage.get_average_advantage()
    }

    /// Drains and returns the session lifecycle events produced by the most
    /// recent [`Self::update_session`] call.
    pub fn session_events(&mut self) -> Vec<SessionEvent> {
        self.session_events.drain()
    }

    /// Advances the session's network and rollback machinery by one tick,
    /// returning the ordered list of requests the embedder must fulfill.
    pub fn update_session(&mut self, socket: &mut dyn NonBlockingSocket<A>, now_ms: u64) -> Vec<GameEvent> {
        self.session_events.reset();
        self.game_events.reset();

        self.msg.drive_handshake(now_ms);
        self.msg.poll(
            socket,
            &mut self.sync,
            &mut self.session_events,
            &mut self.advantage,
            self.advantage.get_local_advantage(),
            self.config.num_players,
            now_ms,
        );
        self.msg.handle_too_far_behind(now_ms, &mut self.session_events);

        let min_received = self.sync.get_min_received_frame();
        if min_received != NULL_FRAME {
            self.advantage
                .set_local_advantage(self.sync.current_frame() as i32 - min_received as i32);
        }
        self.advantage.update_history(self.sync.current_frame());

        self.msg.assemble_outbound_inputs(&mut self.sync);
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

        self.fill_disconnected_inputs();
        self.handle_rollback();
        self.handle_confirmed_frame_saving();

        if self.config.desync_detection && self.last_saved_frame != NULL_FRAME {
            let cell = self.storage.get(self.last_saved_frame);
            let (frame, _, checksum) = cell.load();
            if frame == self.last_saved_frame {
                self.msg.send_session_health(frame, checksum);
            }
        }
        self.msg.cross_reference_health(&mut self.session_events);

        if let Some((frame, inputs)) = self.sync.get_current_inputs() {
            self.game_events.push(GameEvent::Advance {
                frame,
                inputs,
                rolling_back: false,
            });
            if self.should_save_every_tick(frame) {
                let cell = self.storage.get(frame);
                self.game_events.push(GameEvent::Save { frame, cell });
                self.last_saved_frame = frame;
            }
            self.sync.increment_frame();
        }

        self.msg.flush(socket);
        self.game_events.drain()
    }

    /// Outside limited saving, every advance gets its own snapshot. Under
    /// limited saving, a multiplayer session instead relies on
    /// `handle_rollback`/`handle_confirmed_frame_saving` to keep the single
    /// save point fresh, but a local-only session never rolls back at all,
    /// so it still needs a direct periodic save to have anything to restart
    /// from, taken every `input_prediction_window` frames.
    fn should_save_every_tick(&self, frame: Frame) -> bool {
        if !self.config.limited_saving {
            return true;
        }
        self.msg.remotes().is_empty()
            && self.config.input_prediction_window > 0
            && frame % self.config.input_prediction_window as Frame == 0
    }

    fn fill_disconnected_inputs(&mut self) {
        let current = self.sync.current_frame();
        let zero = vec![0u8; self.config.input_size];
        let owners: Vec<Handle> = self
            .msg
            .disconnected_remotes()
            .flat_map(|p| p.owns_handles.iter().copied())
            .collect();
        for handle in owners {
            loop {
                let last = self.sync.get_last_received_from(handle);
                if last >= current - 1 {
                    break;
                }
                if !self.sync.add_remote_input(handle, last + 1, &zero) {
                    break;
                }
            }
        }
    }

    /// Implements the rollback procedure: on the first confirmed
    /// misprediction, reloads the last-known-good state and resimulates
    /// forward to the frame the session was about to advance to, requesting
    /// a fresh save at each resimulated frame (or only at the rollback
    /// frontier, under limited saving).
    fn handle_rollback(&mut self) {
        if self.config.input_prediction_window == 0 || self.msg.remotes().is_empty() {
            return;
        }

        if self.last_saved_frame == NULL_FRAME {
            // Bootstrap: capture frame -1 so the very first rollback has
            // something to reload from.
            let bootstrap_frame = self.sync.current_frame() - 1;
            self.sync.set_current_frame(bootstrap_frame);
            let cell = self.storage.get(bootstrap_frame);
            self.game_events.push(GameEvent::Save {
                frame: bootstrap_frame,
                cell,
            });
            self.last_saved_frame = bootstrap_frame;
            self.sync.increment_frame();
            return;
        }

        let min_incorrect = self.sync.get_min_incorrect_frame();
        if min_incorrect == NULL_FRAME {
            return;
        }

        let resume_at = self.sync.current_frame();
        let sync_frame = if self.config.limited_saving {
            self.last_saved_frame
        } else {
            min_incorrect - 1
        };
        let save_frontier = (resume_at - 1).min(min_incorrect);

        self.sync.set_current_frame(sync_frame);
        let load_cell = self.storage.get(sync_frame);
        self.game_events.push(GameEvent::Load {
            frame: sync_frame,
            cell: load_cell,
        });
        self.sync.increment_frame();

        while self.sync.current_frame() < resume_at {
            let frame = self.sync.current_frame();
            if let Some((f, inputs)) = self.sync.get_current_inputs() {
                self.game_events.push(GameEvent::Advance {
                    frame: f,
                    inputs,
                    rolling_back: true,
                });
                if !self.config.limited_saving || frame == save_frontier {
                    let cell = self.storage.get(frame);
                    self.game_events.push(GameEvent::Save { frame, cell });
                    self.last_saved_frame = frame;
                }
            }
            self.sync.increment_frame();
        }

        self.sync.clear_incorrect_up_to(resume_at - 1);
    }

    /// Under limited saving, periodically replaces the single save point
    /// with a resimulated, more-recently-confirmed frame so the next
    /// rollback does not have to resimulate an ever-growing tail.
    fn handle_confirmed_frame_saving(&mut self) {
        if !self.config.limited_saving || self.msg.remotes().is_empty() {
            return;
        }
        let resume_at = self.sync.current_frame();
        if resume_at - (self.last_saved_frame + 1) <= self.config.input_prediction_window as Frame {
            return;
        }
        let min_received = self.sync.get_min_received_frame();
        let target = (resume_at - 1).min(min_received);
        if target <= self.last_saved_frame {
            return;
        }

        let cell = self.storage.get(self.last_saved_frame);
        self.game_events.push(GameEvent::Load {
            frame: self.last_saved_frame,
            cell,
        });
        self.sync.set_current_frame(self.last_saved_frame + 1);

        while self.sync.current_frame() <= target {
            let frame = self.sync.current_frame();
            if let Some((f, inputs)) = self.sync.get_current_inputs() {
                self.game_events.push(GameEvent::Advance {
                    frame: f,
                    inputs,
                    rolling_back: true,
                });
            }
            if frame == target {
                let cell = self.storage.get(frame);
                self.game_events.push(GameEvent::Save { frame, cell });
                self.last_saved_frame = frame;
            }
            self.sync.increment_frame();
        }

        self.sync.set_current_frame(resume_at);
    }
}
