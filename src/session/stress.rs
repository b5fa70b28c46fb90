use crate::config::Config;
use crate::error::Error;
use crate::events::{GameEvent, GameEventPool, SessionEvent, SessionEventPool};
use crate::storage::StateStorage;
use crate::sync::SyncSystem;
use crate::{Frame, Handle};

/// Runs every registered player locally with no networking, periodically
/// rolling back `check_distance` frames and resimulating forward into a
/// shadow save ring to verify the simulation is actually deterministic.
///
/// The comparison itself is deferred to the following tick: the shadow
/// saves requested on the checking tick are only filled in by the embedder
/// after it receives that tick's event batch, so there is nothing to
/// compare against until the next call. A mismatch is advisory, like any
/// other desync: it is reported through `session_events()`, not by halting
/// the session.
pub struct StressSession {
    config: Config,
    sync: SyncSystem,
    storage: StateStorage,
    shadow: StateStorage,
    game_events: GameEventPool,
    session_events: SessionEventPool,
    locals: Vec<Handle>,
    pending_check: Option<(Frame, Frame)>,
}

impl StressSession {
    pub(crate) fn new(config: Config) -> Self {
        let window = config.check_distance.max(1) + 2;
        Self {
            sync: SyncSystem::new(config.num_players, config.input_size, config.input_buffer_capacity(), 0),
            storage: StateStorage::new(window, config.state_size),
            shadow: StateStorage::new(window, config.state_size),
            game_events: GameEventPool::new(),
            session_events: SessionEventPool::new(),
            locals: (0..config.num_players as Handle).collect(),
            pending_check: None,
            config,
        }
    }

    /// Drains the desync notifications produced by the most recent
    /// [`Self::update_session`] call.
    pub fn session_events(&mut self) -> Vec<SessionEvent> {
        self.session_events.drain()
    }

    /// Queues `bytes` as player `handle`'s input for the current frame.
    /// Every local handle must supply input before calling
    /// [`Self::update_session`], since the stress session never predicts.
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
        Ok(())
    }

    /// Advances by one frame and, every `check_distance` frames, verifies
    /// the previous check's resimulation against what was actually saved.
    /// A disagreement is reported through [`Self::session_events`] as a
    /// [`SessionEvent::DesyncDetected`]; the session keeps running.
    pub fn update_session(&mut self) -> Result<Vec<GameEvent>, Error> {
        self.game_events.reset();
        self.session_events.reset();

        if let Some((start, up_to)) = self.pending_check.take() {
            for frame in start..up_to {
                let (_, _, local_checksum) = self.storage.get(frame).load();
                let (_, _, remote_checksum) = self.shadow.get(frame).load();
                if local_checksum != remote_checksum {
                    self.session_events.push(SessionEvent::DesyncDetected {
                        frame,
                        remote_handle: 0,
                        local_checksum,
                        remote_checksum,
                    });
                }
            }
            let cell = self.storage.get(up_to);
            self.game_events.push(GameEvent::Load { frame: up_to, cell });
        }

        let Some((frame, inputs)) = self.sync.get_current_inputs() else {
            return Ok(self.game_events.drain());
        };
        self.game_events.push(GameEvent::Advance {
            frame,
            inputs,
            rolling_back: false,
        });
        let cell = self.storage.get(frame);
        self.game_events.push(GameEvent::Save { frame, cell });
        self.sync.increment_frame();

        if self.config.check_distance > 0
            && frame >= self.config.check_distance as Frame
            && frame % self.config.check_distance as Frame == 0
        {
            let start = frame - self.config.check_distance as Frame;
            let load_cell = self.storage.get(start);
            self.game_events.push(GameEvent::Load { frame: start, cell: load_cell });
            let mut f = start;
            while f < frame {
                if let Some(replay_inputs) = self.sync.get_spectator_inputs(f) {
                    self.game_events.push(GameEvent::Advance {
                        frame: f,
                        inputs: replay_inputs,
                        rolling_back: true,
                    });
                }
                let shadow_cell = self.shadow.get(f);
                self.game_events.push(GameEvent::Save { frame: f, cell: shadow_cell });
                f += 1;
            }
            self.pending_check = Some((start, frame));
        }

        Ok(self.game_events.drain())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn deterministic_players_never_mismatch() {
        let config = Config {
            num_players: 1,
            check_distance: 4,
            input_size: 1,
            ..Config::default()
        }
        .validate()
        .unwrap();
        let mut session = StressSession::new(config);
        for tick in 0u8..20 {
            session.add_local_input(0, &[tick]).unwrap();
            let events = session.update_session().unwrap();
            for event in events {
                if let GameEvent::Save { cell, frame } = event {
                    // a deterministic simulation's checksum is a pure
                    // function of the frame, not of wall-clock state.
                    cell.save(frame, vec![frame as u8], frame as u32);
                }
                if let GameEvent::Load { cell, frame } = event {
                    assert_eq!(cell.frame(), frame);
                }
            }
            assert!(session.session_events().is_empty());
        }
    }
}
