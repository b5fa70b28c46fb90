use crate::config::Config;
use crate::error::Error;
use crate::player::PlayerType;
use crate::session::game::GameSession;
use crate::session::spectator::SpectatorSession;
#[cfg(feature = "sync_test")]
use crate::session::stress::StressSession;
use crate::Handle;

/// Which of the three shared engines a built session will run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Game,
    Spectator,
    Stress,
}

enum Actor<A> {
    Local,
    Remote(A),
    Spectator(A),
}

/// Accumulates configuration and actors before producing a started session.
/// Configuration and actor-registration errors are returned eagerly rather
/// than deferred to the first `update_session` call.
pub struct SessionBuilder<A> {
    kind: SessionKind,
    config: Config,
    actors: Vec<Actor<A>>,
}

impl<A> SessionBuilder<A> {
    pub fn new(kind: SessionKind) -> Self {
        Self {
            kind,
            config: Config::default(),
            actors: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: Config) -> Result<Self, Error> {
        self.config = config.validate()?;
        Ok(self)
    }

    /// Registers an actor and returns its handle. Locals and remotes occupy
    /// `[0, num_players)`; spectators occupy
    /// `[num_players, num_players + max_spectators)`.
    pub fn add_actor(&mut self, player_type: PlayerType, address: Option<A>) -> Result<Handle, Error> {
        match player_type {
            PlayerType::Spectator => {
                let spectator_count = self
                    .actors
                    .iter()
                    .filter(|a| matches!(a, Actor::Spectator(_)))
                    .count();
                if spectator_count >= self.config.max_spectators {
                    return Err(Error::TooManySpectators);
                }
                let address = address.ok_or(Error::MissingAddress)?;
                let handle = (self.config.num_players + spectator_count) as Handle;
                self.actors.push(Actor::Spectator(address));
                Ok(handle)
            }
            PlayerType::Local | PlayerType::Remote => {
                let player_count = self
                    .actors
                    .iter()
                    .filter(|a| !matches!(a, Actor::Spectator(_)))
                    .count();
                if player_count >= self.config.num_players {
                    return Err(Error::TooManyPlayers);
                }
                let handle = player_count as Handle;
                if player_type == PlayerType::Remote {
                    let address = address.ok_or(Error::MissingAddress)?;
                    self.actors.push(Actor::Remote(address));
                } else {
                    self.actors.push(Actor::Local);
                }
                Ok(handle)
            }
        }
    }

    pub fn start_game(self) -> Result<GameSession<A>, Error>
    where
        A: Clone + PartialEq,
    {
        self.require_kind(SessionKind::Game)?;
        Ok(GameSession::new(self.config, self.into_actor_lists()))
    }

    pub fn start_spectator(self) -> Result<SpectatorSession<A>, Error>
    where
        A: Clone + PartialEq,
    {
        self.require_kind(SessionKind::Spectator)?;
        Ok(SpectatorSession::new(self.config, self.into_actor_lists()))
    }

    #[cfg(feature = "sync_test")]
    pub fn start_stress(self) -> Result<StressSession, Error> {
        self.require_kind(SessionKind::Stress)?;
        for actor in &self.actors {
            if !matches!(actor, Actor::Local) {
                return Err(Error::InvalidRequest {
                    info: "stress sessions only support local players".to_string(),
                });
            }
        }
        Ok(StressSession::new(self.config))
    }

    fn require_kind(&self, kind: SessionKind) -> Result<(), Error> {
        if self.kind != kind {
            return Err(Error::InvalidRequest {
                info: "builder was not configured for this session kind".to_string(),
            });
        }
        Ok(())
    }

    fn into_actor_lists(self) -> ActorLists<A> {
        let mut locals = Vec::new();
        let mut remotes = Vec::new();
        let mut spectators = Vec::new();
        let mut player_handle = 0;
        let mut spectator_handle = self.config.num_players as Handle;
        for actor in self.actors {
            match actor {
                Actor::Local => {
                    locals.push(player_handle);
                    player_handle += 1;
                }
                Actor::Remote(addr) => {
                    remotes.push((player_handle, addr));
                    player_handle += 1;
                }
                Actor::Spectator(addr) => {
                    spectators.push((spectator_handle, addr));
                    spectator_handle += 1;
                }
            }
        }
        ActorLists { locals, remotes, spectators }
    }
}

pub(crate) struct ActorLists<A> {
    pub locals: Vec<Handle>,
    pub remotes: Vec<(Handle, A)>,
    pub spectators: Vec<(Handle, A)>,
}
