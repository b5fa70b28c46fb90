use crate::error::Error;

/// Default ring capacity for an input buffer (frames of history kept per player).
pub const DEFAULT_INPUT_BUFFER_SIZE: usize = 128;

/// Immutable-after-`start` session configuration.
///
/// Mirrors the data-only `Config` of the spec: this is plain data, not a
/// generic `trait Config { type Input; .. }` — inputs and state are opaque
/// byte buffers whose sizes are carried here, not encoded in the type system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub num_players: usize,
    pub max_spectators: usize,
    pub input_size: usize,
    pub state_size: usize,
    pub input_prediction_window: usize,
    pub spectator_delay: usize,
    pub limited_saving: bool,
    pub desync_detection: bool,
    /// Only consulted by the stress variant.
    pub check_distance: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_players: 2,
            max_spectators: 0,
            input_size: 4,
            state_size: 4096,
            input_prediction_window: 8,
            spectator_delay: 0,
            limited_saving: false,
            desync_detection: false,
            check_distance: 0,
        }
    }
}

impl Config {
    /// Validates the configuration and forces the
    /// `limited_saving => !desync_detection` invariant: when limited saving
    /// is on, rollback reconstructs from a single save point, so per-frame
    /// checksums are not available to compare.
    pub fn validate(mut self) -> Result<Self, Error> {
        if self.num_players == 0 {
            return Err(Error::InvalidRequest {
                info: "num_players must be at least 1".to_string(),
            });
        }
        if self.input_size == 0 {
            return Err(Error::InvalidRequest {
                info: "input_size must be at least 1".to_string(),
            });
        }
        if self.limited_saving && self.desync_detection {
            self.desync_detection = false;
        }
        Ok(self)
    }

    pub(crate) fn input_buffer_capacity(&self) -> usize {
        DEFAULT_INPUT_BUFFER_SIZE + self.spectator_delay
    }

    pub(crate) fn state_storage_capacity(&self) -> usize {
        if self.limited_saving {
            2
        } else {
            self.input_prediction_window + 2
        }
    }
}
