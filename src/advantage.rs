use crate::Frame;

const HISTORY_SIZE: usize = 26;

fn commit_index(frame: Frame) -> usize {
    frame.max(0) as usize % HISTORY_SIZE
}

/// Sliding windows of local and remote frame-advantage samples.
///
/// Two rings of size 26 hold signed per-frame samples; a third ring
/// accumulates raw remote-advantage reports between commits, and is
/// collapsed to its mean on every [`Self::update_history`] call.
#[derive(Debug)]
pub struct AdvantageHistory {
    local_frame_advantage: i8,
    local: [i8; HISTORY_SIZE],
    remote: [i8; HISTORY_SIZE],
    remote_samples: [i8; HISTORY_SIZE],
    remote_index: usize,
}

impl Default for AdvantageHistory {
    fn default() -> Self {
        Self {
            local_frame_advantage: 0,
            local: [0; HISTORY_SIZE],
            remote: [0; HISTORY_SIZE],
            remote_samples: [0; HISTORY_SIZE],
            remote_index: 0,
        }
    }
}

impl AdvantageHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clamps to the wire format's signed-8-bit `frame_advantage` range.
    pub fn set_local_advantage(&mut self, advantage: i32) {
        self.local_frame_advantage = advantage.clamp(i8::MIN as i32, i8::MAX as i32) as i8;
    }

    pub fn get_local_advantage(&self) -> i8 {
        self.local_frame_advantage
    }

    pub fn add_remote_advantage(&mut self, advantage: i8) {
        self.remote_samples[self.remote_index] = advantage;
        self.remote_index = (self.remote_index + 1) % HISTORY_SIZE;
    }

    /// Commits the pending local sample and the mean of the accumulated
    /// remote samples into both rings at the frame's committed index.
    pub fn update_history(&mut self, frame: Frame) {
        let idx = commit_index(frame);
        self.local[idx] = self.local_frame_advantage;
        let mean: f32 =
            self.remote_samples.iter().map(|&v| v as f32).sum::<f32>() / HISTORY_SIZE as f32;
        self.remote[idx] = mean.round().clamp(i8::MIN as f32, i8::MAX as f32) as i8;
    }

    /// `mean(local) - mean(remote)`: positive means the local side is ahead
    /// and should slow down, negative means it is behind and should speed up.
    pub fn get_average_advantage(&self) -> f32 {
        let local_mean: f32 = self.local.iter().map(|&v| v as f32).sum::<f32>() / HISTORY_SIZE as f32;
        let remote_mean: f32 = self.remote.iter().map(|&v| v as f32).sum::<f32>() / HISTORY_SIZE as f32;
        local_mean - remote_mean
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_advantage_starts_at_zero() {
        let history = AdvantageHistory::new();
        assert_eq!(history.get_average_advantage(), 0.0);
    }

    #[test]
    fn local_advantage_clamps_to_i8_range() {
        let mut history = AdvantageHistory::new();
        history.set_local_advantage(1000);
        assert_eq!(history.get_local_advantage(), i8::MAX);
        history.set_local_advantage(-1000);
        assert_eq!(history.get_local_advantage(), i8::MIN);
    }

    #[test]
    fn local_lead_reports_positive_advantage() {
        let mut history = AdvantageHistory::new();
        history.set_local_advantage(5);
        for frame in 0..HISTORY_SIZE as Frame {
            history.update_history(frame);
        }
        assert!(history.get_average_advantage() > 0.0);
    }
}
