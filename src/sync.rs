use crate::input::{GameInput, InputBuffer};
use crate::{Frame, Handle, NULL_FRAME};

/// Thin composition over one [`InputBuffer`] per player (locals and
/// remotes; spectators are never represented here — they only consume the
/// combined confirmed stream).
#[derive(Debug)]
pub struct SyncSystem {
    current_frame: Frame,
    input_size: usize,
    buffers: Vec<InputBuffer>,
}

impl SyncSystem {
    pub fn new(num_players: usize, input_size: usize, capacity: usize, prediction_window: usize) -> Self {
        Self {
            current_frame: 0,
            input_size,
            buffers: (0..num_players)
                .map(|_| InputBuffer::new(capacity, input_size, prediction_window))
                .collect(),
        }
    }

    pub fn current_frame(&self) -> Frame {
        self.current_frame
    }

    pub fn increment_frame(&mut self) {
        self.current_frame += 1;
    }

    pub fn set_current_frame(&mut self, frame: Frame) {
        self.current_frame = frame;
    }

    pub fn add_local_input(&mut self, handle: Handle, frame: Frame, bytes: &[u8]) {
        self.buffers[handle as usize].add_local(frame, bytes);
    }

    pub fn add_remote_input(&mut self, handle: Handle, frame: Frame, bytes: &[u8]) -> bool {
        self.buffers[handle as usize].add(frame, bytes)
    }

    pub fn set_delay(&mut self, handle: Handle, delay: usize) {
        self.buffers[handle as usize].set_delay(delay);
    }

    pub fn get_local_input(&mut self, handle: Handle, frame: Frame) -> GameInput {
        self.buffers[handle as usize].get(frame, false)
    }

    /// Concatenates `get(current_frame, prediction=true)` over all players.
    /// Returns `None` as soon as any buffer cannot answer for the frame.
    pub fn get_current_inputs(&mut self) -> Option<(Frame, Vec<u8>)> {
        let frame = self.current_frame;
        let mut combined = Vec::with_capacity(self.input_size * self.buffers.len());
        for buf in &mut self.buffers {
            let rec = buf.get(frame, true);
            if rec.frame == NULL_FRAME {
                return None;
            }
            combined.extend_from_slice(&rec.bytes);
        }
        Some((frame, combined))
    }

    /// Same as [`Self::get_current_inputs`] but never predicts: spectators
    /// only ever play confirmed inputs.
    pub fn get_spectator_inputs(&mut self, frame: Frame) -> Option<Vec<u8>> {
        let mut combined = Vec::with_capacity(self.input_size * self.buffers.len());
        for buf in &mut self.buffers {
            let rec = buf.get(frame, false);
            if rec.frame == NULL_FRAME {
                return None;
            }
            combined.extend_from_slice(&rec.bytes);
        }
        Some(combined)
    }

    pub fn get_min_incorrect_frame(&self) -> Frame {
        self.buffers
            .iter()
            .map(|b| b.get_incorrect_prediction_frame())
            .filter(|&f| f != NULL_FRAME)
            .min()
            .unwrap_or(NULL_FRAME)
    }

    pub fn get_min_received_frame(&self) -> Frame {
        self.buffers
            .iter()
            .map(|b| b.last_received())
            .min()
            .unwrap_or(NULL_FRAME)
    }

    pub fn get_last_received_from(&self, handle: Handle) -> Frame {
        self.buffers[handle as usize].last_received()
    }

    pub fn clear_incorrect_up_to(&mut self, limit: Frame) {
        for buf in &mut self.buffers {
            buf.clear_incorrect_up_to(limit);
        }
    }

    pub fn num_players(&self) -> usize {
        self.buffers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_current_inputs_blocks_until_all_players_answer() {
        let mut sync = SyncSystem::new(2, 1, 16, 0);
        sync.add_local_input(0, 0, &[1]);
        // player 1 has not supplied frame 0 and prediction is disabled
        assert!(sync.get_current_inputs().is_none());
        sync.add_remote_input(1, 0, &[2]);
        let (frame, bytes) = sync.get_current_inputs().unwrap();
        assert_eq!(frame, 0);
        assert_eq!(bytes, vec![1, 2]);
    }

    #[test]
    fn min_incorrect_frame_is_none_when_no_mispredictions() {
        let sync = SyncSystem::new(2, 1, 16, 4);
        assert_eq!(sync.get_min_incorrect_frame(), NULL_FRAME);
    }
}
