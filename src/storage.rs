use std::sync::Arc;

use parking_lot::Mutex;

use crate::{Frame, NULL_FRAME};

#[derive(Debug, Clone)]
struct StateEntry {
    frame: Frame,
    state: Vec<u8>,
    checksum: u32,
}

impl StateEntry {
    fn blank(state_size: usize) -> Self {
        Self {
            frame: NULL_FRAME,
            state: vec![0; state_size],
            checksum: 0,
        }
    }
}

/// A handle to one ring slot of the state storage.
///
/// Handed out through [`crate::GameEvent::Save`] and [`crate::GameEvent::Load`];
/// the embedder calls [`Self::save`] to report the frame it just captured, or
/// [`Self::load`] to read back the snapshot for a rollback. Shared ownership
/// via `Arc<Mutex<_>>` means a cell handed out in one tick stays valid exactly
/// as long as the caller holds it, matching the "valid until next Save at the
/// same slot" rule.
#[derive(Debug, Clone)]
pub struct StateCell(Arc<Mutex<StateEntry>>);

impl StateCell {
    pub fn save(&self, frame: Frame, state: Vec<u8>, checksum: u32) {
        let mut entry = self.0.lock();
        entry.frame = frame;
        entry.state = state;
        entry.checksum = checksum;
    }

    pub fn frame(&self) -> Frame {
        self.0.lock().frame
    }

    pub fn load(&self) -> (Frame, Vec<u8>, u32) {
        let entry = self.0.lock();
        (entry.frame, entry.state.clone(), entry.checksum)
    }
}

/// Ring of saved simulation snapshots keyed by frame.
///
/// Size is `2` under limited saving (ping/pong around the last saved
/// frame), or `input_prediction_window + 2` otherwise.
#[derive(Debug)]
pub struct StateStorage {
    capacity: usize,
    cells: Vec<StateCell>,
}

impl StateStorage {
    pub fn new(capacity: usize, state_size: usize) -> Self {
        Self {
            capacity,
            cells: (0..capacity)
                .map(|_| StateCell(Arc::new(Mutex::new(StateEntry::blank(state_size)))))
                .collect(),
        }
    }

    fn index(&self, frame: Frame) -> usize {
        let capacity = self.capacity as i32;
        (((frame % capacity) + capacity) % capacity) as usize
    }

    /// Returns the ring slot for `frame`. The caller writes through the
    /// returned cell; the storage itself never inspects the payload, it is
    /// a passive cache.
    pub fn get(&self, frame: Frame) -> StateCell {
        self.cells[self.index(frame)].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_get_round_trips() {
        let storage = StateStorage::new(4, 8);
        let cell = storage.get(5);
        cell.save(5, vec![1, 2, 3], 0xDEAD);
        let again = storage.get(5);
        assert_eq!(again.frame(), 5);
        let (frame, state, checksum) = again.load();
        assert_eq!(frame, 5);
        assert_eq!(state, vec![1, 2, 3]);
        assert_eq!(checksum, 0xDEAD);
    }

    #[test]
    fn negative_frame_indexes_without_panicking() {
        let storage = StateStorage::new(4, 8);
        let cell = storage.get(-1);
        cell.save(-1, vec![9], 1);
        assert_eq!(storage.get(-1).frame(), -1);
    }
}
