use std::collections::BTreeSet;

use crate::{Frame, NULL_FRAME};

/// A single frame's worth of opaque input bytes.
///
/// `bytes` is always exactly `input_size` long for the lifetime of the
/// owning [`InputBuffer`]; callers must never hand in a shorter or longer
/// slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameInput {
    pub frame: Frame,
    pub bytes: Vec<u8>,
}

impl GameInput {
    pub fn blank(input_size: usize) -> Self {
        Self {
            frame: NULL_FRAME,
            bytes: vec![0; input_size],
        }
    }

    fn blank_at(frame: Frame, input_size: usize) -> Self {
        Self {
            frame,
            bytes: vec![0; input_size],
        }
    }
}

fn ring_index(frame: Frame, capacity: usize) -> usize {
    let capacity = capacity as i32;
    (((frame % capacity) + capacity) % capacity) as usize
}

/// Per-player ring of frame-indexed input records.
///
/// Implements prediction, misprediction tracking and local input delay. See
/// the component design for the exact acceptance/prediction rules; this is a
/// direct, un-simplified translation of them.
#[derive(Debug)]
pub struct InputBuffer {
    input_size: usize,
    capacity: usize,
    inputs: Vec<GameInput>,
    last_received: Frame,
    input_delay: usize,
    prediction_window: usize,
    first_predicted: Frame,
    last_predicted: Frame,
    incorrect_predicted: BTreeSet<Frame>,
}

impl InputBuffer {
    pub fn new(capacity: usize, input_size: usize, prediction_window: usize) -> Self {
        Self {
            input_size,
            capacity,
            inputs: (0..capacity).map(|_| GameInput::blank(input_size)).collect(),
            last_received: NULL_FRAME,
            input_delay: 0,
            prediction_window,
            first_predicted: NULL_FRAME,
            last_predicted: NULL_FRAME,
            incorrect_predicted: BTreeSet::new(),
        }
    }

    pub fn last_received(&self) -> Frame {
        self.last_received
    }

    fn index(&self, frame: Frame) -> usize {
        ring_index(frame, self.capacity)
    }

    /// Writes local input at `frame + input_delay`, prefilling the initial
    /// delay window with blank input stubs the very first time input is
    /// added to a delayed buffer.
    pub fn add_local(&mut self, frame: Frame, bytes: &[u8]) {
        if self.last_received == NULL_FRAME && self.input_delay > 0 {
            let blank = vec![0u8; self.input_size];
            for f in 0..self.input_delay as Frame {
                self.add(f, &blank);
            }
        }
        self.add(frame + self.input_delay as Frame, bytes);
    }

    /// Accepts `bytes` for `frame` only if it is the immediate successor of
    /// `last_received`. Returns whether the write was accepted.
    pub fn add(&mut self, frame: Frame, bytes: &[u8]) -> bool {
        if frame != self.last_received + 1 {
            return false;
        }

        if self.prediction_window > 0 && frame == self.first_predicted {
            let idx = self.index(frame);
            let mismatched = self.inputs[idx].bytes != bytes;
            if mismatched {
                self.incorrect_predicted.insert(self.first_predicted);
                let mut f = self.first_predicted;
                while f <= self.last_predicted {
                    let i = self.index(f);
                    self.inputs[i] = GameInput {
                        frame: f,
                        bytes: bytes.to_vec(),
                    };
                    f += 1;
                }
            }
            self.first_predicted += 1;
            if self.first_predicted > self.last_predicted {
                self.first_predicted = NULL_FRAME;
                self.last_predicted = NULL_FRAME;
            }
        } else {
            let idx = self.index(frame);
            self.inputs[idx] = GameInput {
                frame,
                bytes: bytes.to_vec(),
            };
        }

        self.last_received = frame;
        true
    }

    /// Returns the stored record for `frame`, predicting it if allowed and
    /// necessary. A [`NULL_FRAME`]-tagged record means no answer is
    /// available; the caller must not advance past it.
    pub fn get(&mut self, frame: Frame, allow_prediction: bool) -> GameInput {
        if self.last_received != NULL_FRAME && self.last_received >= frame {
            let idx = self.index(frame);
            return self.inputs[idx].clone();
        }

        if allow_prediction && self.prediction_window > 0 {
            let window_len = if self.last_predicted == NULL_FRAME {
                0
            } else {
                (self.last_predicted - self.first_predicted + 1) as usize
            };
            if window_len < self.prediction_window {
                let prev_bytes = if self.last_received != NULL_FRAME {
                    let idx = self.index(self.last_received);
                    self.inputs[idx].bytes.clone()
                } else {
                    vec![0u8; self.input_size]
                };
                let predicted = GameInput {
                    frame,
                    bytes: prev_bytes,
                };
                let idx = self.index(frame);
                self.inputs[idx] = predicted.clone();
                if self.first_predicted == NULL_FRAME {
                    self.first_predicted = frame;
                }
                self.last_predicted = frame;
                return predicted;
            }
        }

        GameInput::blank_at(NULL_FRAME, self.input_size)
    }

    /// Changes the local input delay. Growing the delay pads forward by
    /// repeating the latest known input; shrinking it is accepted but does
    /// not retract frames already committed.
    pub fn set_delay(&mut self, new_delay: usize) {
        if new_delay > self.input_delay {
            let diff = new_delay - self.input_delay;
            let latest = if self.last_received != NULL_FRAME {
                let idx = self.index(self.last_received);
                self.inputs[idx].bytes.clone()
            } else {
                vec![0u8; self.input_size]
            };
            for _ in 0..diff {
                let f = self.last_received + 1;
                self.add(f, &latest);
            }
        }
        self.input_delay = new_delay;
    }

    pub fn get_incorrect_prediction_frame(&self) -> Frame {
        self.incorrect_predicted
            .iter()
            .next()
            .copied()
            .unwrap_or(NULL_FRAME)
    }

    pub fn clear_incorrect_up_to(&mut self, limit: Frame) {
        self.incorrect_predicted = self.incorrect_predicted.split_off(&(limit + 1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_prediction_does_not_read_uninitialized_memory() {
        let mut buf = InputBuffer::new(8, 2, 4);
        let rec = buf.get(0, true);
        assert_eq!(rec.frame, 0);
        assert_eq!(rec.bytes, vec![0, 0]);
    }

    #[test]
    fn add_rejects_non_contiguous_frames() {
        let mut buf = InputBuffer::new(8, 1, 0);
        assert!(buf.add(0, &[1]));
        assert!(!buf.add(5, &[2]));
        assert_eq!(buf.last_received(), 0);
    }

    #[test]
    fn prediction_window_caps_out() {
        let mut buf = InputBuffer::new(16, 1, 2);
        assert_eq!(buf.get(0, true).frame, 0);
        assert_eq!(buf.get(1, true).frame, 1);
        // window is full (2 consecutive predicted frames already outstanding)
        assert_eq!(buf.get(2, true).frame, NULL_FRAME);
    }

    #[test]
    fn correct_prediction_produces_no_misprediction() {
        let mut buf = InputBuffer::new(16, 1, 4);
        let predicted = buf.get(0, true);
        assert!(buf.add(0, &predicted.bytes));
        assert_eq!(buf.get_incorrect_prediction_frame(), NULL_FRAME);
    }

    #[test]
    fn incorrect_prediction_is_recorded_and_window_rewritten() {
        let mut buf = InputBuffer::new(16, 1, 4);
        let _ = buf.get(0, true); // predicts [0,0]
        let _ = buf.get(1, true); // predicts [0,0]
        assert!(buf.add(0, &[9]));
        assert_eq!(buf.get_incorrect_prediction_frame(), 0);
        // the rest of the outstanding prediction window is rewritten to the
        // newly-known correct value, so the next prediction repeats it
        // rather than re-predicting the stale value
        let rec = buf.get(1, true);
        assert_eq!(rec.bytes, vec![9]);
    }

    #[test]
    fn clear_incorrect_up_to_pops_entries() {
        let mut buf = InputBuffer::new(16, 1, 4);
        let _ = buf.get(0, true);
        buf.add(0, &[1]); // mismatches the zero-bytes prediction
        assert_eq!(buf.get_incorrect_prediction_frame(), 0);
        buf.clear_incorrect_up_to(0);
        assert_eq!(buf.get_incorrect_prediction_frame(), NULL_FRAME);
    }
}
