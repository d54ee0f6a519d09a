//! Test utilities and mock types for Reel development.
//!
//! Provides [`MockCore`], an in-memory [`StateCore`] whose state the test
//! edits directly, plus deterministic state and event fixtures.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

pub use fixtures::{key, pad_input, patterned_state};

use reel_core::StateCore;

/// In-memory emulated core.
///
/// `state` is the full serialized state. Set `reject_serialize` or
/// `reject_deserialize` to make the next calls fail.
#[derive(Clone, Debug, Default)]
pub struct MockCore {
    pub state: Vec<u8>,
    pub serialize_calls: usize,
    pub deserialize_calls: usize,
    pub reject_serialize: bool,
    pub reject_deserialize: bool,
}

impl MockCore {
    pub fn new(state: Vec<u8>) -> Self {
        Self {
            state,
            ..Self::default()
        }
    }
}

impl StateCore for MockCore {
    fn serialize_size(&self) -> usize {
        self.state.len()
    }

    fn serialize(&mut self, buf: &mut [u8]) -> Option<usize> {
        self.serialize_calls += 1;
        if self.reject_serialize || buf.len() < self.state.len() {
            return None;
        }
        buf[..self.state.len()].copy_from_slice(&self.state);
        Some(self.state.len())
    }

    fn deserialize(&mut self, buf: &[u8]) -> bool {
        self.deserialize_calls += 1;
        if self.reject_deserialize {
            return false;
        }
        self.state.clear();
        self.state.extend_from_slice(buf);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_roundtrip() {
        let mut a = MockCore::new(vec![1, 2, 3]);
        let mut buf = vec![0u8; a.serialize_size()];
        assert_eq!(a.serialize(&mut buf), Some(3));
        let mut b = MockCore::default();
        assert!(b.deserialize(&buf));
        assert_eq!(b.state, vec![1, 2, 3]);
        assert_eq!(b.deserialize_calls, 1);
    }

    #[test]
    fn rejections() {
        let mut core = MockCore::new(vec![1; 4]);
        core.reject_serialize = true;
        assert_eq!(core.serialize(&mut [0u8; 4]), None);
        core.reject_deserialize = true;
        assert!(!core.deserialize(&[9]));
        assert_eq!(core.state, vec![1; 4]);
    }
}
