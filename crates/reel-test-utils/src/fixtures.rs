//! Deterministic fixtures.
//!
//! - [`patterned_state`]: pseudo-random state bytes from a seed.
//! - [`key`] and [`pad_input`]: compact event constructors.

use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use reel_core::{InputEvent, KeyEvent};

/// Joypad device class used by [`pad_input`].
pub const DEVICE_JOYPAD: u8 = 1;

/// `len` bytes of seeded pseudo-random state.
///
/// The same `(len, seed)` always yields the same bytes.
pub fn patterned_state(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut state = vec![0u8; len];
    rng.fill_bytes(&mut state);
    state
}

/// A key-down event whose code and character are both `code`.
pub fn key(code: u32) -> KeyEvent {
    KeyEvent {
        down: true,
        modifiers: 0,
        code,
        character: code,
    }
}

/// A joypad input on port 0, index 0.
pub fn pad_input(id: u16, value: i16) -> InputEvent {
    InputEvent {
        port: 0,
        device: DEVICE_JOYPAD,
        index: 0,
        id,
        value,
    }
}
