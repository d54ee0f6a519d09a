//! Fixed-size input records captured once per frame.
//!
//! Both record types have a stable little-endian wire layout with explicit
//! padding so that byte-for-byte comparison of two logs is meaningful.

/// A keyboard event as delivered by the host.
///
/// # Examples
///
/// ```
/// use reel_core::KeyEvent;
///
/// let ev = KeyEvent { down: true, modifiers: 0x0001, code: 97, character: 'a' as u32 };
/// let bytes = ev.to_bytes();
/// assert_eq!(bytes.len(), KeyEvent::WIRE_SIZE);
/// assert_eq!(KeyEvent::from_bytes(&bytes), ev);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    /// `true` for key-down, `false` for key-up.
    pub down: bool,
    /// Modifier bitmask (shift, ctrl, ...), host-defined.
    pub modifiers: u16,
    /// Host key code.
    pub code: u32,
    /// Translated character code, or 0.
    pub character: u32,
}

impl KeyEvent {
    /// Encoded size: down u8, pad u8, modifiers u16, code u32, character u32.
    pub const WIRE_SIZE: usize = 12;

    /// Encode into the fixed wire layout.
    pub fn to_bytes(&self) -> [u8; Self::WIRE_SIZE] {
        let mut out = [0u8; Self::WIRE_SIZE];
        out[0] = u8::from(self.down);
        out[2..4].copy_from_slice(&self.modifiers.to_le_bytes());
        out[4..8].copy_from_slice(&self.code.to_le_bytes());
        out[8..12].copy_from_slice(&self.character.to_le_bytes());
        out
    }

    /// Decode from the fixed wire layout. Padding is ignored; any non-zero
    /// `down` byte reads as key-down.
    pub fn from_bytes(bytes: &[u8; Self::WIRE_SIZE]) -> Self {
        Self {
            down: bytes[0] != 0,
            modifiers: u16::from_le_bytes([bytes[2], bytes[3]]),
            code: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            character: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
        }
    }
}

/// A single polled input value (button, axis, pointer coordinate, ...).
///
/// The `(port, device, index, id)` tuple identifies the control; `value`
/// is whatever the core saw when it polled that control during the frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct InputEvent {
    /// Controller port.
    pub port: u8,
    /// Device class (joypad, analog, mouse, ...).
    pub device: u8,
    /// Sub-index within the device (e.g. analog stick).
    pub index: u8,
    /// Control id within the device.
    pub id: u16,
    /// Polled value.
    pub value: i16,
}

impl InputEvent {
    /// Encoded size: port u8, device u8, index u8, pad u8, id u16, value i16.
    pub const WIRE_SIZE: usize = 8;

    /// Encode into the fixed wire layout.
    pub fn to_bytes(&self) -> [u8; Self::WIRE_SIZE] {
        let mut out = [0u8; Self::WIRE_SIZE];
        out[0] = self.port;
        out[1] = self.device;
        out[2] = self.index;
        out[4..6].copy_from_slice(&self.id.to_le_bytes());
        out[6..8].copy_from_slice(&self.value.to_le_bytes());
        out
    }

    /// Decode from the fixed wire layout.
    pub fn from_bytes(bytes: &[u8; Self::WIRE_SIZE]) -> Self {
        Self {
            port: bytes[0],
            device: bytes[1],
            index: bytes[2],
            id: u16::from_le_bytes([bytes[4], bytes[5]]),
            value: i16::from_le_bytes([bytes[6], bytes[7]]),
        }
    }

    /// Whether this event describes the given control.
    pub fn matches(&self, port: u8, device: u8, index: u8, id: u16) -> bool {
        self.port == port && self.device == device && self.index == index && self.id == id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn key_event_padding_is_zero() {
        let ev = KeyEvent {
            down: true,
            modifiers: 0xFFFF,
            code: u32::MAX,
            character: u32::MAX,
        };
        assert_eq!(ev.to_bytes()[1], 0);
    }

    #[test]
    fn input_event_layout_is_stable() {
        let ev = InputEvent {
            port: 1,
            device: 2,
            index: 3,
            id: 0x0405,
            value: -2,
        };
        assert_eq!(ev.to_bytes(), [1, 2, 3, 0, 0x05, 0x04, 0xFE, 0xFF]);
    }

    #[test]
    fn input_event_matches_control_tuple() {
        let ev = InputEvent {
            port: 0,
            device: 1,
            index: 0,
            id: 8,
            value: 1,
        };
        assert!(ev.matches(0, 1, 0, 8));
        assert!(!ev.matches(1, 1, 0, 8));
        assert!(!ev.matches(0, 1, 0, 9));
    }

    proptest! {
        #[test]
        fn key_event_roundtrip(
            down in any::<bool>(),
            modifiers in any::<u16>(),
            code in any::<u32>(),
            character in any::<u32>(),
        ) {
            let ev = KeyEvent { down, modifiers, code, character };
            prop_assert_eq!(KeyEvent::from_bytes(&ev.to_bytes()), ev);
        }

        #[test]
        fn input_event_roundtrip(
            port in any::<u8>(),
            device in any::<u8>(),
            index in any::<u8>(),
            id in any::<u16>(),
            value in any::<i16>(),
        ) {
            let ev = InputEvent { port, device, index, id, value };
            prop_assert_eq!(InputEvent::from_bytes(&ev.to_bytes()), ev);
        }
    }
}
