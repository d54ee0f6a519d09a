//! Collaborator trait for the emulated core.

/// The emulated core's full-state codec.
///
/// The recorder never interprets state bytes; it only asks the core to
/// produce them (for checkpoints) and to consume them (when a checkpoint
/// is loaded during playback). Serialized size is assumed fixed for the
/// lifetime of a session.
pub trait StateCore {
    /// Number of bytes [`serialize`](StateCore::serialize) will produce.
    fn serialize_size(&self) -> usize;

    /// Write the full state into `buf` and return the number of bytes
    /// written, or `None` if the core could not serialize.
    ///
    /// `buf` is at least [`serialize_size`](StateCore::serialize_size) bytes.
    fn serialize(&mut self, buf: &mut [u8]) -> Option<usize>;

    /// Replace the core's state with `buf`. Returns `false` if the core
    /// rejected the data.
    fn deserialize(&mut self, buf: &[u8]) -> bool;
}

impl<C: StateCore + ?Sized> StateCore for &mut C {
    fn serialize_size(&self) -> usize {
        (**self).serialize_size()
    }

    fn serialize(&mut self, buf: &mut [u8]) -> Option<usize> {
        (**self).serialize(buf)
    }

    fn deserialize(&mut self, buf: &[u8]) -> bool {
        (**self).deserialize(buf)
    }
}
