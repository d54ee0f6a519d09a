//! Content hashing for stored objects.
//!
//! Uses 32-bit FNV-1a over the little-endian bytes of each element. The
//! hash only selects a bucket; equality is always confirmed by comparing
//! the stored object, so collisions cost a compare, never correctness.

/// FNV-1a offset basis for 32-bit.
const FNV_OFFSET: u32 = 0x811c_9dc5;
/// FNV-1a prime for 32-bit.
const FNV_PRIME: u32 = 0x0100_0193;

#[inline]
fn fnv1a_byte(hash: u32, byte: u8) -> u32 {
    (hash ^ byte as u32).wrapping_mul(FNV_PRIME)
}

/// An element type a [`BlockStore`](crate::BlockStore) can hold.
pub trait Element: Copy + Eq + Default + std::fmt::Debug {
    /// Fold this element's little-endian bytes into an FNV-1a state.
    fn feed(self, hash: u32) -> u32;
}

impl Element for u8 {
    #[inline]
    fn feed(self, hash: u32) -> u32 {
        fnv1a_byte(hash, self)
    }
}

impl Element for u32 {
    #[inline]
    fn feed(self, mut hash: u32) -> u32 {
        for &b in &self.to_le_bytes() {
            hash = fnv1a_byte(hash, b);
        }
        hash
    }
}

/// Hash an object's contents.
pub fn content_hash<T: Element>(items: &[T]) -> u32 {
    items.iter().fold(FNV_OFFSET, |h, &v| v.feed(h))
}
