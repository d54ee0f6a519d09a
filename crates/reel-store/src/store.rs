//! The deduplicating object arena.
//!
//! [`BlockStore`] assigns each distinct object a stable index in strictly
//! increasing order. An append-only list of [`AdditionRecord`]s remembers
//! the first index added in each frame, which makes "forget everything
//! added after frame F" a plain truncation of the arena.

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::error::StoreError;
use crate::hash::{content_hash, Element};
use crate::ZERO_INDEX;

/// Result of [`BlockStore::insert`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Inserted {
    /// Index of the object (new or existing).
    pub index: u32,
    /// Whether the object was added by this call.
    pub is_new: bool,
}

/// Marks the first index added while recording a given frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdditionRecord {
    /// Frame number the additions belong to.
    pub frame: u64,
    /// First index added during that frame.
    pub first_index: u32,
}

#[derive(Clone, Debug)]
struct Entry<T> {
    data: Box<[T]>,
    hash: u32,
    uses: u64,
}

/// Content-addressable store of fixed-size objects.
///
/// Bucket lists are kept inline up to three entries; longer collision
/// chains spill to the heap.
///
/// # Examples
///
/// ```
/// use reel_store::BlockStore;
///
/// let mut store = BlockStore::<u8>::new(4);
/// let a = store.insert(&[1, 2, 3, 4], 1);
/// let b = store.insert(&[1, 2, 3, 4], 2);
/// assert!(a.is_new);
/// assert!(!b.is_new);
/// assert_eq!(a.index, b.index);
///
/// store.remove_after(0);
/// assert_eq!(store.len(), 1); // only the zero object remains
/// ```
#[derive(Clone, Debug)]
pub struct BlockStore<T: Element> {
    object_size: usize,
    entries: Vec<Entry<T>>,
    buckets: IndexMap<u32, SmallVec<[u32; 3]>>,
    additions: Vec<AdditionRecord>,
}

impl<T: Element> BlockStore<T> {
    /// Create a store of `object_size`-element objects holding only the
    /// reserved zero object at index 0.
    ///
    /// # Panics
    ///
    /// Panics if `object_size == 0`.
    pub fn new(object_size: usize) -> Self {
        assert!(object_size > 0, "BlockStore object size must be > 0");
        let mut store = Self {
            object_size,
            entries: Vec::new(),
            buckets: IndexMap::new(),
            additions: Vec::new(),
        };
        store.push_zero();
        store
    }

    fn push_zero(&mut self) {
        let data = vec![T::default(); self.object_size].into_boxed_slice();
        let hash = content_hash(&data);
        self.entries.push(Entry {
            data,
            hash,
            uses: 0,
        });
        self.buckets.entry(hash).or_default().push(ZERO_INDEX);
    }

    /// Number of elements in each object.
    pub fn object_size(&self) -> usize {
        self.object_size
    }

    /// Number of stored objects, including the zero object.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds nothing but the zero object.
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    /// The index the next new object will receive.
    pub fn next_index(&self) -> u32 {
        self.entries.len() as u32
    }

    /// The undo records, oldest first.
    pub fn additions(&self) -> &[AdditionRecord] {
        &self.additions
    }

    fn find(&self, hash: u32, object: &[T]) -> Option<u32> {
        self.buckets.get(&hash).and_then(|bucket| {
            bucket
                .iter()
                .copied()
                .find(|&i| *self.entries[i as usize].data == *object)
        })
    }

    fn append(&mut self, data: Box<[T]>, hash: u32, frame: u64) -> u32 {
        let index = self.next_index();
        self.entries.push(Entry {
            data,
            hash,
            uses: 1,
        });
        self.buckets.entry(hash).or_default().push(index);
        // Objects inserted under an older frame than the newest record
        // are attributed to that record.
        if self.additions.last().is_none_or(|r| r.frame < frame) {
            self.additions.push(AdditionRecord {
                frame,
                first_index: index,
            });
        }
        index
    }

    /// Insert `object`, returning its index and whether it was new.
    ///
    /// An existing identical object has its use-count bumped instead.
    ///
    /// # Panics
    ///
    /// Panics if `object.len()` differs from the store's object size.
    pub fn insert(&mut self, object: &[T], frame: u64) -> Inserted {
        assert_eq!(
            object.len(),
            self.object_size,
            "BlockStore::insert object length"
        );
        let hash = content_hash(object);
        if let Some(index) = self.find(hash, object) {
            self.entries[index as usize].uses += 1;
            return Inserted {
                index,
                is_new: false,
            };
        }
        let index = self.append(object.into(), hash, frame);
        Inserted {
            index,
            is_new: true,
        }
    }

    /// Insert `object` at exactly `index`, as dictated by a decoded
    /// checkpoint stream.
    ///
    /// Fails if `index` is not the next free slot or if the content is
    /// already stored under another index; both mean the stream and the
    /// store have diverged.
    pub fn insert_exact(&mut self, index: u32, object: &[T], frame: u64) -> Result<(), StoreError> {
        if object.len() != self.object_size {
            return Err(StoreError::SizeMismatch {
                expected: self.object_size,
                found: object.len(),
            });
        }
        let expected = self.next_index();
        if index != expected {
            return Err(StoreError::IndexMismatch {
                expected,
                found: index,
            });
        }
        let hash = content_hash(object);
        if let Some(existing) = self.find(hash, object) {
            return Err(StoreError::DuplicateContent { index, existing });
        }
        self.append(object.into(), hash, frame);
        Ok(())
    }

    /// Fetch an object and bump its use-count.
    pub fn get(&mut self, index: u32) -> Option<&[T]> {
        let entry = self.entries.get_mut(index as usize)?;
        entry.uses += 1;
        Some(&entry.data)
    }

    /// Fetch an object without touching its use-count.
    pub fn peek(&self, index: u32) -> Option<&[T]> {
        self.entries.get(index as usize).map(|e| &*e.data)
    }

    /// Bump an object's use-count. Returns `false` for an unknown index.
    pub fn bump(&mut self, index: u32) -> bool {
        match self.entries.get_mut(index as usize) {
            Some(entry) => {
                entry.uses += 1;
                true
            }
            None => false,
        }
    }

    /// Use-count of an object.
    pub fn uses(&self, index: u32) -> Option<u64> {
        self.entries.get(index as usize).map(|e| e.uses)
    }

    /// Drop every object added after `frame`.
    ///
    /// Walks the addition records newest-first, truncating the arena to
    /// each newer record's first index, and stops at the first record at
    /// or before `frame`. The zero object is never removed. Calling this
    /// twice with the same frame is a no-op the second time.
    pub fn remove_after(&mut self, frame: u64) {
        while let Some(record) = self.additions.last().copied() {
            if record.frame <= frame {
                break;
            }
            self.truncate_to(record.first_index.max(1) as usize);
            self.additions.pop();
        }
    }

    /// Drop everything except the zero object, including all history.
    pub fn clear(&mut self) {
        self.truncate_to(1);
        self.additions.clear();
        self.entries[ZERO_INDEX as usize].uses = 0;
    }

    fn truncate_to(&mut self, len: usize) {
        while self.entries.len() > len {
            let index = (self.entries.len() - 1) as u32;
            let Some(entry) = self.entries.pop() else {
                break;
            };
            if let Some(bucket) = self.buckets.get_mut(&entry.hash) {
                bucket.retain(|i| *i != index);
                if bucket.is_empty() {
                    self.buckets.swap_remove(&entry.hash);
                }
            }
        }
    }
}
