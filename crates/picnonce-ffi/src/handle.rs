//! Generation-checked handle table for objects owned across the C
//! boundary.
//!
//! A handle packs an entry index (upper 32 bits) and that entry's
//! generation (lower 32 bits). Removing a value bumps the generation, so
//! a destroyed handle is recognised as stale instead of aliasing
//! whatever later reuses the entry.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    fn pack(self) -> u64 {
        (u64::from(self.index) << 32) | u64::from(self.generation)
    }

    fn unpack(raw: u64) -> Self {
        Self {
            index: (raw >> 32) as u32,
            generation: raw as u32,
        }
    }
}

enum Entry<T> {
    Live { generation: u32, value: T },
    Free { generation: u32 },
    /// Generation exhausted; never handed out again.
    Retired,
}

/// Owned values addressed by opaque `u64` handles.
pub(crate) struct HandleTable<T> {
    entries: Vec<Entry<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> HandleTable<T> {
    /// An empty table, usable in a `static`.
    pub(crate) const fn new() -> Self {
        Self {
            entries: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Store `value` and return its handle.
    pub(crate) fn insert(&mut self, value: T) -> u64 {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let entry = &mut self.entries[index as usize];
            if let Entry::Free { generation } = *entry {
                *entry = Entry::Live { generation, value };
                return Handle { index, generation }.pack();
            }
        }
        let index = self.entries.len() as u32;
        self.entries.push(Entry::Live {
            generation: 0,
            value,
        });
        Handle {
            index,
            generation: 0,
        }
        .pack()
    }

    /// The value behind `raw`, or `None` if the handle is stale or was
    /// never issued.
    pub(crate) fn get(&self, raw: u64) -> Option<&T> {
        let handle = Handle::unpack(raw);
        match self.entries.get(handle.index as usize)? {
            Entry::Live { generation, value } if *generation == handle.generation => Some(value),
            _ => None,
        }
    }

    /// Take the value behind `raw` out of the table. Removing a stale
    /// handle is a no-op returning `None`.
    pub(crate) fn remove(&mut self, raw: u64) -> Option<T> {
        let handle = Handle::unpack(raw);
        let entry = self.entries.get_mut(handle.index as usize)?;
        match entry {
            Entry::Live { generation, .. } if *generation == handle.generation => {}
            _ => return None,
        }
        let next = handle.generation.wrapping_add(1);
        let replacement = if next == 0 {
            Entry::Retired
        } else {
            self.free.push(handle.index);
            Entry::Free { generation: next }
        };
        self.live -= 1;
        match std::mem::replace(entry, replacement) {
            Entry::Live { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Number of live handles.
    pub(crate) fn len(&self) -> usize {
        self.live
    }
}
