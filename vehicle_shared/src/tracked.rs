//! Replicated fields.
//!
//! A `Tracked<T>` is a value the authority side mirrors to observers. Writes
//! that change the value mark it dirty; the replication layer collects dirty
//! fields once per tick and clears the flag.

/// A replicated value with change tracking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tracked<T> {
    value: T,
    dirty: bool,
}

impl<T: Copy + PartialEq> Tracked<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            dirty: false,
        }
    }

    pub fn get(&self) -> T {
        self.value
    }

    pub fn set(&mut self, value: T) {
        if self.value != value {
            self.value = value;
            self.dirty = true;
        }
    }

    /// Overwrites the value without marking it dirty (inbound replication).
    pub fn sync(&mut self, value: T) {
        self.value = value;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns whether the value changed since the last call.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

impl<T: Copy + PartialEq + Default> Default for Tracked<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_real_changes_mark_dirty() {
        let mut t = Tracked::new(3);
        t.set(3);
        assert!(!t.is_dirty());
        t.set(4);
        assert!(t.take_dirty());
        assert!(!t.take_dirty());
        t.sync(9);
        assert_eq!(t.get(), 9);
        assert!(!t.is_dirty());
    }
}
