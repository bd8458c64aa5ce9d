//! # DirtyTracker
//! A DirtyTracker wraps a collection's documents and remembers whether they changed since listeners were
//! last notified. Every mutable access goes through [`DirtyOnDerefMut`], so a write cannot forget to
//! schedule a snapshot.

use std::ops::{Deref, DerefMut};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirtyState {
    /// Listeners have seen the current contents
    Clean,
    /// Contents changed, every listener of the collection is owed a snapshot
    Dirty,
}

#[derive(Clone, Debug)]
pub struct DirtyTracker<Store> {
    store: Store,
    pub dirty_state: DirtyState,
}

impl<Store: Default> Default for DirtyTracker<Store> {
    fn default() -> Self {
        Self {
            store: Default::default(),
            // An empty collection nobody has written to yet has nothing to announce.
            dirty_state: DirtyState::Clean,
        }
    }
}

/// Smart pointer that marks the store as dirty when dereferenced mutably
pub struct DirtyOnDerefMut<'a, Store> {
    store: &'a mut Store,
    dirty_state: &'a mut DirtyState,
}

impl<'a, Store> Deref for DirtyOnDerefMut<'a, Store> {
    type Target = Store;

    fn deref(&self) -> &Self::Target {
        self.store
    }
}

impl<'a, Store> DerefMut for DirtyOnDerefMut<'a, Store> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        *self.dirty_state = DirtyState::Dirty;
        self.store
    }
}

impl<Store> DirtyTracker<Store> {
    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_mut(&mut self) -> DirtyOnDerefMut<'_, Store> {
        DirtyOnDerefMut {
            store: &mut self.store,
            dirty_state: &mut self.dirty_state,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty_state == DirtyState::Dirty
    }

    /// Returns whether the store was dirty, leaving it clean.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty_state, DirtyState::Clean) == DirtyState::Dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_do_not_dirty() {
        let mut tracker: DirtyTracker<Vec<u32>> = DirtyTracker::default();
        let store = tracker.store_mut();
        assert!(store.is_empty());
        drop(store);
        assert!(!tracker.is_dirty());

        tracker.store_mut().push(1);
        assert!(tracker.is_dirty());
        assert!(tracker.take_dirty());
        assert!(!tracker.take_dirty());
        assert_eq!(tracker.store(), &vec![1]);
    }
}
