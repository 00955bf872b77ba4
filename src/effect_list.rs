//! Fixed-capacity, insertion-ordered storage for the forces and torques
//! queued on a [`PhysicalObject`](crate::physics::PhysicalObject).
//!
//! Slots live in a `heapless::Vec` and are chained into a doubly linked list
//! by index, so inserting, removing through a handle, and removing the
//! current element while walking the list are all O(1). Freed slots are
//! recycled; each slot carries a generation counter so handles to removed
//! effects go stale instead of aliasing whatever reuses the slot.

use core::fmt;
use core::marker::PhantomData;

use heapless::Vec;

/// Stable handle to an element of an [`EffectList`].
pub struct EffectHandle<E> {
    index: usize,
    generation: u32,
    _marker: PhantomData<fn() -> E>,
}

impl<E> EffectHandle<E> {
    fn new(index: usize, generation: u32) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }
}

impl<E> Clone for EffectHandle<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for EffectHandle<E> {}

impl<E> PartialEq for EffectHandle<E> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<E> Eq for EffectHandle<E> {}

impl<E> fmt::Debug for EffectHandle<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectHandle")
            .field("index", &self.index)
            .field("generation", &self.generation)
            .finish()
    }
}

#[derive(Debug, Clone)]
struct Slot<E> {
    effect: Option<E>,
    generation: u32,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Insertion-ordered list of at most `N` effects.
#[derive(Debug, Clone)]
pub struct EffectList<E, const N: usize> {
    slots: Vec<Slot<E>, N>,
    free: Vec<usize, N>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<E, const N: usize> Default for EffectList<E, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, const N: usize> EffectList<E, N> {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Append `effect` at the end of the list. Returns `None` if the list is full.
    pub fn insert(&mut self, effect: E) -> Option<EffectHandle<E>> {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                let index = self.slots.len();
                self.slots
                    .push(Slot {
                        effect: None,
                        generation: 0,
                        prev: None,
                        next: None,
                    })
                    .ok()?;
                index
            }
        };

        let slot = &mut self.slots[index];
        slot.effect = Some(effect);
        slot.prev = self.tail;
        slot.next = None;
        let generation = slot.generation;

        match self.tail {
            Some(tail) => self.slots[tail].next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.len += 1;

        Some(EffectHandle::new(index, generation))
    }

    /// Remove the element `handle` points to and return it.
    pub fn remove(&mut self, handle: EffectHandle<E>) -> Option<E> {
        if !self.contains(handle) {
            return None;
        }
        self.remove_at(handle.index)
    }

    pub fn contains(&self, handle: EffectHandle<E>) -> bool {
        self.slots
            .get(handle.index)
            .is_some_and(|slot| slot.generation == handle.generation && slot.effect.is_some())
    }

    pub fn get(&self, handle: EffectHandle<E>) -> Option<&E> {
        let slot = self.slots.get(handle.index)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.effect.as_ref()
    }

    pub fn get_mut(&mut self, handle: EffectHandle<E>) -> Option<&mut E> {
        let slot = self.slots.get_mut(handle.index)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.effect.as_mut()
    }

    /// Drop every element. All outstanding handles become stale.
    pub fn clear(&mut self) {
        self.free.clear();
        for (index, slot) in self.slots.iter_mut().enumerate().rev() {
            if slot.effect.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
            slot.prev = None;
            slot.next = None;
            // free has the same capacity as slots
            let pushed = self.free.push(index).is_ok();
            debug_assert!(pushed, "free list overflow");
        }
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> Iter<'_, E, N> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    /// Walk the list in insertion order, removing every element for which `f`
    /// returns `false`.
    pub fn retain_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut E) -> bool,
    {
        let mut cursor = self.head;
        while let Some(index) = cursor {
            let slot = &mut self.slots[index];
            cursor = slot.next;
            let keep = match slot.effect.as_mut() {
                Some(effect) => f(effect),
                None => true,
            };
            if !keep {
                self.remove_at(index);
            }
        }
    }

    fn remove_at(&mut self, index: usize) -> Option<E> {
        let slot = &mut self.slots[index];
        let effect = slot.effect.take()?;
        let (prev, next) = (slot.prev, slot.next);
        slot.prev = None;
        slot.next = None;
        slot.generation = slot.generation.wrapping_add(1);

        match prev {
            Some(prev) => self.slots[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.slots[next].prev = prev,
            None => self.tail = prev,
        }
        self.len -= 1;
        let pushed = self.free.push(index).is_ok();
        debug_assert!(pushed, "free list overflow");

        Some(effect)
    }
}

/// Insertion-order iterator over an [`EffectList`], yielding handles alongside elements.
pub struct Iter<'a, E, const N: usize> {
    list: &'a EffectList<E, N>,
    cursor: Option<usize>,
}

impl<'a, E, const N: usize> Iterator for Iter<'a, E, N> {
    type Item = (EffectHandle<E>, &'a E);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor?;
        let list = self.list;
        let slot = &list.slots[index];
        self.cursor = slot.next;
        let effect = slot.effect.as_ref()?;
        Some((EffectHandle::new(index, slot.generation), effect))
    }
}

impl<'a, E, const N: usize> IntoIterator for &'a EffectList<E, N> {
    type Item = (EffectHandle<E>, &'a E);
    type IntoIter = Iter<'a, E, N>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;
    use std::vec::Vec as StdVec;

    fn values<const N: usize>(list: &EffectList<u32, N>) -> StdVec<u32> {
        list.iter().map(|(_, v)| *v).collect()
    }

    #[test]
    fn test_insert_preserves_order() {
        let mut list = EffectList::<u32, 4>::new();
        list.insert(1).unwrap();
        list.insert(2).unwrap();
        list.insert(3).unwrap();
        assert_eq!(values(&list), [1, 2, 3]);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_insert_at_capacity() {
        let mut list = EffectList::<u32, 2>::new();
        assert!(list.insert(1).is_some());
        assert!(list.insert(2).is_some());
        assert!(list.insert(3).is_none());
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_remove_middle_keeps_order() {
        let mut list = EffectList::<u32, 4>::new();
        list.insert(1).unwrap();
        let h = list.insert(2).unwrap();
        list.insert(3).unwrap();
        assert_eq!(list.remove(h), Some(2));
        assert_eq!(values(&list), [1, 3]);
        assert_eq!(list.remove(h), None);
    }

    #[test]
    fn test_reused_slot_appends_at_tail() {
        let mut list = EffectList::<u32, 3>::new();
        let h1 = list.insert(1).unwrap();
        list.insert(2).unwrap();
        list.insert(3).unwrap();
        list.remove(h1);
        let h4 = list.insert(4).unwrap();
        assert_eq!(values(&list), [2, 3, 4]);

        // Same slot, new generation: the old handle must not alias the new element.
        assert_eq!(list.get(h1), None);
        assert_eq!(list.get(h4), Some(&4));
        assert_ne!(h1, h4);
    }

    #[test]
    fn test_retain_mut_removes_during_walk() {
        let mut list = EffectList::<u32, 8>::new();
        for v in 1..=6 {
            list.insert(v).unwrap();
        }
        let mut visited = StdVec::new();
        list.retain_mut(|v| {
            visited.push(*v);
            *v *= 10;
            *v % 20 != 0
        });
        assert_eq!(visited, [1, 2, 3, 4, 5, 6]);
        assert_eq!(values(&list), [10, 30, 50]);
        assert_eq!(list.len(), 3);

        list.retain_mut(|_| false);
        assert!(list.is_empty());
        assert!(list.insert(7).is_some());
        assert_eq!(values(&list), [7]);
    }

    #[test]
    fn test_clear_invalidates_handles() {
        let mut list = EffectList::<u32, 4>::new();
        let h = list.insert(1).unwrap();
        list.insert(2).unwrap();
        list.clear();
        assert!(list.is_empty());
        assert!(!list.contains(h));
        assert_eq!(list.get_mut(h), None);

        for v in 0..4 {
            assert!(list.insert(v).is_some());
        }
        assert_eq!(values(&list), [0, 1, 2, 3]);
        assert!(!list.contains(h));
    }

    #[test]
    fn test_full_list_churn_keeps_free_list_bounded() {
        let mut list = EffectList::<u32, 3>::new();
        for round in 0..4 {
            let handles: StdVec<_> = (0..3).map(|v| list.insert(v + round).unwrap()).collect();
            assert!(list.insert(99).is_none());
            for h in handles {
                assert!(list.remove(h).is_some());
            }
            assert!(list.is_empty());

            for v in 0..3 {
                list.insert(v).unwrap();
            }
            list.clear();
            list.clear();
        }
        for v in 0..3 {
            assert!(list.insert(v).is_some());
        }
        assert!(list.insert(3).is_none());
    }

    #[test]
    fn test_get_mut_through_handle() {
        let mut list = EffectList::<u32, 4>::new();
        let h = list.insert(5).unwrap();
        *list.get_mut(h).unwrap() += 1;
        assert_eq!(list.get(h), Some(&6));
    }
}
