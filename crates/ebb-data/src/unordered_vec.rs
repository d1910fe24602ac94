// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Index-stable dense arrays whose removed slots become tombstones.
//!
//! Registries of primitives and cached resource states hand out plain integer
//! indices that callers keep as opaque ids. Both containers here keep those
//! indices stable across unrelated insertions and removals: removing an
//! element only tombstones its slot and records the index for reuse, and the
//! next [`add`](UnorderedVec::add) recycles the most recently freed index.
//!
//! [`UnorderedVec`] tags every slot and works for any `T`. [`SentinelVec`]
//! stores `Copy` scalars densely and encodes tombstones and the end of the
//! used range with two values reserved out of `T`'s domain, see [`Sentinel`].
//!
//! Indices stay valid until [`shrink_to_fit`](UnorderedVec::shrink_to_fit)
//! compacts the storage; it returns an [`IndexRemap`] to rewrite them with.

use std::fmt;
use std::mem::size_of;
use std::ops::{Index, IndexMut};

/// The old-index to new-index mapping produced by a compaction.
#[derive(Clone, PartialEq, Eq)]
pub struct IndexRemap {
    map: Vec<Option<usize>>,
    len: usize,
}

impl IndexRemap {
    fn new(map: Vec<Option<usize>>, len: usize) -> Self {
        Self { map, len }
    }

    /// Returns the new index of the element that lived at `old`, or `None` if
    /// `old` was a tombstone or out of range.
    #[must_use]
    pub fn get(&self, old: usize) -> Option<usize> {
        self.map.get(old).copied().flatten()
    }

    /// Returns the number of surviving elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no element survived.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterates `(old, new)` pairs in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.map
            .iter()
            .enumerate()
            .filter_map(|(old, new)| new.map(|new| (old, new)))
    }

    /// Returns `true` if no surviving element moved.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.iter().all(|(old, new)| old == new)
    }
}

impl fmt::Debug for IndexRemap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Recovers the slot index of `element` inside `slots`, where `project` maps a
/// slot to the element it holds.
fn index_of<S, T>(slots: &[S], element: &T, project: impl Fn(&S) -> Option<&T>) -> Option<usize> {
    let offset = (element as *const T as usize).checked_sub(slots.as_ptr() as usize)?;
    let index = offset.checked_div(size_of::<S>())?;
    let slot = slots.get(index)?;
    project(slot)
        .filter(|candidate| std::ptr::eq(*candidate, element))
        .map(|_| index)
}

/// A slot-stable array of `T` with tagged slots.
///
/// # Example
///
/// ```rust
/// use ebb_data::unordered_vec::UnorderedVec;
///
/// let mut primitives = UnorderedVec::new();
/// let quad = primitives.add("quad");
/// let cube = primitives.add("cube");
/// primitives.remove(quad);
///
/// // The freed index is handed out again.
/// let sphere = primitives.add("sphere");
/// assert_eq!(sphere, quad);
/// assert_eq!(primitives.iter().copied().collect::<Vec<_>>(), ["sphere", "cube"]);
/// assert_eq!(primitives[cube], "cube");
/// ```
#[derive(Clone)]
pub struct UnorderedVec<T> {
    slots: Vec<Option<T>>,
    unused: Vec<usize>,
    len: usize,
}

impl<T> UnorderedVec<T> {
    /// Creates an empty vector.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            unused: Vec::new(),
            len: 0,
        }
    }

    /// Creates an empty vector with room for `capacity` slots.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            unused: Vec::new(),
            len: 0,
        }
    }

    /// Stores `value` and returns its index.
    ///
    /// The most recently freed index is reused first. Appending may reallocate
    /// the storage, which moves elements but never changes their indices.
    pub fn add(&mut self, value: T) -> usize {
        self.len += 1;
        if let Some(index) = self.unused.pop() {
            debug_assert!(self.slots[index].is_none());
            self.slots[index] = Some(value);
            index
        } else {
            self.slots.push(Some(value));
            self.slots.len() - 1
        }
    }

    /// Removes and returns the element at `index`, leaving a tombstone.
    ///
    /// Removing a tombstone or an index that was never handed out is a
    /// programming error. Debug builds panic; release builds return `None` and
    /// leave the vector untouched.
    pub fn remove(&mut self, index: usize) -> Option<T> {
        let removed = self.slots.get_mut(index).and_then(Option::take);
        debug_assert!(removed.is_some(), "index {index} does not hold a valid element");
        if removed.is_some() {
            self.unused.push(index);
            self.len -= 1;
        }
        removed
    }

    /// Returns the element at `index`, or `None` for tombstones.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Returns the element at `index` mutably, or `None` for tombstones.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    /// Returns `true` if `index` holds a valid element.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        self.get(index).is_some()
    }

    /// Returns the number of valid elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if there are no valid elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of tombstones waiting to be reused.
    #[must_use]
    pub fn count_unused(&self) -> usize {
        self.unused.len()
    }

    /// Returns one past the highest index ever handed out since the last
    /// compaction.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Moves every valid element to the front, preserving slot order, and
    /// returns where each one went.
    ///
    /// The free list is emptied. With `shrink_underlying` the spare storage is
    /// released as well.
    pub fn shrink_to_fit(&mut self, shrink_underlying: bool) -> IndexRemap {
        let mut map = vec![None; self.slots.len()];
        let mut next = 0;
        for old in 0..self.slots.len() {
            if self.slots[old].is_some() {
                // Everything in [next, old) is a tombstone.
                self.slots.swap(old, next);
                map[old] = Some(next);
                next += 1;
            }
        }
        log::trace!(
            "UnorderedVec: compacted {} slots into {next}",
            self.slots.len()
        );
        self.slots.truncate(next);
        self.unused.clear();
        if shrink_underlying {
            self.slots.shrink_to_fit();
            self.unused.shrink_to_fit();
        }
        IndexRemap::new(map, next)
    }

    /// Iterates the valid elements in slot order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        self.slots.iter().filter_map(Option::as_ref)
    }

    /// Iterates the valid elements mutably in slot order.
    pub fn iter_mut(&mut self) -> impl DoubleEndedIterator<Item = &mut T> + '_ {
        self.slots.iter_mut().filter_map(Option::as_mut)
    }

    /// Iterates the indices of the valid elements in ascending order.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.iter_indexed().map(|(index, _)| index)
    }

    /// Iterates `(index, element)` pairs in slot order.
    pub fn iter_indexed(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|value| (index, value)))
    }

    /// Recovers the index of an element from a reference into this vector.
    ///
    /// Returns `None` if `element` does not point into the vector's storage.
    #[must_use]
    pub fn to_index(&self, element: &T) -> Option<usize> {
        index_of(&self.slots, element, Option::as_ref)
    }

    /// Removes every element and forgets all freed indices.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.unused.clear();
        self.len = 0;
    }
}

impl<T> Default for UnorderedVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<usize> for UnorderedVec<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        match self.get(index) {
            Some(value) => value,
            None => panic!("index {index} does not hold a valid element"),
        }
    }
}

impl<T> IndexMut<usize> for UnorderedVec<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        match self.get_mut(index) {
            Some(value) => value,
            None => panic!("index {index} does not hold a valid element"),
        }
    }
}

impl<T> FromIterator<T> for UnorderedVec<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut vec = Self::new();
        vec.extend(iter);
        vec
    }
}

impl<T> Extend<T> for UnorderedVec<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.add(value);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for UnorderedVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter_indexed()).finish()
    }
}

/// Scalars that can give up two values to mark tombstones and the end of the
/// used range.
pub trait Sentinel: Copy + PartialEq {
    /// Marks a removed slot.
    const INVALID: Self;
    /// Marks the slot one past the highest used index.
    const END: Self;

    /// Returns `true` if `self` is one of the reserved values.
    fn is_sentinel(&self) -> bool {
        *self == Self::INVALID || *self == Self::END
    }
}

macro_rules! impl_sentinel {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Sentinel for $ty {
                const INVALID: Self = <$ty>::MAX;
                const END: Self = <$ty>::MAX - 1;
            }
        )*
    };
}

impl_sentinel!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

/// A slot-stable array of scalars with sentinel-encoded tombstones.
///
/// The backing storage is exactly the values plus one trailing
/// [`Sentinel::END`], so it can be handed to code that expects a flat array
/// (see [`as_raw_slice`](Self::as_raw_slice)). Storing either reserved value
/// breaks the container; debug builds assert against it.
#[derive(Clone)]
pub struct SentinelVec<T: Sentinel> {
    data: Vec<T>,
    unused: Vec<usize>,
    len: usize,
}

impl<T: Sentinel> SentinelVec<T> {
    /// Creates an empty vector.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: vec![T::END],
            unused: Vec::new(),
            len: 0,
        }
    }

    /// Stores `value` and returns its index.
    pub fn add(&mut self, value: T) -> usize {
        debug_assert!(!value.is_sentinel(), "value collides with a reserved sentinel");
        self.len += 1;
        if let Some(index) = self.unused.pop() {
            debug_assert!(self.data[index] == T::INVALID);
            self.data[index] = value;
            index
        } else {
            let index = self.slot_count();
            self.data[index] = value;
            self.data.push(T::END);
            index
        }
    }

    /// Tombstones the slot at `index` and returns the value it held.
    ///
    /// Removing a tombstone or an out-of-range index is a programming error.
    /// Debug builds panic; release builds return `None`.
    pub fn remove(&mut self, index: usize) -> Option<T> {
        let removed = self.get(index).copied();
        debug_assert!(removed.is_some(), "index {index} does not hold a valid element");
        if removed.is_some() {
            self.data[index] = T::INVALID;
            self.unused.push(index);
            self.len -= 1;
        }
        removed
    }

    /// Returns the value at `index`, or `None` for tombstones.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.data[..self.slot_count()]
            .get(index)
            .filter(|value| **value != T::INVALID)
    }

    /// Returns the value at `index` mutably, or `None` for tombstones.
    ///
    /// Writing a sentinel through the returned reference corrupts the vector.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        let slots = self.slot_count();
        self.data[..slots]
            .get_mut(index)
            .filter(|value| **value != T::INVALID)
    }

    /// Returns `true` if `index` holds a valid value.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        self.get(index).is_some()
    }

    /// Returns the number of valid values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if there are no valid values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of tombstones waiting to be reused.
    #[must_use]
    pub fn count_unused(&self) -> usize {
        self.unused.len()
    }

    /// Returns the index of the end marker.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.data.len() - 1
    }

    /// Returns the raw storage, tombstones and the end marker included.
    #[must_use]
    pub fn as_raw_slice(&self) -> &[T] {
        &self.data
    }

    /// Compacts the valid values to the front and returns where each one went.
    pub fn shrink_to_fit(&mut self, shrink_underlying: bool) -> IndexRemap {
        let slots = self.slot_count();
        let mut map = vec![None; slots];
        let mut next = 0;
        for old in 0..slots {
            let value = self.data[old];
            if value != T::INVALID {
                self.data[next] = value;
                map[old] = Some(next);
                next += 1;
            }
        }
        log::trace!("SentinelVec: compacted {slots} slots into {next}");
        self.data.truncate(next);
        self.data.push(T::END);
        self.unused.clear();
        if shrink_underlying {
            self.data.shrink_to_fit();
            self.unused.shrink_to_fit();
        }
        IndexRemap::new(map, next)
    }

    /// Iterates the valid values in slot order, stopping at the end marker.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.data
            .iter()
            .take_while(|value| **value != T::END)
            .filter(|value| **value != T::INVALID)
    }

    /// Iterates the indices of the valid values in ascending order.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.iter_indexed().map(|(index, _)| index)
    }

    /// Iterates `(index, value)` pairs in slot order.
    pub fn iter_indexed(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        self.data
            .iter()
            .take_while(|value| **value != T::END)
            .enumerate()
            .filter(|(_, value)| **value != T::INVALID)
    }

    /// Recovers the index of a value from a reference into this vector.
    #[must_use]
    pub fn to_index(&self, element: &T) -> Option<usize> {
        index_of(&self.data[..self.slot_count()], element, |value| {
            (*value != T::INVALID).then_some(value)
        })
    }

    /// Removes every value and forgets all freed indices.
    pub fn clear(&mut self) {
        self.data.clear();
        self.data.push(T::END);
        self.unused.clear();
        self.len = 0;
    }
}

impl<T: Sentinel> Default for SentinelVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Sentinel> Index<usize> for SentinelVec<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        match self.get(index) {
            Some(value) => value,
            None => panic!("index {index} does not hold a valid element"),
        }
    }
}

impl<T: Sentinel + fmt::Debug> fmt::Debug for SentinelVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter_indexed()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_reuses_freed_index_scenario() {
        let mut vec = UnorderedVec::new();
        assert_eq!(vec.add(10), 0);
        assert_eq!(vec.add(20), 1);
        assert_eq!(vec.remove(0), Some(10));
        assert_eq!(vec.add(30), 0);

        assert_eq!(vec.iter().copied().collect::<Vec<_>>(), vec![30, 20]);
        assert_eq!(vec.len(), 2);

        let remap = vec.shrink_to_fit(true);
        assert_eq!(remap.get(0), Some(0));
        assert_eq!(remap.get(1), Some(1));
        assert!(remap.is_identity());
    }

    #[test]
    fn test_sentinel_vec_scenario() {
        let mut vec = SentinelVec::<i32>::new();
        assert_eq!(vec.add(10), 0);
        assert_eq!(vec.add(20), 1);
        assert_eq!(vec.remove(0), Some(10));
        assert_eq!(vec.add(30), 0);

        assert_eq!(vec.iter().copied().collect::<Vec<_>>(), vec![30, 20]);
        assert_eq!(vec.as_raw_slice(), &[30, 20, i32::END]);

        let remap = vec.shrink_to_fit(true);
        assert_eq!(remap.iter().collect::<Vec<_>>(), vec![(0, 0), (1, 1)]);
    }

    #[test]
    fn test_free_list_is_lifo() {
        let mut vec: UnorderedVec<u32> = (0..5).collect();
        vec.remove(1);
        vec.remove(3);
        assert_eq!(vec.count_unused(), 2);
        assert_eq!(vec.add(100), 3);
        assert_eq!(vec.add(101), 1);
        assert_eq!(vec.add(102), 5);
        assert_eq!(vec.count_unused(), 0);
    }

    #[test]
    fn test_iteration_skips_tombstones() {
        let mut vec: UnorderedVec<String> =
            ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        vec.remove(0);
        vec.remove(2);

        assert_eq!(vec.indices().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(vec.iter().cloned().collect::<Vec<_>>(), vec!["b", "d"]);
        assert!(!vec.contains(0));
        assert!(vec.get(2).is_none());
        assert_eq!(vec.slot_count(), 4);

        for value in vec.iter_mut() {
            value.push('!');
        }
        assert_eq!(vec[3], "d!");
    }

    #[test]
    fn test_shrink_to_fit_remaps_survivors() {
        let mut vec: UnorderedVec<char> = "abcdef".chars().collect();
        let before: Vec<(usize, char)> = vec
            .iter_indexed()
            .filter(|(index, _)| index % 2 == 1)
            .map(|(index, value)| (index, *value))
            .collect();
        for index in [0, 2, 4] {
            vec.remove(index);
        }

        let remap = vec.shrink_to_fit(false);
        assert_eq!(remap.len(), 3);
        assert!(!remap.is_identity());
        assert_eq!(remap.get(0), None);
        for (old, value) in before {
            assert_eq!(vec[remap.get(old).unwrap()], value);
        }
        assert_eq!(vec.count_unused(), 0);
        assert_eq!(vec.slot_count(), 3);
        // Fresh adds append after compaction.
        assert_eq!(vec.add('z'), 3);
    }

    #[test]
    fn test_sentinel_shrink_to_fit() {
        let mut vec = SentinelVec::<u16>::new();
        for value in 1..=6 {
            vec.add(value);
        }
        vec.remove(0);
        vec.remove(3);

        let remap = vec.shrink_to_fit(true);
        assert_eq!(
            remap.iter().collect::<Vec<_>>(),
            vec![(1, 0), (2, 1), (4, 2), (5, 3)]
        );
        assert_eq!(vec.as_raw_slice(), &[2, 3, 5, 6, u16::END]);
        assert_eq!(vec.count_unused(), 0);
        assert_eq!(vec.len(), 4);
    }

    #[test]
    fn test_to_index_from_reference() {
        let mut vec: UnorderedVec<u64> = (10..20).collect();
        vec.remove(4);
        let element = vec.iter().find(|value| **value == 17).unwrap();
        assert_eq!(vec.to_index(element), Some(7));

        let outside = 17u64;
        assert_eq!(vec.to_index(&outside), None);

        let mut dense = SentinelVec::<u32>::new();
        dense.add(5);
        dense.add(6);
        let element = dense.iter().last().unwrap();
        assert_eq!(dense.to_index(element), Some(1));
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut vec: UnorderedVec<i32> = (0..4).collect();
        vec.remove(2);
        vec.clear();
        assert!(vec.is_empty());
        assert_eq!(vec.count_unused(), 0);
        assert_eq!(vec.add(7), 0);

        let mut dense = SentinelVec::<i64>::new();
        dense.add(1);
        dense.clear();
        assert_eq!(dense.as_raw_slice(), &[i64::END]);
    }

    #[test]
    fn test_sentinel_values() {
        assert_eq!(u8::INVALID, 255);
        assert_eq!(u8::END, 254);
        assert_eq!(i32::INVALID, i32::MAX);
        assert!(u32::END.is_sentinel());
        assert!(!0u32.is_sentinel());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "does not hold a valid element")]
    fn test_double_remove_asserts_in_debug() {
        let mut vec = UnorderedVec::new();
        let index = vec.add(1);
        vec.remove(index);
        vec.remove(index);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_double_remove_is_a_no_op_in_release() {
        let mut vec = UnorderedVec::new();
        let index = vec.add(1);
        assert_eq!(vec.remove(index), Some(1));
        assert_eq!(vec.remove(index), None);
        assert_eq!(vec.count_unused(), 1);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "reserved sentinel")]
    fn test_adding_a_sentinel_asserts_in_debug() {
        let mut vec = SentinelVec::<u8>::new();
        vec.add(u8::INVALID);
    }
}
