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

//! A packed array of fixed-width unsigned integers.
//!
//! A [`BitVector`] stores `len` elements of `bits_per_element` bits each
//! (1 to 32) back to back, with no padding between elements. Element `i`
//! occupies bits `i * bits .. (i + 1) * bits` of the byte stream, least
//! significant bit first. This is the layout used for compact flag and state
//! arrays such as resource-binding masks, where both sides agree on the
//! element width ahead of time.

use ebb_core::error::BitVectorError;
use std::fmt;

/// Smallest element width accepted by [`BitVector`].
pub const MIN_BITS_PER_ELEMENT: u32 = 1;

/// Largest element width accepted by [`BitVector`].
pub const MAX_BITS_PER_ELEMENT: u32 = 32;

/// Capacity reserved by the first growth of an owned, empty vector.
const MIN_GROWTH_CAPACITY: usize = 8;

/// `MASKS[start][end]` selects bits `start..end` of a byte.
///
/// Entries with `end <= start` are unused and left at zero.
pub(crate) const MASKS: [[u8; 9]; 8] = build_mask_table();

const fn build_mask_table() -> [[u8; 9]; 8] {
    let mut table = [[0u8; 9]; 8];
    let mut start = 0;
    while start < 8 {
        let mut end = start + 1;
        while end <= 8 {
            let ones: u16 = (1u16 << (end - start)) - 1;
            table[start][end] = (ones << start) as u8;
            end += 1;
        }
        start += 1;
    }
    table
}

/// Number of bytes needed to store `count` elements of `bits` bits.
#[inline]
const fn bytes_for(count: usize, bits: u32) -> usize {
    (count * bits as usize + 7) / 8
}

/// Reads `bits` bits starting at absolute bit position `bit_pos`.
#[inline]
fn read_bits(bytes: &[u8], bit_pos: usize, bits: u32) -> u32 {
    let mut value = 0u32;
    let mut shift = 0u32;
    let mut pos = bit_pos;
    let mut remaining = bits;

    while remaining > 0 {
        let start = pos % 8;
        let take = remaining.min(8 - start as u32);
        let end = start + take as usize;

        let part = (bytes[pos / 8] & MASKS[start][end]) >> start;
        value |= (part as u32) << shift;

        shift += take;
        remaining -= take;
        pos += take as usize;
    }
    value
}

/// Writes the low `bits` bits of `value` starting at absolute bit position `bit_pos`.
#[inline]
fn write_bits(bytes: &mut [u8], bit_pos: usize, bits: u32, value: u32) {
    let mut shift = 0u32;
    let mut pos = bit_pos;
    let mut remaining = bits;

    while remaining > 0 {
        let start = pos % 8;
        let take = remaining.min(8 - start as u32);
        let end = start + take as usize;
        let mask = MASKS[start][end];

        let part = ((value >> shift) as u8) << start;
        let byte = &mut bytes[pos / 8];
        *byte = (*byte & !mask) | (part & mask);

        shift += take;
        remaining -= take;
        pos += take as usize;
    }
}

/// Backing bytes of a [`BitVector`].
enum Storage<'buf> {
    /// Owned and grown by the vector. Its length always equals the byte size
    /// of the reserved capacity.
    Owned(Vec<u8>),
    /// Supplied by the caller through [`BitVector::acquire_buffer`]. Never resized.
    External(&'buf mut [u8]),
}

impl Storage<'_> {
    #[inline]
    fn bytes(&self) -> &[u8] {
        match self {
            Storage::Owned(bytes) => &bytes[..],
            Storage::External(bytes) => &bytes[..],
        }
    }

    #[inline]
    fn bytes_mut(&mut self) -> &mut [u8] {
        match self {
            Storage::Owned(bytes) => &mut bytes[..],
            Storage::External(bytes) => &mut bytes[..],
        }
    }
}

/// A growable array of unsigned integers packed at an arbitrary bit width.
///
/// The lifetime `'buf` is only meaningful once the vector has been switched to
/// a caller-owned buffer with [`acquire_buffer`](Self::acquire_buffer); vectors
/// that own their storage are `BitVector<'static>`.
///
/// # Example
///
/// ```rust
/// use ebb_data::bit_vector::BitVector;
///
/// // Eleven distinct states need four bits each.
/// let mut states = BitVector::from_value_count(11).unwrap();
/// assert_eq!(states.bits_per_element(), 4);
///
/// states.push(10).unwrap();
/// states.push(3).unwrap();
/// states.set(0, 7);
/// assert_eq!(states.get(0), 7);
/// assert_eq!(states.stored_byte_count(), 1);
/// ```
pub struct BitVector<'buf> {
    storage: Storage<'buf>,
    len: usize,
    capacity: usize,
    bits_per_element: u32,
}

impl BitVector<'static> {
    /// Creates an empty vector whose elements are `bits` bits wide.
    ///
    /// Fails with [`BitVectorError::InvalidBitWidth`] unless `bits` is in `1..=32`.
    pub fn from_bits_per_element(bits: u32) -> Result<Self, BitVectorError> {
        Self::with_capacity(bits, 0)
    }

    /// Creates an empty vector able to store values in `0..count`.
    ///
    /// The element width is `ceil(log2(count))`, with a minimum of one bit.
    pub fn from_value_count(count: u64) -> Result<Self, BitVectorError> {
        if count > 1u64 << MAX_BITS_PER_ELEMENT {
            return Err(BitVectorError::TooManyValues { count });
        }
        let bits = if count <= 1 {
            MIN_BITS_PER_ELEMENT
        } else {
            u64::BITS - (count - 1).leading_zeros()
        };
        Self::from_bits_per_element(bits.max(MIN_BITS_PER_ELEMENT))
    }

    /// Creates an empty vector of `bits`-wide elements with room for `capacity` elements.
    pub fn with_capacity(bits: u32, capacity: usize) -> Result<Self, BitVectorError> {
        if !(MIN_BITS_PER_ELEMENT..=MAX_BITS_PER_ELEMENT).contains(&bits) {
            return Err(BitVectorError::InvalidBitWidth { requested: bits });
        }
        Ok(Self {
            storage: Storage::Owned(vec![0; bytes_for(capacity, bits)]),
            len: 0,
            capacity,
            bits_per_element: bits,
        })
    }

    /// Creates a vector of `len` elements, all set to `value`.
    pub fn from_elem(bits: u32, value: u32, len: usize) -> Result<Self, BitVectorError> {
        let mut vector = Self::with_capacity(bits, len)?;
        vector.len = len;
        if value != 0 {
            for index in 0..len {
                vector.set(index, value);
            }
        }
        Ok(vector)
    }
}

impl<'buf> BitVector<'buf> {
    /// Returns the number of elements stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the vector holds no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of elements the current storage can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the width of every element, in bits.
    #[inline]
    pub fn bits_per_element(&self) -> u32 {
        self.bits_per_element
    }

    /// Returns the largest value an element can hold.
    #[inline]
    pub fn element_mask(&self) -> u32 {
        u32::MAX >> (u32::BITS - self.bits_per_element)
    }

    /// Returns the number of bytes actually used by the stored elements,
    /// `ceil(len * bits_per_element / 8)`.
    #[inline]
    pub fn stored_byte_count(&self) -> usize {
        bytes_for(self.len, self.bits_per_element)
    }

    /// Returns `true` if the vector writes into a caller-owned buffer.
    pub fn is_external(&self) -> bool {
        matches!(self.storage, Storage::External(_))
    }

    /// Returns the packed bytes holding the stored elements.
    ///
    /// Bits past the last element in the final byte are always zero.
    pub fn as_bytes(&self) -> &[u8] {
        &self.storage.bytes()[..self.stored_byte_count()]
    }

    /// Reads the element at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    #[inline]
    pub fn get(&self, index: usize) -> u32 {
        assert!(
            index < self.len,
            "BitVector index {index} out of bounds (len {})",
            self.len
        );
        read_bits(
            self.storage.bytes(),
            index * self.bits_per_element as usize,
            self.bits_per_element,
        )
    }

    /// Overwrites the element at `index`.
    ///
    /// `value` must fit in [`bits_per_element`](Self::bits_per_element) bits;
    /// this is checked in debug builds only. In release builds the value is
    /// truncated to the element width, so neighbouring elements are never
    /// affected.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    #[inline]
    pub fn set(&mut self, index: usize, value: u32) {
        assert!(
            index < self.len,
            "BitVector index {index} out of bounds (len {})",
            self.len
        );
        debug_assert!(
            value <= self.element_mask(),
            "value {value} does not fit in {} bits",
            self.bits_per_element
        );
        let bits = self.bits_per_element;
        let value = value & self.element_mask();
        write_bits(self.storage.bytes_mut(), index * bits as usize, bits, value);
    }

    /// Appends an element, growing owned storage when needed.
    ///
    /// Fails with [`BitVectorError::ExternalBufferTooSmall`] if the vector uses
    /// an external buffer that is already full.
    pub fn push(&mut self, value: u32) -> Result<(), BitVectorError> {
        if self.len == self.capacity {
            let new_capacity = (self.capacity * 2).max(MIN_GROWTH_CAPACITY);
            self.reserve_exact_capacity(new_capacity)?;
        }
        self.len += 1;
        self.set(self.len - 1, value);
        Ok(())
    }

    /// Removes and returns the last element.
    pub fn pop(&mut self) -> Option<u32> {
        if self.len == 0 {
            return None;
        }
        let value = self.get(self.len - 1);
        self.len -= 1;
        self.clear_tail();
        Some(value)
    }

    /// Sets the reserved capacity to `capacity` elements.
    ///
    /// Shrinking below the current length truncates the vector. On an external
    /// buffer the capacity can only be changed within the buffer's size.
    pub fn resize(&mut self, capacity: usize) -> Result<(), BitVectorError> {
        self.reserve_exact_capacity(capacity)?;
        if capacity < self.len {
            self.len = capacity;
            self.clear_tail();
        }
        Ok(())
    }

    /// Overwrites every stored element with `value`.
    pub fn fill(&mut self, value: u32) {
        for index in 0..self.len {
            self.set(index, value);
        }
    }

    /// Removes every element, keeping the storage.
    pub fn clear(&mut self) {
        self.len = 0;
        self.clear_tail();
    }

    /// Switches the vector to a caller-owned buffer.
    ///
    /// Existing elements are copied into `buffer`. Afterwards the capacity is
    /// whatever fits into `buffer` and the vector never reallocates it; pushing
    /// past that capacity returns an error.
    pub fn acquire_buffer<'b>(self, buffer: &'b mut [u8]) -> Result<BitVector<'b>, BitVectorError> {
        let required_bytes = self.stored_byte_count();
        if buffer.len() < required_bytes {
            return Err(BitVectorError::ExternalBufferTooSmall {
                required_bytes,
                available_bytes: buffer.len(),
            });
        }
        buffer[..required_bytes].copy_from_slice(self.as_bytes());

        let capacity = buffer.len() * 8 / self.bits_per_element as usize;
        let mut vector = BitVector {
            storage: Storage::External(buffer),
            len: self.len,
            capacity,
            bits_per_element: self.bits_per_element,
        };
        vector.clear_tail();
        Ok(vector)
    }

    /// Returns an iterator over the stored values.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.len).map(move |index| self.get(index))
    }

    fn reserve_exact_capacity(&mut self, capacity: usize) -> Result<(), BitVectorError> {
        let required_bytes = bytes_for(capacity, self.bits_per_element);
        match &mut self.storage {
            Storage::Owned(bytes) => bytes.resize(required_bytes, 0),
            Storage::External(bytes) => {
                if bytes.len() < required_bytes {
                    return Err(BitVectorError::ExternalBufferTooSmall {
                        required_bytes,
                        available_bytes: bytes.len(),
                    });
                }
            }
        }
        self.capacity = capacity;
        Ok(())
    }

    /// Zeroes every bit past the last element.
    fn clear_tail(&mut self) {
        let first_bit = self.len * self.bits_per_element as usize;
        let bytes = self.storage.bytes_mut();
        let mut byte = first_bit / 8;
        let start = first_bit % 8;
        if start > 0 {
            bytes[byte] &= MASKS[0][start];
            byte += 1;
        }
        if byte < bytes.len() {
            bytes[byte..].fill(0);
        }
    }
}

impl fmt::Debug for BitVector<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitVector")
            .field("bits_per_element", &self.bits_per_element)
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .field("external", &self.is_external())
            .field("values", &self.iter().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_values(bits: u32) -> Vec<u32> {
        let max = u32::MAX >> (32 - bits);
        if bits <= 8 {
            (0..=max).collect()
        } else {
            vec![0, 1, max, max >> 1, max / 3, 0x5555_5555 & max, 0xAAAA_AAAA & max]
        }
    }

    #[test]
    fn test_mask_table() {
        assert_eq!(MASKS[0][8], 0xFF);
        assert_eq!(MASKS[0][1], 0b0000_0001);
        assert_eq!(MASKS[7][8], 0b1000_0000);
        assert_eq!(MASKS[2][5], 0b0001_1100);
        assert_eq!(MASKS[3][3], 0);
    }

    #[test]
    fn test_round_trip_every_width() {
        for bits in MIN_BITS_PER_ELEMENT..=MAX_BITS_PER_ELEMENT {
            let values = sample_values(bits);
            for len in [1usize, 2, 3, 7, 9, 17] {
                let mut vector = BitVector::from_elem(bits, 0, len).unwrap();
                for index in 0..len {
                    for &value in &values {
                        vector.set(index, value);
                        assert_eq!(vector.get(index), value, "bits {bits}, index {index}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_neighbours_are_untouched() {
        for bits in [3u32, 5, 7, 12, 31] {
            let max = u32::MAX >> (32 - bits);
            let mut vector = BitVector::from_elem(bits, max, 5).unwrap();
            vector.set(2, 0);
            assert_eq!(vector.iter().collect::<Vec<_>>(), vec![max, max, 0, max, max]);
        }
    }

    #[test]
    fn test_from_value_count_widths() {
        let cases = [
            (0u64, 1u32),
            (1, 1),
            (2, 1),
            (3, 2),
            (4, 2),
            (5, 3),
            (256, 8),
            (257, 9),
            (1 << 32, 32),
        ];
        for (count, bits) in cases {
            let vector = BitVector::from_value_count(count).unwrap();
            assert_eq!(vector.bits_per_element(), bits, "count {count}");
        }
        assert_eq!(
            BitVector::from_value_count((1 << 32) + 1).unwrap_err(),
            BitVectorError::TooManyValues {
                count: (1 << 32) + 1
            }
        );
    }

    #[test]
    fn test_invalid_widths_are_rejected() {
        assert_eq!(
            BitVector::from_bits_per_element(0).unwrap_err(),
            BitVectorError::InvalidBitWidth { requested: 0 }
        );
        assert!(BitVector::from_bits_per_element(33).is_err());
        assert!(BitVector::from_bits_per_element(32).is_ok());
    }

    #[test]
    fn test_stored_byte_count() {
        let mut vector = BitVector::from_bits_per_element(3).unwrap();
        assert_eq!(vector.stored_byte_count(), 0);
        for count in 1..=20usize {
            vector.push(5).unwrap();
            assert_eq!(vector.stored_byte_count(), (count * 3 + 7) / 8);
            assert_eq!(vector.as_bytes().len(), vector.stored_byte_count());
        }
    }

    #[test]
    fn test_push_grows_capacity() {
        let mut vector = BitVector::from_bits_per_element(13).unwrap();
        assert_eq!(vector.capacity(), 0);
        for value in 0..100 {
            vector.push(value).unwrap();
        }
        assert!(vector.capacity() >= 100);
        assert!(vector.iter().eq(0..100));
    }

    #[test]
    fn test_resize_truncates_and_clears_tail() {
        let mut vector = BitVector::from_elem(1, 1, 12).unwrap();
        vector.resize(3).unwrap();
        assert_eq!(vector.len(), 3);
        assert_eq!(vector.capacity(), 3);
        assert_eq!(vector.as_bytes(), &[0b0000_0111]);

        vector.resize(16).unwrap();
        assert_eq!(vector.len(), 3);
        vector.push(0).unwrap();
        assert_eq!(vector.get(3), 0);
    }

    #[test]
    fn test_fill() {
        let mut vector = BitVector::from_elem(2, 1, 5).unwrap();
        vector.fill(3);
        assert_eq!(vector.as_bytes(), &[0xFF, 0b11]);
        vector.fill(0);
        assert!(vector.iter().all(|value| value == 0));
    }

    #[test]
    fn test_pop_and_clear() {
        let mut vector = BitVector::from_bits_per_element(6).unwrap();
        vector.push(33).unwrap();
        vector.push(17).unwrap();
        assert_eq!(vector.pop(), Some(17));
        assert_eq!(vector.as_bytes(), &[33]);
        vector.clear();
        assert!(vector.is_empty());
        assert_eq!(vector.pop(), None);
    }

    #[test]
    fn test_acquire_buffer_copies_and_stops_growing() {
        let mut vector = BitVector::from_bits_per_element(4).unwrap();
        vector.push(0xA).unwrap();
        vector.push(0x3).unwrap();
        vector.push(0xF).unwrap();

        let mut buffer = [0xEEu8; 2];
        let mut external = vector.acquire_buffer(&mut buffer).unwrap();
        assert!(external.is_external());
        assert_eq!(external.capacity(), 4);
        assert_eq!(external.iter().collect::<Vec<_>>(), vec![0xA, 0x3, 0xF]);

        external.push(0x1).unwrap();
        assert_eq!(
            external.push(0x2),
            Err(BitVectorError::ExternalBufferTooSmall {
                required_bytes: 4,
                available_bytes: 2
            })
        );
        assert!(external.resize(8).is_err());
        drop(external);
        assert_eq!(buffer, [0x3A, 0x1F]);
    }

    #[test]
    fn test_acquire_buffer_too_small() {
        let vector = BitVector::from_elem(8, 1, 3).unwrap();
        let mut buffer = [0u8; 2];
        assert_eq!(
            vector.acquire_buffer(&mut buffer).unwrap_err(),
            BitVectorError::ExternalBufferTooSmall {
                required_bytes: 3,
                available_bytes: 2
            }
        );
    }

    #[test]
    #[should_panic]
    fn test_get_out_of_bounds_panics() {
        let vector = BitVector::from_elem(5, 0, 4).unwrap();
        vector.get(4);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "does not fit")]
    fn test_oversized_value_is_caught_in_debug() {
        let mut vector = BitVector::from_elem(3, 0, 2).unwrap();
        vector.set(0, 8);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_oversized_value_is_truncated_in_release() {
        let mut vector = BitVector::from_elem(3, 7, 2).unwrap();
        vector.set(0, 0b1000);
        assert_eq!(vector.get(0), 0);
        assert_eq!(vector.get(1), 7);
    }
}
