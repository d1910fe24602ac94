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

//! Optional instrumentation that tracks every live slot of a pool.
//!
//! With the `consistency-check` feature enabled, each pool records the
//! `(address, index)` pair of every slot it hands out and asserts that released
//! handles are in the set. Without the feature the tracker is zero-sized and
//! every call compiles away.

#[cfg(feature = "consistency-check")]
mod imp {
    use ahash::AHashSet;

    #[derive(Debug, Default)]
    pub(crate) struct ConsistencyTracker {
        live: AHashSet<(usize, u32)>,
    }

    impl ConsistencyTracker {
        pub(crate) fn on_request(&mut self, addr: usize, index: u32) {
            let inserted = self.live.insert((addr, index));
            assert!(inserted, "slot {index} at {addr:#x} was handed out twice");
        }

        pub(crate) fn on_release(&mut self, addr: usize, index: u32) {
            let removed = self.live.remove(&(addr, index));
            assert!(
                removed,
                "released slot {index} at {addr:#x} is not live in this pool"
            );
        }

        pub(crate) fn clear(&mut self) {
            self.live.clear();
        }

        #[cfg(test)]
        pub(crate) fn len(&self) -> usize {
            self.live.len()
        }
    }
}

#[cfg(not(feature = "consistency-check"))]
mod imp {
    #[derive(Debug, Default)]
    pub(crate) struct ConsistencyTracker;

    impl ConsistencyTracker {
        #[inline(always)]
        pub(crate) fn on_request(&mut self, _addr: usize, _index: u32) {}

        #[inline(always)]
        pub(crate) fn on_release(&mut self, _addr: usize, _index: u32) {}

        #[inline(always)]
        pub(crate) fn clear(&mut self) {}
    }
}

pub(crate) use imp::ConsistencyTracker;
