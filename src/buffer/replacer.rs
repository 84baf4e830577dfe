use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Mutex;

use super::{FrameId, Replacer};

struct LRUKNode {
    k: usize,
    frame_id: FrameId,
    is_evictable: bool,
    /// History of the last seen K access timestamps of the frame.
    /// Least recent timestamp stored in front.
    history: VecDeque<usize>,
}

impl LRUKNode {
    fn new(frame_id: FrameId, k: usize) -> Self {
        assert!(k > 0, "replacer k should be larger than zero");
        LRUKNode { history: VecDeque::with_capacity(k), k, frame_id, is_evictable: false }
    }

    fn record_access(&mut self, timestamp: usize) {
        if self.history.len() == self.k {
            self.history.pop_front();
        }
        self.history.push_back(timestamp)
    }

    fn has_k_accesses(&self) -> bool {
        self.history.len() == self.k
    }

    /// Ordering key within the node's list. With fewer than k accesses the
    /// history is append-only, so the front is the frame's first recorded
    /// access; with k accesses the front is the k-th most recent one.
    /// Timestamps are unique, the frame id only makes the key total.
    fn order_key(&self) -> (usize, FrameId) {
        let front = self.history.front().expect("access history is never empty");
        (*front, self.frame_id)
    }
}

/// LRUKReplacer implements the LRU-k replacement policy.
///
/// The LRU-k algorithm evicts the frame whose backward k-distance is the
/// maximum of all frames, where backward k-distance is the time since the
/// k-th previous access. A frame with fewer than k recorded accesses has
/// infinite backward k-distance; when multiple frames qualify, classical
/// LRU over their first recorded access picks the victim.
///
/// Candidates live in one of two orderings: frames with fewer than k
/// accesses sorted by first access, and frames with k accesses sorted by
/// their k-th most recent access. Eviction drains the first ordering
/// before ever touching the second.
pub struct LRUKReplacer {
    nodes: HashMap<FrameId, LRUKNode>,
    /// Evictable frames with fewer than k accesses.
    kless: BTreeSet<(usize, FrameId)>,
    /// Evictable frames with a full k-access history.
    kfull: BTreeSet<(usize, FrameId)>,
    current_timestamp: usize,
    current_size: usize,
    replacer_size: usize,
    k: usize,
}

impl LRUKReplacer {
    pub fn new(k: usize, size: usize) -> Self {
        LRUKReplacer {
            nodes: HashMap::new(),
            kless: BTreeSet::new(),
            kfull: BTreeSet::new(),
            current_timestamp: 0,
            current_size: 0,
            replacer_size: size,
            k,
        }
    }

    fn record_access(&mut self, frame_id: FrameId) {
        assert!(
            frame_id < self.replacer_size,
            "frame id {} beyond replacer capacity {}",
            frame_id,
            self.replacer_size
        );
        let timestamp = self.current_timestamp;
        self.current_timestamp += 1;

        if !self.nodes.contains_key(&frame_id) {
            let mut node = LRUKNode::new(frame_id, self.k);
            node.record_access(timestamp);
            self.nodes.insert(frame_id, node);
            return;
        }

        let node = self.nodes.get_mut(&frame_id).unwrap();
        let old_key = node.order_key();
        let was_full = node.has_k_accesses();
        node.record_access(timestamp);
        let new_key = node.order_key();
        let now_full = node.has_k_accesses();
        if !node.is_evictable {
            return;
        }
        // reposition within, or migrate between, the two orderings
        if was_full {
            self.kfull.remove(&old_key);
        } else {
            self.kless.remove(&old_key);
        }
        if now_full {
            self.kfull.insert(new_key);
        } else {
            self.kless.insert(new_key);
        }
    }

    /// Evict the frame with the largest backward k-distance: the head of
    /// the under-k ordering when it is non-empty, else the head of the
    /// full-history ordering.
    fn evict(&mut self) -> Option<FrameId> {
        let (_, frame_id) = self.kless.pop_first().or_else(|| self.kfull.pop_first())?;
        self.nodes.remove(&frame_id);
        self.current_size -= 1;
        Some(frame_id)
    }

    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        let node = match self.nodes.get_mut(&frame_id) {
            Some(node) => node,
            None => return,
        };
        if node.is_evictable == evictable {
            return;
        }
        node.is_evictable = evictable;
        let key = node.order_key();
        let full = node.has_k_accesses();
        let list = if full { &mut self.kfull } else { &mut self.kless };
        if evictable {
            list.insert(key);
            self.current_size += 1;
        } else {
            list.remove(&key);
            self.current_size -= 1;
        }
    }

    fn is_evictable(&self, frame_id: FrameId) -> bool {
        match self.nodes.get(&frame_id) {
            Some(node) => node.is_evictable,
            None => true,
        }
    }

    fn remove(&mut self, frame_id: FrameId) {
        let node = match self.nodes.get(&frame_id) {
            Some(node) => node,
            None => return,
        };
        assert!(node.is_evictable, "remove called on non-evictable frame {}", frame_id);
        let key = node.order_key();
        if node.has_k_accesses() {
            self.kfull.remove(&key);
        } else {
            self.kless.remove(&key);
        }
        self.nodes.remove(&frame_id);
        self.current_size -= 1;
    }

    fn size(&self) -> usize {
        self.current_size
    }
}

/// SyncLRUKReplacer implements the thread-safe version of the LRU-k
/// replacement policy, basically all the heavy lifting happens in the
/// LRUKReplacer.
pub struct SyncLRUKReplacer {
    inner: Mutex<LRUKReplacer>,
}

impl SyncLRUKReplacer {
    pub fn new(k: usize, size: usize) -> Self {
        SyncLRUKReplacer { inner: Mutex::new(LRUKReplacer::new(k, size)) }
    }
}

impl Replacer for SyncLRUKReplacer {
    fn record_access(&self, frame_id: FrameId) {
        let mut guard = self.inner.lock().unwrap();
        guard.record_access(frame_id)
    }

    fn evict(&self) -> Option<FrameId> {
        let mut guard = self.inner.lock().unwrap();
        guard.evict()
    }

    fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        let mut guard = self.inner.lock().unwrap();
        guard.set_evictable(frame_id, evictable)
    }

    fn is_evictable(&self, frame_id: FrameId) -> bool {
        let guard = self.inner.lock().unwrap();
        guard.is_evictable(frame_id)
    }

    fn remove(&self, frame_id: FrameId) {
        let mut guard = self.inner.lock().unwrap();
        guard.remove(frame_id)
    }

    fn size(&self) -> usize {
        let guard = self.inner.lock().unwrap();
        guard.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_under_k_lru_order() {
        // Scenario: k=2, three frames each accessed once and evictable.
        // All have infinite backward k-distance, classical LRU applies and
        // the earliest first access goes first.
        let mut replacer = LRUKReplacer::new(2, 3);
        replacer.record_access(1);
        replacer.record_access(2);
        replacer.record_access(0);
        for frame_id in 0..3 {
            replacer.set_evictable(frame_id, true);
        }
        assert_eq!(3, replacer.size());

        assert_eq!(Some(1), replacer.evict());
        assert_eq!(Some(2), replacer.evict());
        assert_eq!(Some(0), replacer.evict());
        assert_eq!(None, replacer.evict());
    }

    #[test]
    fn test_under_k_beats_full_history() {
        // Scenario: k=2. Frame 0 reaches a full history, frames 1 and 2
        // have a single access. The under-k frames are evicted first even
        // though frame 0 was touched before them.
        let mut replacer = LRUKReplacer::new(2, 3);
        replacer.record_access(0);
        replacer.record_access(0);
        replacer.record_access(1);
        replacer.record_access(2);
        for frame_id in 0..3 {
            replacer.set_evictable(frame_id, true);
        }

        assert_eq!(Some(1), replacer.evict());
        assert_eq!(Some(2), replacer.evict());
        assert_eq!(Some(0), replacer.evict());
    }

    #[test]
    fn test_lruk_replacer() {
        let mut replacer = LRUKReplacer::new(2, 7);

        // Scenario: add six frames to the replacer. We have [1,2,3,4,5].
        // Frame 6 is kept non-evictable.
        replacer.record_access(1);
        replacer.record_access(2);
        replacer.record_access(3);
        replacer.record_access(4);
        replacer.record_access(5);
        replacer.record_access(6);
        replacer.set_evictable(1, true);
        replacer.set_evictable(2, true);
        replacer.set_evictable(3, true);
        replacer.set_evictable(4, true);
        replacer.set_evictable(5, true);
        replacer.set_evictable(6, false);
        assert_eq!(5, replacer.size());

        // Scenario: insert access history for frame 1. Now frame 1 has two
        // access histories. All other frames have max backward k-distance,
        // so the order of eviction is [2,3,4,5,1].
        replacer.record_access(1);

        // Scenario: evict three frames from the replacer. Frames with max
        // k-distance should be popped first based on LRU.
        assert_eq!(Some(2), replacer.evict());
        assert_eq!(Some(3), replacer.evict());
        assert_eq!(Some(4), replacer.evict());
        assert_eq!(2, replacer.size());

        // Scenario: now the replacer has frames [5,1]. Insert new frames
        // 3, 4, and update the access history for 5. We should end with
        // [3,1,5,4].
        replacer.record_access(3);
        replacer.record_access(4);
        replacer.record_access(5);
        replacer.record_access(4);
        replacer.set_evictable(3, true);
        replacer.set_evictable(4, true);
        assert_eq!(4, replacer.size());

        // Scenario: continue looking for victims. We expect 3 to be evicted next.
        assert_eq!(Some(3), replacer.evict());
        assert_eq!(3, replacer.size());

        // Set 6 to be evictable. 6 should be evicted next since it has the
        // max backward k-distance.
        replacer.set_evictable(6, true);
        assert_eq!(4, replacer.size());
        assert_eq!(Some(6), replacer.evict());
        assert_eq!(3, replacer.size());

        // Now we have [1,5,4]. Continue looking for victims.
        replacer.set_evictable(1, false);
        assert_eq!(2, replacer.size());
        assert_eq!(Some(5), replacer.evict());
        assert_eq!(1, replacer.size());

        // Update access history for 1. Now we have [4,1]. Next victim is 4.
        replacer.record_access(1);
        replacer.record_access(1);
        replacer.set_evictable(1, true);
        assert_eq!(2, replacer.size());
        assert_eq!(Some(4), replacer.evict());

        assert_eq!(1, replacer.size());
        assert_eq!(Some(1), replacer.evict());
        assert_eq!(0, replacer.size());

        // These operations should not modify size.
        assert_eq!(None, replacer.evict());
        assert_eq!(0, replacer.size());
        replacer.remove(1);
        assert_eq!(0, replacer.size());
    }

    #[test]
    fn test_unpinned_frame_becomes_candidate_again() {
        let mut replacer = LRUKReplacer::new(2, 2);
        replacer.record_access(0);
        replacer.set_evictable(0, true);
        assert_eq!(1, replacer.size());

        // pinning pulls the frame out of candidacy
        replacer.set_evictable(0, false);
        assert_eq!(0, replacer.size());
        assert_eq!(None, replacer.evict());

        // unpinning restores it on the very next request
        replacer.set_evictable(0, true);
        assert_eq!(Some(0), replacer.evict());
    }

    #[test]
    fn test_remove_forgets_history() {
        let mut replacer = LRUKReplacer::new(2, 3);
        replacer.record_access(0);
        replacer.record_access(0);
        replacer.record_access(1);
        replacer.set_evictable(0, true);
        replacer.set_evictable(1, true);

        replacer.remove(0);
        assert_eq!(1, replacer.size());

        // frame 0 comes back with a fresh, single-entry history and now
        // loses the LRU race against frame 1
        replacer.record_access(0);
        replacer.set_evictable(0, true);
        assert_eq!(Some(1), replacer.evict());
        assert_eq!(Some(0), replacer.evict());
    }

    #[test]
    #[should_panic(expected = "beyond replacer capacity")]
    fn test_record_access_out_of_range() {
        let mut replacer = LRUKReplacer::new(2, 3);
        replacer.record_access(3);
    }

    #[test]
    #[should_panic(expected = "non-evictable frame")]
    fn test_remove_non_evictable() {
        let mut replacer = LRUKReplacer::new(2, 3);
        replacer.record_access(0);
        replacer.remove(0);
    }

    #[test]
    fn test_sync_replacer() {
        let replacer = SyncLRUKReplacer::new(2, 3);
        replacer.record_access(0);
        replacer.record_access(1);
        replacer.set_evictable(0, true);
        replacer.set_evictable(1, true);
        assert_eq!(2, replacer.size());
        assert!(replacer.is_evictable(0));

        assert_eq!(Some(0), replacer.evict());
        replacer.remove(1);
        assert_eq!(0, replacer.size());
    }
}
