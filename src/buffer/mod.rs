pub type FrameId = usize;

///  Replacer tracks frame usage for replacement in case the buffer pool is full.
pub trait Replacer: Send + Sync {
    /// Record the event that the given frame id is accessed at current timestamp.
    /// Create a new entry for access history if frame id has not been seen before.
    ///
    /// A frame id at or beyond the replacer capacity is a caller bug and
    /// terminates the program.
    fn record_access(&self, frame_id: FrameId);

    /// Find the frame to evict with the replace policy(backward k-distance). Only
    /// frames that are marked as evictable are candidates for eviction.
    ///
    /// Successful eviction of a frame should decrement the size of replacer and
    /// remove the frame's access history.
    ///
    /// Return the frame id if a frame is evicted successfully, None if no frames
    /// can be evicted.
    fn evict(&self) -> Option<FrameId>;

    /// Toggle whether a frame is evictable or non-evictable. this function also
    /// controls replacer size. Note that size is equal to number of evictable entries.
    ///
    /// If a frame was previously evictable and is to be set to non-evictable, then
    /// size should decrement. If a frame was previously non-evictable and is to be
    /// set evictable, then size should increment. For other scenarios, this function
    /// terminates without modifying anything.
    fn set_evictable(&self, frame_id: FrameId, evictable: bool);

    /// Check if a frame is evictable. if the frame is not found, return true.
    fn is_evictable(&self, frame_id: FrameId) -> bool;

    /// Remove a frame from the replacer, along with its access history. This
    /// function should also decrement the replacer size if removal is successful.
    ///
    /// Note that this is different from evicting a frame without checking the
    /// replace policy.
    ///
    /// If the specified frame is not found, do nothing. Calling remove on a
    /// non-evictable frame is a caller bug and terminates the program.
    fn remove(&self, frame_id: FrameId);

    /// Number of currently evictable frames.
    fn size(&self) -> usize;
}

pub mod bufferpool;
pub mod replacer;
