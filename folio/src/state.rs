use crate::ScrollDirection;

/// A snapshot of what the viewport currently shows.
///
/// Recomputed from the list on demand; with `feature = "serde"` it can be stored by the host
/// (e.g. to restore a reading position within a session).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ViewportState {
    pub scroll_offset: u64,
    /// First visible index (no overscan).
    pub visible_start_index: usize,
    /// Last visible index, inclusive. Equal to `visible_start_index` for an empty list.
    pub visible_stop_index: usize,
    pub scroll_direction: Option<ScrollDirection>,
}
