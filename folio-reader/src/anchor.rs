use core::fmt;

use folio::VirtualList;

/// A scroll position expressed relative to an item identity, so it survives index shifts.
///
/// Capture before splicing content in above the viewport (or before re-estimating sizes),
/// apply afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct ScrollAnchor<K> {
    pub key: K,
    /// The distance from the anchor item's start to the viewport's scroll offset.
    pub offset_in_viewport: u64,
}

impl<K: fmt::Debug> fmt::Debug for ScrollAnchor<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrollAnchor")
            .field("key", &self.key)
            .field("offset_in_viewport", &self.offset_in_viewport)
            .finish()
    }
}

/// Captures an anchor on the first visible item.
///
/// Before the viewport has a size the item at the scroll offset stands in for it. Returns
/// `None` when the list is empty or `key_of` has no key for the item.
pub fn capture_first_visible_anchor<K>(
    list: &VirtualList,
    key_of: impl FnOnce(usize) -> Option<K>,
) -> Option<ScrollAnchor<K>> {
    let visible = list.visible_range();
    let index = if visible.is_empty() {
        list.index_at_offset(list.scroll_offset())?
    } else {
        visible.start_index
    };
    let start = list.item_start(index)?;
    Some(ScrollAnchor {
        key: key_of(index)?,
        offset_in_viewport: list.scroll_offset().saturating_sub(start),
    })
}

/// Moves the scroll offset so the anchor item sits where it was captured.
///
/// `key_to_index` maps the key into the *current* item set. The in-item offset is applied
/// as captured, so the anchor item keeps its exact screen position even if it was resized.
///
/// Returns `true` when the anchor item was found.
pub fn apply_anchor<K>(
    list: &mut VirtualList,
    anchor: &ScrollAnchor<K>,
    key_to_index: impl FnOnce(&K) -> Option<usize>,
) -> bool {
    let Some(index) = key_to_index(&anchor.key) else {
        return false;
    };
    let Some(item_start) = list.item_start(index) else {
        return false;
    };
    list.set_scroll_offset_clamped(item_start.saturating_add(anchor.offset_in_viewport));
    vtrace!(index, offset = list.scroll_offset(), "anchor applied");
    true
}
