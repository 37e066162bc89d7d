use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cmp;

use crate::fenwick::Fenwick;
use crate::options::EstimateSize;
use crate::{Align, ListOptions, ScrollDirection, ViewportState, VirtualItem, VirtualRange};

/// A headless variable-size list.
///
/// The list owns the size cache (index → height) and the scroll position. It never holds
/// item content: the host renders whatever indexes [`for_each_virtual_item`] yields, and
/// everything outside the visible range plus overscan exists only as `(index, size)`.
///
/// The size cache is filled from `estimate_size` and refined by [`measure`]. It is only
/// valid for the item source and estimator it was built with; [`reset_after_index`]
/// throws away everything from an index onward.
///
/// [`for_each_virtual_item`]: Self::for_each_virtual_item
/// [`measure`]: Self::measure
/// [`reset_after_index`]: Self::reset_after_index
#[derive(Clone, Debug)]
pub struct VirtualList {
    options: ListOptions,
    viewport_size: u32,
    scroll_offset: u64,
    scroll_direction: Option<ScrollDirection>,

    sizes: Vec<u32>,
    measured: Vec<bool>,
    sums: Fenwick,

    layout_epoch: u64,
}

impl VirtualList {
    pub fn new(options: ListOptions) -> Self {
        vdebug!(
            count = options.count,
            overscan = options.overscan,
            "VirtualList::new"
        );
        let mut list = Self {
            viewport_size: 0,
            scroll_offset: 0,
            scroll_direction: None,
            sizes: Vec::new(),
            measured: Vec::new(),
            sums: Fenwick::default(),
            layout_epoch: 0,
            options,
        };
        list.fill_sizes();
        list
    }

    pub fn options(&self) -> &ListOptions {
        &self.options
    }

    pub fn count(&self) -> usize {
        self.options.count
    }

    pub fn viewport_size(&self) -> u32 {
        self.viewport_size
    }

    pub fn scroll_offset(&self) -> u64 {
        self.scroll_offset
    }

    pub fn scroll_direction(&self) -> Option<ScrollDirection> {
        self.scroll_direction
    }

    /// Incremented every time cached sizes are thrown away.
    ///
    /// Hosts that keep their own layout (row positions, measured DOM nodes) should re-layout
    /// whenever this changes.
    pub fn layout_epoch(&self) -> u64 {
        self.layout_epoch
    }

    pub fn set_viewport_size(&mut self, size: u32) {
        self.viewport_size = size;
    }

    pub fn set_scroll_offset(&mut self, offset: u64) {
        if self.scroll_offset == offset {
            return;
        }
        let prev = self.scroll_offset;
        self.scroll_offset = offset;
        self.scroll_direction = match offset.cmp(&prev) {
            cmp::Ordering::Greater => Some(ScrollDirection::Forward),
            cmp::Ordering::Less => Some(ScrollDirection::Backward),
            cmp::Ordering::Equal => self.scroll_direction,
        };
    }

    pub fn set_scroll_offset_clamped(&mut self, offset: u64) {
        let clamped = self.clamp_scroll_offset(offset);
        self.set_scroll_offset(clamped);
    }

    pub fn set_viewport_and_scroll_clamped(&mut self, viewport_size: u32, scroll_offset: u64) {
        self.set_viewport_size(viewport_size);
        self.set_scroll_offset_clamped(scroll_offset);
    }

    /// Replaces the item source.
    ///
    /// Cached sizes below `valid_prefix` are kept (use the previous count after a pure append);
    /// everything else is re-estimated with `estimate_size`.
    pub fn set_items(
        &mut self,
        count: usize,
        estimate_size: impl Fn(usize) -> u32 + Send + Sync + 'static,
        valid_prefix: usize,
    ) {
        vdebug!(
            count,
            prev_count = self.options.count,
            valid_prefix,
            "VirtualList::set_items"
        );
        self.options.count = count;
        self.options.estimate_size = Arc::new(estimate_size);
        self.reset_after_index(valid_prefix);
    }

    /// Inserts `added` items in front of the existing ones.
    ///
    /// Cached sizes, measured or not, move with their items and only the new items are
    /// estimated. The scroll offset grows by the inserted extent so the content in view stays
    /// put. Returns that extent.
    pub fn prepend_items(
        &mut self,
        added: usize,
        estimate_size: impl Fn(usize) -> u32 + Send + Sync + 'static,
    ) -> u64 {
        let estimate_size: EstimateSize = Arc::new(estimate_size);
        let mut sizes = Vec::with_capacity(self.sizes.len() + added);
        sizes.extend((0..added).map(|index| estimate_size(index)));
        let inserted: u64 = sizes.iter().map(|&size| size as u64).sum();
        sizes.extend_from_slice(&self.sizes);

        let mut measured = Vec::with_capacity(sizes.len());
        measured.resize(added, false);
        measured.extend_from_slice(&self.measured);

        vdebug!(added, inserted, count = self.options.count + added, "prepend_items");
        self.options.count += added;
        self.options.estimate_size = estimate_size;
        self.sums = Fenwick::from_sizes(&sizes);
        self.sizes = sizes;
        self.measured = measured;
        self.fill_sizes();
        self.scroll_offset = self.scroll_offset.saturating_add(inserted);
        self.layout_epoch = self.layout_epoch.wrapping_add(1);
        inserted
    }

    /// Replaces the estimator. Every cached size is stale afterwards, so this resets from 0.
    pub fn set_estimate_size(&mut self, estimate_size: impl Fn(usize) -> u32 + Send + Sync + 'static) {
        self.options.estimate_size = Arc::new(estimate_size);
        self.reset_after_index(0);
    }

    /// Invalidates cached sizes (estimated and measured) from `index` onward and re-estimates
    /// them.
    pub fn reset_after_index(&mut self, index: usize) {
        let keep = index.min(self.options.count).min(self.sizes.len());
        vdebug!(index, keep, count = self.options.count, "reset_after_index");
        self.sizes.truncate(keep);
        self.measured.truncate(keep);
        self.sums.truncate(keep);
        self.fill_sizes();
        self.layout_epoch = self.layout_epoch.wrapping_add(1);
    }

    /// Size of item `index`: the cached value, or the estimate (which is then cached).
    pub fn get_item_size(&mut self, index: usize) -> Option<u32> {
        if index >= self.options.count {
            return None;
        }
        if index >= self.sizes.len() {
            self.fill_sizes();
        }
        self.sizes.get(index).copied()
    }

    /// Cached size of item `index`, without filling the cache.
    pub fn item_size(&self, index: usize) -> Option<u32> {
        self.sizes.get(index).copied()
    }

    pub fn is_measured(&self, index: usize) -> bool {
        self.measured.get(index).copied().unwrap_or(false)
    }

    /// Feeds a post-render measurement back into the cache.
    ///
    /// When the item starts above the current scroll offset, the offset moves by the same
    /// delta so the content in view stays put. Returns the applied scroll adjustment.
    pub fn measure(&mut self, index: usize, size: u32) -> i64 {
        if index >= self.sizes.len() {
            return 0;
        }
        let start = self.start_of(index);
        let cur = self.sizes[index];
        self.measured[index] = true;
        if cur == size {
            return 0;
        }
        vtrace!(index, cur, size, "measure");
        self.sizes[index] = size;
        let delta = size as i64 - cur as i64;
        self.sums.add(index, delta);

        if start >= self.scroll_offset {
            return 0;
        }
        if delta > 0 {
            self.scroll_offset = self.scroll_offset.saturating_add(delta as u64);
        } else {
            self.scroll_offset = self.scroll_offset.saturating_sub(delta.unsigned_abs());
        }
        delta
    }

    pub fn total_size(&self) -> u64 {
        self.options.padding_start as u64 + self.sums.total() + self.options.padding_end as u64
    }

    pub fn max_scroll_offset(&self) -> u64 {
        self.total_size().saturating_sub(self.viewport_size as u64)
    }

    pub fn clamp_scroll_offset(&self, offset: u64) -> u64 {
        offset.min(self.max_scroll_offset())
    }

    /// Visible range plus overscan on both sides.
    pub fn virtual_range(&self) -> VirtualRange {
        let mut range = self.visible_range();
        if range.is_empty() {
            return range;
        }
        let overscan = self.options.overscan;
        range.start_index = range.start_index.saturating_sub(overscan);
        range.end_index = cmp::min(self.options.count, range.end_index.saturating_add(overscan));
        range
    }

    pub fn visible_range(&self) -> VirtualRange {
        self.visible_range_for(self.scroll_offset, self.viewport_size)
    }

    pub fn visible_range_for(&self, scroll_offset: u64, viewport_size: u32) -> VirtualRange {
        let count = self.options.count;
        if count == 0 || viewport_size == 0 {
            return VirtualRange::default();
        }

        let total = self.total_size();
        let view = viewport_size as u64;
        let offset = scroll_offset.min(total.saturating_sub(view));
        if offset >= total {
            return VirtualRange {
                start_index: count,
                end_index: count,
            };
        }
        let visible_end_inclusive = offset.saturating_add(view).saturating_sub(1);

        let start = self.index_at_offset(offset).unwrap_or(count);
        let end = self
            .index_at_offset(cmp::max(visible_end_inclusive, offset))
            .map_or(count, |i| i + 1);

        VirtualRange {
            start_index: start.min(count),
            end_index: end.min(count),
        }
    }

    pub fn viewport_state(&self) -> ViewportState {
        let visible = self.visible_range();
        ViewportState {
            scroll_offset: self.scroll_offset,
            visible_start_index: visible.start_index,
            visible_stop_index: visible.end_index.saturating_sub(1).max(visible.start_index),
            scroll_direction: self.scroll_direction,
        }
    }

    /// Calls `f` for every item in the visible range plus overscan, in order.
    pub fn for_each_virtual_item(&self, mut f: impl FnMut(VirtualItem)) {
        let range = self.virtual_range();
        if range.is_empty() {
            return;
        }
        let mut start = self.start_of(range.start_index);
        for index in range.start_index..range.end_index {
            let size = self.sizes[index];
            f(VirtualItem { index, start, size });
            start = start.saturating_add(size as u64);
        }
    }

    /// Collects virtual items into `out` (clears `out` first).
    ///
    /// This is a convenience wrapper around [`Self::for_each_virtual_item`]; adapters that
    /// render every frame should reuse `out`.
    pub fn collect_virtual_items(&self, out: &mut Vec<VirtualItem>) {
        out.clear();
        self.for_each_virtual_item(|item| out.push(item));
    }

    /// Index of the item covering `offset`. Offsets past the end clamp to the last item.
    pub fn index_at_offset(&self, offset: u64) -> Option<usize> {
        let count = self.options.count;
        if count == 0 {
            return None;
        }
        let ps = self.options.padding_start as u64;
        if offset < ps {
            return Some(0);
        }
        let consumed = self.sums.lower_bound(offset - ps);
        Some(consumed.min(count - 1))
    }

    pub fn item_start(&self, index: usize) -> Option<u64> {
        (index < self.sizes.len()).then(|| self.start_of(index))
    }

    pub fn virtual_item(&self, index: usize) -> Option<VirtualItem> {
        Some(VirtualItem {
            index,
            start: self.item_start(index)?,
            size: self.item_size(index)?,
        })
    }

    /// Jumps to an item (no animation). Returns the applied, clamped offset.
    pub fn scroll_to_item(&mut self, index: usize, align: Align) -> u64 {
        let offset = self.scroll_to_item_offset(index, align);
        vtrace!(index, offset, "scroll_to_item");
        self.set_scroll_offset(offset);
        offset
    }

    pub fn scroll_to_item_offset(&self, index: usize, align: Align) -> u64 {
        if self.options.count == 0 {
            return 0;
        }
        let index = index.min(self.options.count - 1);
        let Some(item) = self.virtual_item(index) else {
            return self.scroll_offset;
        };

        let sp_start = self.options.scroll_padding_start as u64;
        let sp_end = self.options.scroll_padding_end as u64;
        let view = self.viewport_size as u64;

        let target = match align {
            Align::Start => item.start.saturating_sub(sp_start),
            Align::End => item.end().saturating_add(sp_end).saturating_sub(view),
            Align::Center => {
                let center = item.start.saturating_add(item.size as u64 / 2);
                center.saturating_sub(view / 2)
            }
            Align::Auto => {
                let cur = self.scroll_offset;
                let cur_end = cur.saturating_add(view);
                if item.start >= cur && item.end() <= cur_end {
                    cur
                } else if item.start < cur {
                    item.start.saturating_sub(sp_start)
                } else {
                    item.end().saturating_add(sp_end).saturating_sub(view)
                }
            }
        };

        self.clamp_scroll_offset(target)
    }

    fn fill_sizes(&mut self) {
        let count = self.options.count;
        let from = self.sizes.len();
        if from >= count {
            return;
        }
        self.sizes.reserve_exact(count - from);
        self.measured.reserve_exact(count - from);
        // From scratch the tree is built in one linear pass.
        let rebuild = from == 0;
        for i in from..count {
            let size = (self.options.estimate_size)(i);
            self.sizes.push(size);
            self.measured.push(false);
            if !rebuild {
                self.sums.push(size as u64);
            }
        }
        if rebuild {
            self.sums = Fenwick::from_sizes(&self.sizes);
        }
    }

    fn start_of(&self, index: usize) -> u64 {
        self.options.padding_start as u64 + self.sums.prefix_sum(index)
    }
}
