/// When scrolling should pull in more content.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PrefetchPolicy {
    /// Fetch forward once the viewport's bottom edge passes this fraction of the total extent.
    pub forward_fraction: f32,
    /// Fetch backward once the scroll offset is within this many pixels of the top.
    pub backward_threshold: u64,
}

impl Default for PrefetchPolicy {
    fn default() -> Self {
        Self {
            forward_fraction: 0.8,
            backward_threshold: 200,
        }
    }
}

impl PrefetchPolicy {
    pub fn new(forward_fraction: f32, backward_threshold: u64) -> Self {
        Self {
            forward_fraction: forward_fraction.clamp(0.0, 1.0),
            backward_threshold,
        }
    }

    /// Content shorter than the viewport always wants more.
    pub fn wants_forward(&self, scroll_offset: u64, viewport_size: u32, total_size: u64) -> bool {
        let bottom = scroll_offset.saturating_add(viewport_size as u64);
        bottom as f64 >= total_size as f64 * self.forward_fraction as f64
    }

    pub fn wants_backward(&self, scroll_offset: u64) -> bool {
        scroll_offset < self.backward_threshold
    }
}
