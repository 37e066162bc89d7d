/// Column arrangement of the reader.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LayoutMode {
    /// Primary and secondary text stacked in one wide column.
    #[default]
    SingleColumn,
    /// Primary and secondary text side by side in two narrow columns.
    DualColumn,
}

/// Constants of the height heuristic.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EstimatorConfig {
    pub min_height: u32,
    pub line_height_factor: f32,
    /// Vertical padding added to every item.
    pub padding: u32,
    pub chars_per_line_single: u32,
    pub chars_per_line_dual: u32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            min_height: 24,
            line_height_factor: 1.5,
            padding: 16,
            chars_per_line_single: 80,
            chars_per_line_dual: 40,
        }
    }
}

/// Estimates the rendered height of a segment from its text length.
///
/// `lines = ceil((primary + secondary) / chars_per_line)` and
/// `height = max(min_height, lines * font_size * line_height_factor + padding)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SizeEstimator {
    config: EstimatorConfig,
    layout: LayoutMode,
    font_size: u32,
}

impl SizeEstimator {
    pub fn new(config: EstimatorConfig, layout: LayoutMode, font_size: u32) -> Self {
        Self {
            config,
            layout,
            font_size,
        }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    pub fn layout(&self) -> LayoutMode {
        self.layout
    }

    pub fn font_size(&self) -> u32 {
        self.font_size
    }

    pub fn chars_per_line(&self) -> u32 {
        let cpl = match self.layout {
            LayoutMode::SingleColumn => self.config.chars_per_line_single,
            LayoutMode::DualColumn => self.config.chars_per_line_dual,
        };
        cpl.max(1)
    }

    pub fn line_height(&self) -> f32 {
        self.font_size as f32 * self.config.line_height_factor
    }

    /// Height for a segment whose texts are `primary_chars` and `secondary_chars` long.
    pub fn estimate(&self, primary_chars: usize, secondary_chars: usize) -> u32 {
        let chars = primary_chars.saturating_add(secondary_chars) as u64;
        let lines = chars.div_ceil(self.chars_per_line() as u64);
        let body = ceil_to_u32(lines as f32 * self.line_height());
        body.saturating_add(self.config.padding)
            .max(self.config.min_height)
    }

    pub fn estimate_text(&self, primary: &str, secondary: Option<&str>) -> u32 {
        self.estimate(
            primary.chars().count(),
            secondary.map_or(0, |s| s.chars().count()),
        )
    }
}

// `f32::ceil` lives in std; this is enough for non-negative layout values.
fn ceil_to_u32(v: f32) -> u32 {
    if v <= 0.0 {
        return 0;
    }
    if v >= u32::MAX as f32 {
        return u32::MAX;
    }
    let truncated = v as u32;
    if (truncated as f32) < v {
        truncated + 1
    } else {
        truncated
    }
}
