use folio::LayoutMode;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Theme {
    #[default]
    Light,
    Sepia,
    Dark,
}

/// Reader-wide presentation settings.
///
/// Passed explicitly to [`crate::Reader::apply_settings`]; any change throws away the whole
/// size cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ReaderSettings {
    pub theme: Theme,
    pub layout_mode: LayoutMode,
    /// Base font size in pixels.
    pub font_size: u32,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            layout_mode: LayoutMode::default(),
            font_size: 20,
        }
    }
}

impl ReaderSettings {
    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    pub fn with_layout_mode(mut self, layout_mode: LayoutMode) -> Self {
        self.layout_mode = layout_mode;
        self
    }

    pub fn with_font_size(mut self, font_size: u32) -> Self {
        self.font_size = font_size.max(1);
        self
    }
}
