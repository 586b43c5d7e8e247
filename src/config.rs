//! Printer model geometry, text style and job configuration.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::font::FontFamily;
use crate::protocol::EncodeOptions;
use crate::transport::TransportConfig;

/// Physical canvas of a printer model, in printer (portrait) orientation.
///
/// The reference model prints a 12mm x 40mm label as a 96x320 canvas. Text
/// is laid out rotated by 90 degrees, so its horizontal axis runs along
/// `height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelGeometry {
    pub width: u32,
    pub height: u32,
    pub padding: u32,
}

impl LabelGeometry {
    /// 12mm x 40mm label.
    pub const D30: LabelGeometry = LabelGeometry {
        width: 96,
        height: 320,
        padding: 4,
    };

    pub const fn new(width: u32, height: u32, padding: u32) -> Self {
        Self {
            width,
            height,
            padding,
        }
    }

    /// Size of the text canvas once rotated for layout: `(width, height)`.
    pub fn rotated_size(&self) -> (u32, u32) {
        (self.height, self.width)
    }

    /// Drawable area inside the padding, in layout orientation.
    pub fn available_area(&self) -> (u32, u32) {
        let (w, h) = self.rotated_size();
        (
            w.saturating_sub(2 * self.padding),
            h.saturating_sub(2 * self.padding),
        )
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidConfig(format!(
                "label geometry must be non-empty, got {}x{}",
                self.width, self.height
            )));
        }
        if self.width.div_ceil(8) > u16::MAX as u32 || self.height > u16::MAX as u32 {
            return Err(Error::InvalidConfig(format!(
                "label geometry {}x{} does not fit the bitmap header",
                self.width, self.height
            )));
        }
        let (w, h) = self.available_area();
        if w == 0 || h == 0 {
            return Err(Error::InvalidConfig(format!(
                "padding {} leaves no drawable area",
                self.padding
            )));
        }
        Ok(())
    }
}

impl Default for LabelGeometry {
    fn default() -> Self {
        Self::D30
    }
}

/// Largest `max_font` a style may ask for.
pub const MAX_FONT_SIZE: u32 = 1024;

/// How label text looks and how large it may grow.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub family: FontFamily,
    pub bold: bool,
    pub min_font: u32,
    pub max_font: u32,
    pub line_height_ratio: f64,
    /// Extra pixels between stacked lines.
    pub line_spacing: u32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            family: FontFamily::SansSerif,
            bold: false,
            min_font: 8,
            max_font: 72,
            line_height_ratio: 1.2,
            line_spacing: 0,
        }
    }
}

impl TextStyle {
    pub fn with_family(mut self, family: FontFamily) -> Self {
        self.family = family;
        self
    }

    pub fn with_bold(mut self, bold: bool) -> Self {
        self.bold = bold;
        self
    }

    pub fn with_font_range(mut self, min_font: u32, max_font: u32) -> Self {
        self.min_font = min_font;
        self.max_font = max_font;
        self
    }

    pub fn with_line_height_ratio(mut self, ratio: f64) -> Self {
        self.line_height_ratio = ratio;
        self
    }

    pub fn with_line_spacing(mut self, spacing: u32) -> Self {
        self.line_spacing = spacing;
        self
    }

    /// Height of one line box at `font_size`, saturating at `u32::MAX`.
    pub fn line_height(&self, font_size: u32) -> u32 {
        (font_size as f64 * self.line_height_ratio).ceil() as u32
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_font == 0 {
            return Err(Error::InvalidConfig("min_font must be > 0".into()));
        }
        if self.max_font > MAX_FONT_SIZE {
            return Err(Error::InvalidConfig(format!(
                "max_font {} exceeds {}",
                self.max_font, MAX_FONT_SIZE
            )));
        }
        if self.min_font > self.max_font {
            return Err(Error::InvalidConfig(format!(
                "min_font {} exceeds max_font {}",
                self.min_font, self.max_font
            )));
        }
        if !self.line_height_ratio.is_finite() || self.line_height_ratio <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "line_height_ratio must be positive, got {}",
                self.line_height_ratio
            )));
        }
        Ok(())
    }
}

/// Everything a print job needs besides the text and the channel.
#[derive(Debug, Clone, Default)]
pub struct PrinterConfig {
    pub geometry: LabelGeometry,
    pub style: TextStyle,
    pub encode: EncodeOptions,
    pub transport: TransportConfig,
    /// Upper bound on the transmitting state. The link itself never times out.
    pub transmit_timeout: Option<Duration>,
}

impl PrinterConfig {
    pub fn with_geometry(mut self, geometry: LabelGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_style(mut self, style: TextStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.encode.threshold = threshold;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.transport.chunk_size = chunk_size;
        self
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.transport.chunk_delay = delay;
        self
    }

    pub fn with_transmit_timeout(mut self, timeout: Duration) -> Self {
        self.transmit_timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.geometry.validate()?;
        self.style.validate()?;
        self.transport.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_printer() {
        let config = PrinterConfig::default();
        assert_eq!(config.geometry, LabelGeometry::new(96, 320, 4));
        assert_eq!(config.encode.threshold, 128);
        assert_eq!(config.transport.chunk_size, 100);
        assert_eq!(config.transport.chunk_delay, Duration::from_millis(10));
        assert!(config.transmit_timeout.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn layout_axes_are_swapped() {
        let geometry = LabelGeometry::D30;
        assert_eq!(geometry.rotated_size(), (320, 96));
        assert_eq!(geometry.available_area(), (312, 88));
    }

    #[test]
    fn rejects_inverted_font_range() {
        let style = TextStyle::default().with_font_range(20, 10);
        assert!(matches!(style.validate(), Err(Error::InvalidConfig(_))));
        let style = TextStyle::default().with_font_range(0, 10);
        assert!(matches!(style.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn rejects_oversized_max_font() {
        let style = TextStyle::default().with_font_range(8, 2_000_000_000);
        assert!(matches!(style.validate(), Err(Error::InvalidConfig(_))));
        let style = TextStyle::default().with_font_range(8, MAX_FONT_SIZE);
        style.validate().unwrap();
        let config = PrinterConfig::default()
            .with_style(TextStyle::default().with_font_range(8, MAX_FONT_SIZE + 1));
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_padding_that_eats_the_canvas() {
        let geometry = LabelGeometry::new(8, 320, 4);
        assert!(matches!(geometry.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let config = PrinterConfig::default().with_chunk_size(0);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn line_height_rounds_up() {
        let style = TextStyle::default();
        assert_eq!(style.line_height(10), 12);
        assert_eq!(style.line_height(11), 14);
    }
}
