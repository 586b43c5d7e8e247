//! Drawing targets the layout is painted into.
//!
//! Surfaces draw in layout orientation (text running along the label's long
//! edge) and hand back pixels in printer orientation, rotated -90 degrees.
//! Glyph edges are never anti-aliased, so thresholding stays clean.

use std::collections::HashMap;

use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use rusttype::{point, Font, Scale};

use crate::config::{LabelGeometry, TextStyle};
use crate::error::{Error, Result};
use crate::font::FontFamily;
use crate::layout::TextMeasure;

/// Colour of a freshly reset canvas.
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);
/// Colour text is drawn with.
pub const INK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Glyph coverage at or above which a pixel is inked.
const COVERAGE_CUTOFF: f32 = 0.5;

/// Immutable RGBA pixels, row-major, 4 bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wraps raw RGBA bytes. Fails unless `data.len() == width * height * 4`.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| Error::InvalidDimensions(format!("{}x{} overflows", width, height)))?;
        if data.len() != expected {
            return Err(Error::InvalidDimensions(format!(
                "{}x{} RGBA buffer needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Buffer with every pixel set to one colour.
    ///
    /// - width, height: size in pixels
    /// - rgba: the colour, `[r, g, b, a]`
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    /// RGBA of the pixel at `(x, y)`, `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }

    pub fn into_image(self) -> RgbaImage {
        // Length was checked on construction.
        RgbaImage::from_raw(self.width, self.height, self.data)
            .unwrap_or_else(|| RgbaImage::new(0, 0))
    }
}

impl From<RgbaImage> for PixelBuffer {
    fn from(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            data: image.into_raw(),
        }
    }
}

/// A pixel-addressable target text can be drawn into.
pub trait RasterSurface: TextMeasure {
    fn geometry(&self) -> LabelGeometry;

    fn clear(&mut self, color: Rgba<u8>);

    /// Draws one line with its line box's top-left corner at `(x, y)`, in
    /// layout orientation.
    fn draw_text(&mut self, text: &str, x: i32, y: i32, style: &TextStyle, font_size: u32);

    /// Pixels in printer orientation, `geometry().width x geometry().height`.
    fn snapshot(&self) -> PixelBuffer;
}

/// Backing store shared by the surfaces: a layout-oriented RGBA image.
#[derive(Debug, Clone)]
pub struct LabelCanvas {
    geometry: LabelGeometry,
    image: RgbaImage,
}

impl LabelCanvas {
    /// Blank (transparent) canvas sized `geometry.rotated_size()`.
    pub fn new(geometry: LabelGeometry) -> Self {
        let (width, height) = geometry.rotated_size();
        Self {
            geometry,
            image: RgbaImage::from_pixel(width, height, TRANSPARENT),
        }
    }

    pub fn geometry(&self) -> LabelGeometry {
        self.geometry
    }

    /// Paints every pixel with `color`.
    pub fn clear(&mut self, color: Rgba<u8>) {
        for pixel in self.image.pixels_mut() {
            *pixel = color;
        }
    }

    /// Inks one pixel; out-of-bounds writes are clipped.
    ///
    /// - x: column in layout orientation (along the label's long edge)
    /// - y: row in layout orientation
    pub fn put_ink(&mut self, x: i32, y: i32) {
        if x >= 0 && y >= 0 && (x as u32) < self.image.width() && (y as u32) < self.image.height() {
            self.image.put_pixel(x as u32, y as u32, INK);
        }
    }

    /// Inks a rectangle, clipped to the canvas.
    ///
    /// - left, top: corner in layout orientation, may lie off the canvas
    /// - width, height: size in pixels, may exceed the canvas
    pub fn fill_ink(&mut self, left: i64, top: i64, width: u64, height: u64) {
        let (w, h) = self.image.dimensions();
        let x0 = left.max(0);
        let y0 = top.max(0);
        let x1 = left.saturating_add_unsigned(width).min(w as i64);
        let y1 = top.saturating_add_unsigned(height).min(h as i64);
        if x0 >= x1 || y0 >= y1 {
            return;
        }
        draw_filled_rect_mut(
            &mut self.image,
            Rect::at(x0 as i32, y0 as i32).of_size((x1 - x0) as u32, (y1 - y0) as u32),
            INK,
        );
    }

    /// Rotates the layout image back into printer orientation.
    ///
    /// The result is `geometry.width x geometry.height`; layout row 0 becomes
    /// the rightmost printer column.
    pub fn snapshot(&self) -> PixelBuffer {
        PixelBuffer::from(image::imageops::rotate270(&self.image))
    }
}

/// Renders real glyph outlines with rusttype.
///
/// Each family can have its own face; families without one use the fallback.
/// Bold is synthesised by striking each line twice, one pixel apart.
pub struct FontSurface {
    canvas: LabelCanvas,
    fallback: Font<'static>,
    faces: HashMap<FontFamily, Font<'static>>,
}

impl FontSurface {
    /// - geometry: label size and padding
    /// - fallback: face used for every family without its own
    pub fn new(geometry: LabelGeometry, fallback: Font<'static>) -> Self {
        Self {
            canvas: LabelCanvas::new(geometry),
            fallback,
            faces: HashMap::new(),
        }
    }

    pub fn with_face(mut self, family: FontFamily, face: Font<'static>) -> Self {
        self.faces.insert(family, face);
        self
    }

    fn face(&self, family: FontFamily) -> &Font<'static> {
        self.faces.get(&family).unwrap_or(&self.fallback)
    }
}

impl TextMeasure for FontSurface {
    fn text_width(&self, text: &str, style: &TextStyle, font_size: u32) -> f32 {
        let scale = Scale::uniform(font_size as f32);
        let width = self
            .face(style.family)
            .layout(text, scale, point(0.0, 0.0))
            .last()
            .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
            .unwrap_or(0.0);
        if style.bold && width > 0.0 {
            width + 1.0
        } else {
            width
        }
    }
}

impl RasterSurface for FontSurface {
    fn geometry(&self) -> LabelGeometry {
        self.canvas.geometry()
    }

    fn clear(&mut self, color: Rgba<u8>) {
        self.canvas.clear(color);
    }

    fn draw_text(&mut self, text: &str, x: i32, y: i32, style: &TextStyle, font_size: u32) {
        let scale = Scale::uniform(font_size as f32);
        let face = self.faces.get(&style.family).unwrap_or(&self.fallback);
        let v_metrics = face.v_metrics(scale);
        let glyph_height = v_metrics.ascent - v_metrics.descent;
        let leading = (style.line_height(font_size) as f32 - glyph_height) / 2.0;
        let baseline = y as f32 + leading + v_metrics.ascent;

        let strikes: &[f32] = if style.bold { &[0.0, 1.0] } else { &[0.0] };
        for &dx in strikes {
            for glyph in face.layout(text, scale, point(x as f32 + dx, baseline)) {
                if let Some(bb) = glyph.pixel_bounding_box() {
                    let canvas = &mut self.canvas;
                    glyph.draw(|gx, gy, v| {
                        if v >= COVERAGE_CUTOFF {
                            canvas.put_ink(bb.min.x + gx as i32, bb.min.y + gy as i32);
                        }
                    });
                }
            }
        }
    }

    fn snapshot(&self) -> PixelBuffer {
        self.canvas.snapshot()
    }
}

/// Headless surface drawing every non-blank character as a solid box.
///
/// Metrics are fixed fractions of the font size, so layouts and bitmaps are
/// reproducible without any font file.
#[derive(Debug, Clone)]
pub struct BlockSurface {
    canvas: LabelCanvas,
}

impl BlockSurface {
    pub fn new(geometry: LabelGeometry) -> Self {
        Self {
            canvas: LabelCanvas::new(geometry),
        }
    }

    /// Horizontal advance of one character, `ceil(0.6 * size)` plus one
    /// pixel when bold.
    pub fn advance(font_size: u32, bold: bool) -> u32 {
        (font_size as u64 * 3).div_ceil(5) as u32 + bold as u32
    }

    /// Height of a character box, `ceil(0.7 * size)`.
    pub fn glyph_height(font_size: u32) -> u32 {
        (font_size as u64 * 7).div_ceil(10).max(1) as u32
    }
}

impl TextMeasure for BlockSurface {
    fn text_width(&self, text: &str, style: &TextStyle, font_size: u32) -> f32 {
        text.chars().count() as f32 * Self::advance(font_size, style.bold) as f32
    }
}

impl RasterSurface for BlockSurface {
    fn geometry(&self) -> LabelGeometry {
        self.canvas.geometry()
    }

    fn clear(&mut self, color: Rgba<u8>) {
        self.canvas.clear(color);
    }

    fn draw_text(&mut self, text: &str, x: i32, y: i32, style: &TextStyle, font_size: u32) {
        let advance = Self::advance(font_size, style.bold);
        let box_width = advance.saturating_sub(1).max(1) as u64;
        let box_height = Self::glyph_height(font_size);
        let top = y as i64 + (style.line_height(font_size) as i64 - box_height as i64) / 2;

        for (i, ch) in text.chars().enumerate() {
            if ch.is_whitespace() {
                continue;
            }
            let left = x as i64 + i as i64 * advance as i64;
            self.canvas.fill_ink(left, top, box_width, box_height as u64);
        }
    }

    fn snapshot(&self) -> PixelBuffer {
        self.canvas.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::face_from_bytes;

    const DEJAVU_SANS: &[u8] = include_bytes!("../tests/fixtures/DejaVuSans.ttf");

    fn font_surface() -> FontSurface {
        let face = face_from_bytes(DEJAVU_SANS.to_vec()).unwrap();
        FontSurface::new(LabelGeometry::D30, face)
    }

    /// Layout-oriented coordinates of every inked pixel.
    fn ink_pixels(surface: &FontSurface) -> Vec<(u32, u32)> {
        surface
            .canvas
            .image
            .enumerate_pixels()
            .filter(|(_, _, p)| **p == INK)
            .map(|(x, y, _)| (x, y))
            .collect()
    }

    #[test]
    fn pixel_buffer_checks_length() {
        assert!(PixelBuffer::new(2, 2, vec![0; 16]).is_ok());
        assert!(matches!(
            PixelBuffer::new(2, 2, vec![0; 15]),
            Err(Error::InvalidDimensions(_))
        ));
    }

    #[test]
    fn filled_buffer_repeats_colour() {
        let buffer = PixelBuffer::filled(3, 2, [1, 2, 3, 4]);
        assert_eq!(buffer.as_raw().len(), 24);
        assert_eq!(buffer.pixel(2, 1), Some([1, 2, 3, 4]));
        assert_eq!(buffer.pixel(3, 0), None);
    }

    #[test]
    fn snapshot_is_in_printer_orientation() {
        let surface = BlockSurface::new(LabelGeometry::D30);
        let pixels = surface.snapshot();
        assert_eq!((pixels.width(), pixels.height()), (96, 320));
        assert!(pixels.as_raw().chunks(4).all(|p| p == [0, 0, 0, 0]));
    }

    #[test]
    fn drawing_is_rotated_into_place() {
        let mut surface = BlockSurface::new(LabelGeometry::D30);
        let style = TextStyle::default();
        // size 10: advance 6, box 5x7, line height 12, box top at y + 2
        surface.draw_text("A", 0, 0, &style, 10);
        let pixels = surface.snapshot();

        // layout (x, y) lands at printer (y, 319 - x)
        assert_eq!(pixels.pixel(2, 319), Some([0, 0, 0, 255]));
        assert_eq!(pixels.pixel(8, 315), Some([0, 0, 0, 255]));
        assert_eq!(pixels.pixel(1, 319), Some([0, 0, 0, 0]));
        assert_eq!(pixels.pixel(9, 319), Some([0, 0, 0, 0]));
        assert_eq!(pixels.pixel(2, 314), Some([0, 0, 0, 0]));
    }

    #[test]
    fn blanks_are_measured_but_not_drawn() {
        let mut surface = BlockSurface::new(LabelGeometry::D30);
        let style = TextStyle::default();
        assert_eq!(surface.text_width("a b", &style, 10), 18.0);
        surface.draw_text("   ", 0, 0, &style, 10);
        assert!(surface.snapshot().as_raw().chunks(4).all(|p| p[3] == 0));
    }

    #[test]
    fn bold_widens_advance() {
        let surface = BlockSurface::new(LabelGeometry::D30);
        let bold = TextStyle::default().with_bold(true);
        assert_eq!(surface.text_width("ab", &bold, 10), 14.0);
    }

    #[test]
    fn clear_paints_every_pixel() {
        let mut surface = BlockSurface::new(LabelGeometry::new(8, 16, 1));
        surface.clear(Rgba([255, 255, 255, 255]));
        assert!(surface.snapshot().as_raw().iter().all(|&b| b == 255));
    }

    #[test]
    fn drawing_outside_the_canvas_is_clipped() {
        let mut surface = BlockSurface::new(LabelGeometry::new(8, 16, 1));
        let style = TextStyle::default();
        surface.draw_text("XXXXXXXX", -4, -4, &style, 10);
        let pixels = surface.snapshot();
        assert_eq!((pixels.width(), pixels.height()), (8, 16));
    }

    #[test]
    fn block_metrics_survive_huge_sizes() {
        assert_eq!(BlockSurface::advance(u32::MAX, true), 2_576_980_378);
        assert_eq!(BlockSurface::glyph_height(u32::MAX), 3_006_477_107);

        let mut surface = BlockSurface::new(LabelGeometry::D30);
        let style = TextStyle::default();
        // line box 2.4e9, box 1.4e9: the box top lands on row 0
        surface.draw_text("a", 4, -500_000_000, &style, 2_000_000_000);
        let image = &surface.canvas.image;
        assert_eq!(*image.get_pixel(4, 0), INK);
        assert_eq!(*image.get_pixel(319, 95), INK);
        assert_eq!(*image.get_pixel(3, 0), TRANSPARENT);
    }

    #[test]
    fn glyph_width_grows_with_size() {
        let surface = font_surface();
        let style = TextStyle::default();
        let widths: Vec<f32> = [10, 20, 40]
            .iter()
            .map(|&size| surface.text_width("Label", &style, size))
            .collect();
        assert!(widths[0] > 0.0);
        assert!(widths[0] < widths[1] && widths[1] < widths[2], "{widths:?}");
        assert_eq!(surface.text_width("", &style, 20), 0.0);
    }

    #[test]
    fn bold_measures_one_pixel_wider() {
        let surface = font_surface();
        let regular = TextStyle::default();
        let bold = TextStyle::default().with_bold(true);
        let width = surface.text_width("Label", &regular, 20);
        assert_eq!(surface.text_width("Label", &bold, 20), width + 1.0);
        assert_eq!(surface.text_width("", &bold, 20), 0.0);
    }

    #[test]
    fn glyphs_are_drawn_without_anti_aliasing() {
        let mut surface = font_surface();
        surface.draw_text("Hello, label", 4, 4, &TextStyle::default(), 30);
        assert!(!ink_pixels(&surface).is_empty());
        assert!(
            surface
                .canvas
                .image
                .pixels()
                .all(|p| *p == TRANSPARENT || *p == INK)
        );
        let snapshot = surface.snapshot();
        assert!(
            snapshot
                .as_raw()
                .chunks(4)
                .all(|p| p == TRANSPARENT.0 || p == INK.0)
        );
    }

    #[test]
    fn bold_inks_a_superset_of_regular() {
        let mut regular = font_surface();
        regular.draw_text("Bold?", 4, 4, &TextStyle::default(), 28);
        let mut bold = font_surface();
        bold.draw_text("Bold?", 4, 4, &TextStyle::default().with_bold(true), 28);

        let regular_ink = ink_pixels(&regular);
        let bold_ink = ink_pixels(&bold);
        assert!(bold_ink.len() > regular_ink.len());
        for (x, y) in regular_ink {
            assert_eq!(*bold.canvas.image.get_pixel(x, y), INK, "pixel {x},{y}");
        }
    }

    #[test]
    fn glyph_ink_stays_inside_the_line_box() {
        let mut surface = font_surface();
        let style = TextStyle::default();
        let (x, y, size) = (20, 10, 20);
        let line_height = style.line_height(size);
        let width = surface.text_width("Hgjy", &style, size);
        surface.draw_text("Hgjy", x, y, &style, size);

        let ink = ink_pixels(&surface);
        assert!(!ink.is_empty());
        for (px, py) in ink {
            assert!(
                py >= y as u32 && py < y as u32 + line_height,
                "row {py} outside {y}..{}",
                y as u32 + line_height
            );
            assert!(px >= x as u32 && (px as f32) < x as f32 + width + 1.0, "column {px}");
        }
    }
}
