//! Auto-fitting label text into the rotated canvas.

use crate::config::{LabelGeometry, TextStyle};

/// Width oracle supplied by whatever will eventually draw the text.
pub trait TextMeasure {
    /// Horizontal extent of `text` in pixels at `font_size`.
    fn text_width(&self, text: &str, style: &TextStyle, font_size: u32) -> f32;
}

/// One positioned line, coordinates in layout orientation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaidOutLine {
    pub text: String,
    pub x: i32,
    /// Top of the line box.
    pub y: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutResult {
    pub font_size: u32,
    pub line_height: u32,
    pub lines: Vec<LaidOutLine>,
}

/// Splits on line breaks. Empty input still yields one (empty) line.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect()
}

/// Total height of `count` stacked lines at `font_size`, saturating at
/// `u32::MAX`.
pub fn block_height(style: &TextStyle, font_size: u32, count: usize) -> u32 {
    let count = count as u64;
    let height = count * style.line_height(font_size) as u64
        + count.saturating_sub(1) * style.line_spacing as u64;
    u32::try_from(height).unwrap_or(u32::MAX)
}

/// Largest size in `[min_font, max_font]` at which every line fits the
/// available area. Returns `min_font` when nothing fits.
///
/// - lines: the label text, already split
/// - available: drawable (width, height) in layout orientation
/// - style: font range, line height ratio and spacing
/// - measure: width oracle of the surface that will draw the lines
///
/// Scans down one pixel at a time, starting from the largest size whose
/// single line box is no taller than the available height.
pub fn fit_font_size<M: TextMeasure + ?Sized>(
    lines: &[&str],
    available: (u32, u32),
    style: &TextStyle,
    measure: &M,
) -> u32 {
    let (available_width, available_height) = available;
    let fits = |size: u32| {
        block_height(style, size, lines.len()) <= available_height
            && lines
                .iter()
                .all(|line| measure.text_width(line, style, size) <= available_width as f32)
    };

    // ceil(size * ratio) > available_height for every size above this
    let tallest = (available_height as f64 / style.line_height_ratio) as u32;
    let mut size = style
        .max_font
        .min(tallest.saturating_add(1))
        .max(style.min_font);
    while size > style.min_font {
        if fits(size) {
            break;
        }
        size -= 1;
    }
    size
}

/// Picks the font size and positions every line of `text`.
///
/// - text: label text, `\n` separates lines
/// - geometry: label size; layout runs along its long edge
/// - style: font range and line metrics
/// - measure: width oracle, usually the surface that will draw the result
///
/// Lines are left-aligned on the padding edge and the block is centred
/// vertically. When even `min_font` overflows, the block starts above the
/// padding and is clipped by the surface.
pub fn fit<M: TextMeasure + ?Sized>(
    text: &str,
    geometry: &LabelGeometry,
    style: &TextStyle,
    measure: &M,
) -> LayoutResult {
    let lines = split_lines(text);
    let available = geometry.available_area();
    let font_size = fit_font_size(&lines, available, style, measure);
    let line_height = style.line_height(font_size);

    let block = block_height(style, font_size, lines.len()) as i64;
    let padding = geometry.padding as i64;
    let top = padding + (available.1 as i64 - block).div_euclid(2);
    let pitch = line_height as i64 + style.line_spacing as i64;

    let lines = lines
        .into_iter()
        .enumerate()
        .map(|(i, line)| LaidOutLine {
            text: line.to_string(),
            x: padding as i32,
            y: clamp_i32(top + i as i64 * pitch),
        })
        .collect();

    LayoutResult {
        font_size,
        line_height,
        lines,
    }
}

fn clamp_i32(v: i64) -> i32 {
    v.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every character advances half the font size.
    struct HalfEm;

    impl TextMeasure for HalfEm {
        fn text_width(&self, text: &str, _style: &TextStyle, font_size: u32) -> f32 {
            text.chars().count() as f32 * font_size as f32 / 2.0
        }
    }

    #[test]
    fn empty_text_is_one_empty_line() {
        let layout = fit("", &LabelGeometry::D30, &TextStyle::default(), &HalfEm);
        assert_eq!(layout.lines.len(), 1);
        assert_eq!(layout.lines[0].text, "");
        assert_eq!(layout.lines[0].x, 4);
    }

    #[test]
    fn splits_on_line_breaks() {
        assert_eq!(split_lines("a\nb\r\nc"), vec!["a", "b", "c"]);
        assert_eq!(split_lines("a\n"), vec!["a", ""]);
    }

    #[test]
    fn height_limits_a_single_short_line() {
        // 88px available height: largest size with ceil(size * 1.2) <= 88 is 73,
        // capped by max_font 72 -> line height 87.
        let layout = fit("hi", &LabelGeometry::D30, &TextStyle::default(), &HalfEm);
        assert_eq!(layout.font_size, 72);
        assert_eq!(layout.line_height, 87);
        // (88 - 87) / 2 = 0 -> top at padding
        assert_eq!(layout.lines[0].y, 4);
    }

    #[test]
    fn width_limits_a_long_line() {
        // 20 chars * size / 2 <= 312 -> size <= 31
        let text = "abcdefghijklmnopqrst";
        let layout = fit(text, &LabelGeometry::D30, &TextStyle::default(), &HalfEm);
        assert_eq!(layout.font_size, 31);
    }

    #[test]
    fn lines_are_stacked_and_centred() {
        let style = TextStyle::default().with_line_spacing(2);
        let layout = fit("one\ntwo", &LabelGeometry::D30, &style, &HalfEm);
        // 2 * ceil(1.2s) + 2 <= 88 -> s = 35, line height 42, block 86
        assert_eq!(layout.font_size, 35);
        assert_eq!(layout.line_height, 42);
        assert_eq!(layout.lines[0].y, 4 + 1);
        assert_eq!(layout.lines[1].y, 4 + 1 + 44);
    }

    #[test]
    fn never_goes_below_min_font() {
        let text = "x".repeat(500);
        let style = TextStyle::default().with_font_range(8, 72);
        let layout = fit(&text, &LabelGeometry::D30, &style, &HalfEm);
        assert_eq!(layout.font_size, 8);
    }

    #[test]
    fn block_height_saturates_instead_of_overflowing() {
        let style = TextStyle::default().with_line_spacing(u32::MAX);
        assert_eq!(block_height(&style, 2_000_000_000, 2), u32::MAX);
        assert_eq!(block_height(&TextStyle::default(), 10, 3), 36);
    }

    #[test]
    fn huge_max_font_settles_on_the_height_bound() {
        // unvalidated style: the scan starts at ceil(88 / 1.2) = 74, not 2e9
        let style = TextStyle::default().with_font_range(8, 2_000_000_000);
        let layout = fit("a\nb", &LabelGeometry::D30, &style, &HalfEm);
        assert_eq!(layout.font_size, 36);
        assert_eq!(layout.line_height, 44);
        assert_eq!(layout.lines[0].y, 4);
    }

    #[test]
    fn small_line_height_ratio_allows_sizes_above_the_height() {
        // ratio 0.5: size 176 -> line box 88, size 177 -> 89
        let style = TextStyle::default()
            .with_font_range(8, 200)
            .with_line_height_ratio(0.5);
        let layout = fit("", &LabelGeometry::D30, &style, &HalfEm);
        assert_eq!(layout.font_size, 176);
    }

    #[test]
    fn raising_max_font_never_shrinks_the_result() {
        let geometry = LabelGeometry::D30;
        for text in ["", "hello", "hello\nworld", "a much longer label line"] {
            let mut previous = 0;
            for max_font in 8..=96 {
                let style = TextStyle::default().with_font_range(8, max_font);
                let size = fit(text, &geometry, &style, &HalfEm).font_size;
                assert!(size >= previous, "{text:?}: max {max_font} gave {size} < {previous}");
                assert!(size >= 8);
                previous = size;
            }
        }
    }
}
