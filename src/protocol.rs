use std::path::Path;

use image::{Rgba, RgbaImage};

use crate::error::{Error, Result};
use crate::surface::PixelBuffer;

/// Printer setup sent ahead of every bitmap, bit-for-bit.
///
/// - `1f 11 02 02`: print density
/// - `1f 11 0a`: paper type
/// - `1f 11 21 01`: repeat count
/// - `1b 40`: init/reset
/// - `1d 76 30 00`: begin raster picture, bitmap follows immediately
pub const PREAMBLE: [u8; 17] = [
    0x1f, 0x11, 0x02, 0x02, // density
    0x1f, 0x11, 0x0a, // paper type
    0x1f, 0x11, 0x21, 0x01, // repeat
    0x1b, 0x40, // init
    0x1d, 0x76, 0x30, 0x00, // picture
];

/// Bitmap header: byte width and height, both u16 little-endian.
pub const HEADER_LEN: usize = 4;

pub const DEFAULT_THRESHOLD: u8 = 128;

/// Grayscale conversion applied after compositing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Luminance {
    /// `0.299 R + 0.587 G + 0.114 B`.
    #[default]
    Perceptual,
    /// Plain `(R + G + B) / 3`. Lower fidelity, kept for older label output.
    Average,
}

/// Precision of alpha compositing against white.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compositing {
    /// Channels rounded to the nearest integer after blending.
    #[default]
    Rounded,
    /// Blended channels kept fractional. Kept for older label output.
    Unrounded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// A pixel is inked iff its gray level is strictly below this.
    pub threshold: u8,
    pub luminance: Luminance,
    pub compositing: Compositing,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            luminance: Luminance::default(),
            compositing: Compositing::default(),
        }
    }
}

impl EncodeOptions {
    pub fn with_threshold(threshold: u8) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }

    /// True if this RGBA pixel prints as ink.
    pub fn is_ink(&self, rgba: [u8; 4]) -> bool {
        let [r, g, b] = composite_over_white(rgba, self.compositing);
        let threshold = self.threshold as f64;
        // Scaled to integers where possible so white lands exactly on 255.
        match self.luminance {
            Luminance::Perceptual => 299.0 * r + 587.0 * g + 114.0 * b < 1000.0 * threshold,
            Luminance::Average => r + g + b < 3.0 * threshold,
        }
    }
}

/// Blends a pixel against opaque white, returning R, G, B.
pub fn composite_over_white(rgba: [u8; 4], mode: Compositing) -> [f64; 3] {
    let alpha = rgba[3] as f64 / 255.0;
    let mut out = [0.0; 3];
    for (c, channel) in out.iter_mut().enumerate() {
        let blended = rgba[c] as f64 * alpha + 255.0 * (1.0 - alpha);
        *channel = match mode {
            Compositing::Rounded => blended.round(),
            Compositing::Unrounded => blended,
        };
    }
    out
}

/// 1-bit-per-pixel image in the printer's wire layout.
///
/// Rows run top to bottom, 8 columns per byte, MSB = leftmost column, and
/// a set bit means ink. Padding bits past the pixel width are zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonochromeBitmap {
    width: u32,
    height: u16,
    byte_width: u16,
    body: Vec<u8>,
}

impl MonochromeBitmap {
    /// Parses header + body as received by the printer.
    ///
    /// The wire format only knows byte width, so the pixel width comes back as
    /// `byte_width * 8`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::MalformedBitmap {
                expected: HEADER_LEN,
                actual: bytes.len(),
            });
        }
        let byte_width = u16::from_le_bytes([bytes[0], bytes[1]]);
        let height = u16::from_le_bytes([bytes[2], bytes[3]]);
        let expected = byte_width as usize * height as usize;
        let body = &bytes[HEADER_LEN..];
        if body.len() != expected {
            return Err(Error::MalformedBitmap {
                expected,
                actual: body.len(),
            });
        }
        Ok(Self {
            width: byte_width as u32 * 8,
            height,
            byte_width,
            body: body.to_vec(),
        })
    }

    /// Pixel width. Parsed bitmaps report `byte_width * 8`.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows.
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Bytes per row, `ceil(width / 8)`.
    pub fn byte_width(&self) -> u16 {
        self.byte_width
    }

    /// Packed rows without the header.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Wire header: byte width then height, both u16 little-endian.
    pub fn header(&self) -> [u8; HEADER_LEN] {
        let w = self.byte_width.to_le_bytes();
        let h = self.height.to_le_bytes();
        [w[0], w[1], h[0], h[1]]
    }

    /// Total wire length, `4 + byte_width * height`.
    pub fn len(&self) -> usize {
        HEADER_LEN + self.body.len()
    }

    /// Always false: even a 0x0 bitmap carries its 4-byte header.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        out.extend_from_slice(&self.header());
        out.extend_from_slice(&self.body);
        out
    }

    /// Whether the pixel at `(x, y)` is inked.
    ///
    /// - x: column, 0 = leftmost
    /// - y: row, 0 = first row sent
    ///
    /// Out-of-range coordinates read as blank.
    pub fn is_ink(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height as u32 {
            return false;
        }
        let byte = self.body[y as usize * self.byte_width as usize + x as usize / 8];
        byte & (0x80u8 >> (x % 8)) != 0
    }
}

/// Encodes a pixel buffer with the default options at `threshold`.
pub fn encode(buffer: &PixelBuffer, threshold: u8) -> Result<MonochromeBitmap> {
    encode_with(buffer, &EncodeOptions::with_threshold(threshold))
}

/// Composites, thresholds and bit-packs a pixel buffer.
pub fn encode_with(buffer: &PixelBuffer, options: &EncodeOptions) -> Result<MonochromeBitmap> {
    pack_rgba(buffer.as_raw(), buffer.width(), buffer.height(), options)
}

/// Like [`encode_with`] over a raw RGBA slice.
///
/// Fails with `InvalidDimensions` if `pixels.len() != width * height * 4` or
/// the size does not fit the u16 header.
pub fn pack_rgba(
    pixels: &[u8],
    width: u32,
    height: u32,
    options: &EncodeOptions,
) -> Result<MonochromeBitmap> {
    let required = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| Error::InvalidDimensions("width*height overflow".into()))?;
    if pixels.len() != required {
        return Err(Error::InvalidDimensions(format!(
            "{}x{} needs {} RGBA bytes, got {}",
            width,
            height,
            required,
            pixels.len()
        )));
    }
    let byte_width = u16::try_from(width.div_ceil(8)).map_err(|_| {
        Error::InvalidDimensions(format!("width {} overflows the bitmap header", width))
    })?;
    let rows = u16::try_from(height).map_err(|_| {
        Error::InvalidDimensions(format!("height {} overflows the bitmap header", height))
    })?;

    let width = width as usize;
    let bytes_per_row = byte_width as usize;
    let mut body = Vec::with_capacity(bytes_per_row * height as usize);
    // max(1): a zero-width buffer is empty and yields no rows
    for row in pixels.chunks_exact((width * 4).max(1)) {
        for group in 0..bytes_per_row {
            let mut b: u8 = 0;
            let base = group * 8;
            let end = usize::min(base + 8, width);
            for (bit, x) in (base..end).enumerate() {
                let i = x * 4;
                let rgba = [row[i], row[i + 1], row[i + 2], row[i + 3]];
                if options.is_ink(rgba) {
                    b |= 0x80u8 >> bit;
                }
            }
            body.push(b);
        }
    }

    Ok(MonochromeBitmap {
        width: width as u32,
        height: rows,
        byte_width,
        body,
    })
}

/// Expands a bitmap back to RGBA for preview: ink is opaque black, anything
/// else opaque white.
///
/// Lossy: gray levels and alpha of the encoded image are gone.
pub fn decode(bitmap: &MonochromeBitmap) -> PixelBuffer {
    let image = RgbaImage::from_fn(bitmap.width(), bitmap.height() as u32, |x, y| {
        if bitmap.is_ink(x, y) {
            Rgba([0, 0, 0, 255])
        } else {
            Rgba([255, 255, 255, 255])
        }
    });
    PixelBuffer::from(image)
}

/// Parses wire bytes and decodes them into a `width`-pixel-wide buffer.
///
/// - bytes: header + body as built by [`MonochromeBitmap::to_bytes`]
/// - width: real pixel width; crops the row padding and must not exceed
///   `byte_width * 8`
///
/// A zero width yields an empty `0 x height` buffer.
pub fn decode_bytes(bytes: &[u8], width: u32) -> Result<PixelBuffer> {
    let bitmap = MonochromeBitmap::from_bytes(bytes)?;
    if width > bitmap.width() {
        return Err(Error::InvalidDimensions(format!(
            "width {} exceeds bitmap row of {} pixels",
            width,
            bitmap.width()
        )));
    }
    let height = bitmap.height() as u32;
    if width == 0 {
        return PixelBuffer::new(0, height, Vec::new());
    }
    let full = decode(&bitmap);
    let mut data = Vec::with_capacity(width as usize * height as usize * 4);
    for row in full.as_raw().chunks_exact(bitmap.width() as usize * 4) {
        data.extend_from_slice(&row[..width as usize * 4]);
    }
    PixelBuffer::new(width, height, data)
}

/// Writes the decoded bitmap as a PNG (or any format `image` infers from the
/// extension).
pub fn save_preview<P: AsRef<Path>>(bitmap: &MonochromeBitmap, path: P) -> Result<()> {
    decode(bitmap).into_image().save(path)?;
    Ok(())
}

/// Preamble plus bitmap: everything sent to the printer for one label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame(Vec<u8>);

impl CommandFrame {
    pub fn build(bitmap: &MonochromeBitmap) -> Self {
        let mut out = Vec::with_capacity(PREAMBLE.len() + bitmap.len());
        out.extend_from_slice(&PREAMBLE);
        out.extend_from_slice(&bitmap.header());
        out.extend_from_slice(bitmap.body());
        CommandFrame(out)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The bitmap part of the frame.
    pub fn payload(&self) -> &[u8] {
        &self.0[PREAMBLE.len()..]
    }
}

impl AsRef<[u8]> for CommandFrame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
