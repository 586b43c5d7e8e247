use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use once_cell::sync::Lazy;
use rusttype::Font;

use crate::error::{Error, Result};

/// Font families recognized for label text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontFamily {
    SansSerif,
    Monospace,
    CourierNew,
    Consolas,
    Arial,
    Helvetica,
    Verdana,
    Tahoma,
    SystemUi,
    Impact,
    ArialBlack,
    OcrA,
    ShareTechMono,
    AzeretMono,
    Vt323,
    Silkscreen,
    JetBrainsMono,
    RobotoMono,
    SpaceMono,
}

/// Where a family's glyphs come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontSource {
    /// Installed with the system, usable immediately.
    System,
    /// Has to be fetched before use.
    Remote { url: &'static str },
}

/// Picker grouping for the font selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FontGroup {
    System,
    Ocr,
    Pixel,
    ModernMonospace,
}

impl FontGroup {
    pub fn label(&self) -> &'static str {
        match self {
            FontGroup::System => "System Fonts",
            FontGroup::Ocr => "OCR Fonts (Best for Thermal)",
            FontGroup::Pixel => "Pixel/Bitmap Fonts",
            FontGroup::ModernMonospace => "Modern Monospace",
        }
    }
}

impl FontFamily {
    pub const ALL: [FontFamily; 19] = [
        FontFamily::SansSerif,
        FontFamily::Monospace,
        FontFamily::CourierNew,
        FontFamily::Consolas,
        FontFamily::Arial,
        FontFamily::Helvetica,
        FontFamily::Verdana,
        FontFamily::Tahoma,
        FontFamily::SystemUi,
        FontFamily::Impact,
        FontFamily::ArialBlack,
        FontFamily::OcrA,
        FontFamily::ShareTechMono,
        FontFamily::AzeretMono,
        FontFamily::Vt323,
        FontFamily::Silkscreen,
        FontFamily::JetBrainsMono,
        FontFamily::RobotoMono,
        FontFamily::SpaceMono,
    ];

    /// Stable identifier, also accepted by `FromStr`.
    pub fn id(&self) -> &'static str {
        match self {
            FontFamily::SansSerif => "sans-serif",
            FontFamily::Monospace => "monospace",
            FontFamily::CourierNew => "courier-new",
            FontFamily::Consolas => "consolas",
            FontFamily::Arial => "arial",
            FontFamily::Helvetica => "helvetica",
            FontFamily::Verdana => "verdana",
            FontFamily::Tahoma => "tahoma",
            FontFamily::SystemUi => "system-ui",
            FontFamily::Impact => "impact",
            FontFamily::ArialBlack => "arial-black",
            FontFamily::OcrA => "ocr-a",
            FontFamily::ShareTechMono => "share-tech-mono",
            FontFamily::AzeretMono => "azeret-mono",
            FontFamily::Vt323 => "vt323",
            FontFamily::Silkscreen => "silkscreen",
            FontFamily::JetBrainsMono => "jetbrains-mono",
            FontFamily::RobotoMono => "roboto-mono",
            FontFamily::SpaceMono => "space-mono",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            FontFamily::SansSerif => "Sans Serif",
            FontFamily::Monospace => "Monospace",
            FontFamily::CourierNew => "Courier New",
            FontFamily::Consolas => "Consolas",
            FontFamily::Arial => "Arial",
            FontFamily::Helvetica => "Helvetica",
            FontFamily::Verdana => "Verdana",
            FontFamily::Tahoma => "Tahoma",
            FontFamily::SystemUi => "System UI",
            FontFamily::Impact => "Impact",
            FontFamily::ArialBlack => "Arial Black",
            FontFamily::OcrA => "OCR-A (Best for thermal)",
            FontFamily::ShareTechMono => "Share Tech Mono",
            FontFamily::AzeretMono => "Azeret Mono",
            FontFamily::Vt323 => "VT323 (Terminal)",
            FontFamily::Silkscreen => "Silkscreen (Pixel)",
            FontFamily::JetBrainsMono => "JetBrains Mono",
            FontFamily::RobotoMono => "Roboto Mono",
            FontFamily::SpaceMono => "Space Mono",
        }
    }

    pub fn source(&self) -> FontSource {
        let url = match self {
            FontFamily::OcrA => "https://fonts.cdnfonts.com/css/ocr-a-bt",
            FontFamily::ShareTechMono => {
                "https://fonts.googleapis.com/css2?family=Share+Tech+Mono&display=swap"
            }
            FontFamily::AzeretMono => {
                "https://fonts.googleapis.com/css2?family=Azeret+Mono:wght@400;500;600;700;800;900&display=swap"
            }
            FontFamily::Vt323 => "https://fonts.googleapis.com/css2?family=VT323&display=swap",
            FontFamily::Silkscreen => {
                "https://fonts.googleapis.com/css2?family=Silkscreen:wght@400;700&display=swap"
            }
            FontFamily::JetBrainsMono => {
                "https://fonts.googleapis.com/css2?family=JetBrains+Mono:wght@400;700;800&display=swap"
            }
            FontFamily::RobotoMono => {
                "https://fonts.googleapis.com/css2?family=Roboto+Mono:wght@400;700&display=swap"
            }
            FontFamily::SpaceMono => {
                "https://fonts.googleapis.com/css2?family=Space+Mono:wght@400;700&display=swap"
            }
            _ => return FontSource::System,
        };
        FontSource::Remote { url }
    }

    pub fn is_system(&self) -> bool {
        self.source() == FontSource::System
    }

    pub fn group(&self) -> FontGroup {
        match self {
            f if f.is_system() => FontGroup::System,
            FontFamily::OcrA | FontFamily::ShareTechMono | FontFamily::AzeretMono => {
                FontGroup::Ocr
            }
            FontFamily::Vt323 | FontFamily::Silkscreen => FontGroup::Pixel,
            _ => FontGroup::ModernMonospace,
        }
    }
}

static BY_ID: Lazy<HashMap<&'static str, FontFamily>> =
    Lazy::new(|| FontFamily::ALL.iter().map(|f| (f.id(), *f)).collect());

impl FromStr for FontFamily {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        BY_ID
            .get(s.trim().to_ascii_lowercase().as_str())
            .copied()
            .ok_or_else(|| Error::InvalidConfig(format!("unknown font family {:?}", s)))
    }
}

impl fmt::Display for FontFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Families grouped for a picker, in catalog order, empty groups dropped.
pub fn font_groups() -> Vec<(FontGroup, Vec<FontFamily>)> {
    let mut groups: Vec<(FontGroup, Vec<FontFamily>)> = [
        FontGroup::System,
        FontGroup::Ocr,
        FontGroup::Pixel,
        FontGroup::ModernMonospace,
    ]
    .into_iter()
    .map(|g| (g, Vec::new()))
    .collect();
    for family in FontFamily::ALL {
        if let Some((_, members)) = groups.iter_mut().find(|(g, _)| *g == family.group()) {
            members.push(family);
        }
    }
    groups.retain(|(_, members)| !members.is_empty());
    groups
}

/// Remembers which remote font families have already been loaded.
///
/// Belongs to the display layer. Loading affects how text looks, never the
/// bitmap or transport contracts.
#[derive(Debug, Default)]
pub struct FontCache {
    loaded: HashSet<FontFamily>,
}

impl FontCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// System families count as loaded.
    pub fn already_loaded(&self, family: FontFamily) -> bool {
        family.is_system() || self.loaded.contains(&family)
    }

    pub fn mark_loaded(&mut self, family: FontFamily) {
        self.loaded.insert(family);
    }

    /// Runs `loader` for a remote family the first time it is requested.
    ///
    /// Returns `Ok(true)` if the loader ran. A failed load is not recorded, so
    /// the next call tries again.
    pub fn load_once<F>(&mut self, family: FontFamily, loader: F) -> Result<bool>
    where
        F: FnOnce(FontFamily, &'static str) -> Result<()>,
    {
        let url = match family.source() {
            FontSource::System => return Ok(false),
            FontSource::Remote { url } => url,
        };
        if self.loaded.contains(&family) {
            return Ok(false);
        }
        loader(family, url)?;
        log::debug!("loaded font family {}", family);
        self.loaded.insert(family);
        Ok(true)
    }
}

/// Parses a TrueType/OpenType face from raw bytes.
pub fn face_from_bytes(data: Vec<u8>) -> Result<Font<'static>> {
    Font::try_from_vec(data).ok_or_else(|| Error::Font("unable to parse font data".into()))
}

/// Reads and parses a font file.
pub fn face_from_file<P: AsRef<Path>>(path: P) -> Result<Font<'static>> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    face_from_bytes(data).map_err(|_| Error::Font(format!("{} is not a usable font", path.display())))
}
