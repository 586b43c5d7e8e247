//! Label printer library: lay out text on a small thermal label and print it
//! over BLE.
//!
//! Main modules:
//! - layout: fit text to the label
//! - surface: rasterize it
//! - protocol: 1bpp bitmap encoding and the printer command frame
//! - transport: chunked, paced writes over an unacknowledged channel
//! - ble: discovery and the BLE channel
//! - printer: the print job pipeline

pub mod ble;
pub mod config;
pub mod error;
pub mod font;
pub mod layout;
pub mod printer;
pub mod protocol;
pub mod surface;
pub mod transport;

/// BLE API: scan/connect to printers
pub use ble::{connect, connect_first, scan, BleChannel, BleConnector, DeviceInfo};
pub use config::{LabelGeometry, PrinterConfig, TextStyle};
pub use error::{Error, Result};
pub use font::{FontCache, FontFamily};
pub use layout::{fit, LayoutResult, TextMeasure};
/// Print pipeline
pub use printer::{Connector, JobReport, JobState, LabelPrinter, PrintJob, RenderedLabel};
/// Bitmap and frame encoding
pub use protocol::{decode, encode, CommandFrame, EncodeOptions, MonochromeBitmap, PREAMBLE};
pub use surface::{BlockSurface, FontSurface, PixelBuffer, RasterSurface};
pub use transport::{send_chunked, Channel, TransportConfig};
