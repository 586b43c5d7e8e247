//! Error types for label printing.
//!
//! Layout and encoding errors are precondition violations and should not
//! happen with a correctly wired pipeline. Transport errors are the only
//! failure expected at runtime.

use std::time::Duration;

use thiserror::Error;

/// Main error type for label printer operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Pixel buffer or geometry does not match its declared size.
    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// Bitmap body length disagrees with its header.
    ///
    /// Only produced when decoding a bitmap for preview or verification.
    #[error("Malformed bitmap: header implies {expected} body bytes, found {actual}")]
    MalformedBitmap { expected: usize, actual: usize },

    /// Discovery or connection did not yield a write-capable endpoint.
    #[error("No writable endpoint found on printer")]
    NoWritableEndpoint,

    /// A chunk write failed or the channel dropped.
    ///
    /// `offset` is the number of frame bytes written before the failure. The
    /// job is not resumable from there; restart it from the beginning.
    #[error("Transport failure at byte offset {offset}: {reason}")]
    TransportFailure { offset: usize, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Font error: {0}")]
    Font(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Ble(#[from] btleplug::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
