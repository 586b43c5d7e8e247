use async_trait::async_trait;
use log::{debug, info, warn};

use crate::config::PrinterConfig;
use crate::error::{Error, Result};
use crate::layout::{self, LayoutResult};
use crate::protocol::{encode_with, CommandFrame, MonochromeBitmap};
use crate::surface::{PixelBuffer, RasterSurface, TRANSPARENT};
use crate::transport::{send_chunked, Channel};

/// Lifecycle of one print job. `Failed` is reachable from every
/// non-terminal state; nothing ever moves backwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Discovering,
    Connected,
    Rasterizing,
    Encoding,
    Framing,
    Transmitting,
    Completed,
    Failed(String),
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed(_))
    }
}

/// Finds the printer and opens its write endpoint.
///
/// Must yield exactly one write-capable channel or fail, typically with
/// `NoWritableEndpoint`.
#[async_trait]
pub trait Connector: Send {
    type Channel: Channel;

    async fn connect(&mut self) -> Result<Self::Channel>;
}

/// One label going through the pipeline.
#[derive(Debug, Clone)]
pub struct PrintJob {
    text: String,
    state: JobState,
    history: Vec<JobState>,
}

impl PrintJob {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            state: JobState::Idle,
            history: vec![JobState::Idle],
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    /// Every state the job has been in, in order, starting with `Idle`.
    pub fn history(&self) -> &[JobState] {
        &self.history
    }

    fn advance(&mut self, next: JobState) {
        if self.state.is_terminal() {
            return;
        }
        debug!("job {:?}: {:?} -> {:?}", self.text, self.state, next);
        self.history.push(next.clone());
        self.state = next;
    }

    fn fail(&mut self, err: &Error) {
        self.advance(JobState::Failed(err.to_string()));
    }
}

/// Intermediate products of the render stages.
#[derive(Debug, Clone)]
pub struct RenderedLabel {
    pub layout: LayoutResult,
    pub pixels: PixelBuffer,
    pub bitmap: MonochromeBitmap,
    pub frame: CommandFrame,
}

/// Summary of a completed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobReport {
    pub font_size: u32,
    pub bytes_sent: usize,
    pub chunks: usize,
}

/// Drives text through layout, rasterization, encoding, framing and
/// transmission, one job at a time.
pub struct LabelPrinter<S: RasterSurface> {
    surface: S,
    config: PrinterConfig,
    last_job: Option<PrintJob>,
}

impl<S: RasterSurface> LabelPrinter<S> {
    pub fn new(surface: S, config: PrinterConfig) -> Result<Self> {
        config.validate()?;
        if surface.geometry() != config.geometry {
            return Err(Error::InvalidConfig(format!(
                "surface is {:?} but config expects {:?}",
                surface.geometry(),
                config.geometry
            )));
        }
        Ok(Self {
            surface,
            config,
            last_job: None,
        })
    }

    pub fn config(&self) -> &PrinterConfig {
        &self.config
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// The most recently finished job, successful or not.
    pub fn last_job(&self) -> Option<&PrintJob> {
        self.last_job.as_ref()
    }

    fn rasterize(&mut self, text: &str) -> (LayoutResult, PixelBuffer) {
        let style = &self.config.style;
        let layout = layout::fit(text, &self.config.geometry, style, &self.surface);
        self.surface.clear(TRANSPARENT);
        for line in &layout.lines {
            self.surface
                .draw_text(&line.text, line.x, line.y, style, layout.font_size);
        }
        (layout, self.surface.snapshot())
    }

    /// Runs every stage except transmission.
    pub fn render(&mut self, text: &str) -> Result<RenderedLabel> {
        let (layout, pixels) = self.rasterize(text);
        let bitmap = encode_with(&pixels, &self.config.encode)?;
        let frame = CommandFrame::build(&bitmap);
        Ok(RenderedLabel {
            layout,
            pixels,
            bitmap,
            frame,
        })
    }

    /// Prints `text` on the printer `connector` reaches.
    ///
    /// Either the whole frame is handed to the channel or the job ends
    /// `Failed`. A failed job is never resumed; call again to start over.
    /// Once connected, the channel is closed whichever way the job ends.
    pub async fn print<C: Connector>(&mut self, text: &str, connector: &mut C) -> Result<JobReport> {
        let mut job = PrintJob::new(text);
        let result = self.run(&mut job, connector).await;
        match &result {
            Ok(report) => info!(
                "label printed: font {}px, {} bytes in {} chunks",
                report.font_size, report.bytes_sent, report.chunks
            ),
            Err(err) => {
                warn!("print job failed in {:?}: {}", job.state(), err);
                job.fail(err);
            }
        }
        self.last_job = Some(job);
        result
    }

    async fn run<C: Connector>(&mut self, job: &mut PrintJob, connector: &mut C) -> Result<JobReport> {
        job.advance(JobState::Discovering);
        let mut channel = connector.connect().await?;
        job.advance(JobState::Connected);

        let result = self.deliver(job, &mut channel).await;
        if let Err(err) = channel.close().await {
            warn!("closing the printer channel failed: {}", err);
        }
        result
    }

    async fn deliver<Ch: Channel>(&mut self, job: &mut PrintJob, channel: &mut Ch) -> Result<JobReport> {
        job.advance(JobState::Rasterizing);
        let (layout, pixels) = self.rasterize(job.text());

        job.advance(JobState::Encoding);
        let bitmap = encode_with(&pixels, &self.config.encode)?;

        job.advance(JobState::Framing);
        let frame = CommandFrame::build(&bitmap);

        job.advance(JobState::Transmitting);
        let transfer = send_chunked(channel, frame.as_bytes(), &self.config.transport);
        let transfer = match self.config.transmit_timeout {
            Some(limit) => tokio::time::timeout(limit, transfer)
                .await
                .map_err(|_| Error::Timeout(limit))??,
            None => transfer.await?,
        };

        job.advance(JobState::Completed);
        Ok(JobReport {
            font_size: layout.font_size,
            bytes_sent: transfer.bytes_sent,
            chunks: transfer.chunks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LabelGeometry;
    use crate::surface::BlockSurface;

    #[test]
    fn job_starts_idle_and_stops_at_terminal_state() {
        let mut job = PrintJob::new("x");
        assert_eq!(job.state(), &JobState::Idle);
        job.advance(JobState::Discovering);
        job.fail(&Error::NoWritableEndpoint);
        job.advance(JobState::Connected);
        assert!(matches!(job.state(), JobState::Failed(_)));
        assert_eq!(job.history().len(), 3);
    }

    #[test]
    fn surface_must_match_geometry() {
        let surface = BlockSurface::new(LabelGeometry::new(96, 200, 4));
        let err = LabelPrinter::new(surface, PrinterConfig::default()).err().unwrap();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn render_produces_a_full_frame() {
        let surface = BlockSurface::new(LabelGeometry::D30);
        let mut printer = LabelPrinter::new(surface, PrinterConfig::default()).unwrap();
        let label = printer.render("HELLO").unwrap();

        assert_eq!((label.pixels.width(), label.pixels.height()), (96, 320));
        assert_eq!(label.bitmap.header(), [12, 0, 64, 1]);
        assert!(label.bitmap.body().iter().any(|&b| b != 0));
        assert_eq!(label.frame.len(), 17 + 4 + 12 * 320);
    }

    #[test]
    fn render_clears_previous_label() {
        let surface = BlockSurface::new(LabelGeometry::D30);
        let mut printer = LabelPrinter::new(surface, PrinterConfig::default()).unwrap();
        printer.render("HELLO").unwrap();
        let blank = printer.render("").unwrap();
        assert!(blank.bitmap.body().iter().all(|&b| b == 0));
    }
}
